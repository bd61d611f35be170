//! Candidate Evaluator (C5): ranks destination candidates via a weighted
//! distance score combining the walk leg, the mode leg, mode-count boosts,
//! and per-mode priority.

use crate::{
    mode::{submode_priority, TransportMode, BOOST_FACTOR, PRIORITY_BOOST_FACTOR, WEIGHT_FACTOR_BASE},
    shared::{Coordinate, Distance},
    spatial::graph::WalkGraph,
};

#[derive(Debug, Clone)]
pub struct Candidate {
    pub destination: Coordinate,
    pub access_station: Coordinate,
    pub mode_tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub destination: Coordinate,
    pub access_station: Coordinate,
    pub walk_length: Distance,
    pub score: f64,
}

/// Scores and selects the single best candidate, matching the distilled
/// `evaluate_best_candidate` sequencing: reject candidates whose walk leg
/// exceeds the priority/count-boosted ceiling, otherwise score and keep the
/// minimum, stopping early on a zero score.
pub fn evaluate_best_candidate(
    origin: Coordinate,
    mode: TransportMode,
    candidates: &[Candidate],
    ride_graph: &WalkGraph,
    max_destinations: usize,
    walk_length_of: impl Fn(&Candidate) -> Distance,
) -> Option<Evaluation> {
    let mut best: Option<Evaluation> = None;

    for candidate in candidates.iter().take(max_destinations) {
        let walk_length = walk_length_of(candidate);
        let priorities: Vec<u8> = candidate.mode_tags.iter().map(|t| submode_priority(t)).collect();
        let max_priority = priorities.iter().copied().max().unwrap_or(0) as f64;
        let mode_count = candidate.mode_tags.len().max(1) as f64;

        let adjusted_max_walk = mode.base_max_distance().as_meters() as f64
            * (1.0 + BOOST_FACTOR * (mode_count - 1.0) + PRIORITY_BOOST_FACTOR * max_priority);
        if (walk_length.as_meters() as f64) > adjusted_max_walk {
            continue;
        }

        let priority_sum: f64 = priorities.iter().map(|&p| p as f64).sum();
        let weight_factor = 1.0 + WEIGHT_FACTOR_BASE * (priority_sum + 0.5 * (mode_count - 1.0));

        let mode_length_m = ride_graph
            .shortest_path_length(origin, candidate.access_station)
            .unwrap_or(f64::MAX);
        if mode_length_m == f64::MAX {
            continue;
        }
        let mode_length = mode_length_m * mode.weight_mode();

        let score = (walk_length.as_meters() as f64 + mode_length) * weight_factor;

        let better = match &best {
            None => true,
            Some(current) => score < current.score,
        };
        if better {
            best = Some(Evaluation {
                destination: candidate.destination,
                access_station: candidate.access_station,
                walk_length,
                score,
            });
            if score == 0.0 {
                break;
            }
        }
    }

    best
}
