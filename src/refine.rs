//! Iterative Refinement (C11): detects under-sampled regions and
//! oversized isochrones after a first pass, and synthesizes additional
//! sample points for a second pass (§4.11).

use geo::{Area, BooleanOps, MultiPolygon, Polygon};

use crate::{contour::IsochroneRing, sampler::SampleRng};

#[derive(Debug, Clone, Copy)]
pub struct RefinementPlan {
    pub unsampled_points: usize,
    pub large_isochrone_points: usize,
}

/// Computes how many extra points to sample in the uncovered area and in
/// oversized isochrones, given the first pass's rings and region.
pub fn plan_refinement(
    region: &Polygon<f64>,
    water: &MultiPolygon<f64>,
    rings: &[IsochroneRing],
    large_fraction_threshold: f64,
) -> (RefinementPlan, MultiPolygon<f64>, Vec<MultiPolygon<f64>>) {
    let region_mp = MultiPolygon(vec![region.clone()]);
    let covered = rings
        .iter()
        .fold(MultiPolygon(vec![]), |acc, r| acc.union(&r.geometry));
    let unsampled = region_mp.difference(water).difference(&covered);

    let total_sampled_area: f64 = rings.iter().map(|r| r.geometry.unsigned_area()).sum();
    let large: Vec<MultiPolygon<f64>> = rings
        .iter()
        .filter(|r| {
            total_sampled_area > 0.0
                && r.geometry.unsigned_area() / total_sampled_area > large_fraction_threshold
        })
        .map(|r| r.geometry.clone())
        .collect();

    let unsampled_area = unsampled.unsigned_area();
    let large_area: f64 = large.iter().map(|g| g.unsigned_area()).sum();

    let plan = RefinementPlan {
        unsampled_points: area_to_point_budget(unsampled_area),
        large_isochrone_points: area_to_point_budget(large_area),
    };

    (plan, unsampled, large)
}

fn area_to_point_budget(area: f64) -> usize {
    // One point per ~40,000 square-units of uncovered area, capped to keep a
    // refinement pass from dwarfing the first one.
    ((area / 40_000.0).round() as usize).min(100)
}

/// Filters candidate refinement points so no two are closer than
/// `min_separation`, greedily keeping earlier points (§4.11).
pub fn enforce_min_separation(points: Vec<(f64, f64)>, min_separation: f64) -> Vec<(f64, f64)> {
    let min_sep_sq = min_separation * min_separation;
    let mut kept: Vec<(f64, f64)> = Vec::new();
    for point in points {
        let too_close = kept.iter().any(|&(kx, ky)| {
            let dx = kx - point.0;
            let dy = ky - point.1;
            dx * dx + dy * dy < min_sep_sq
        });
        if !too_close {
            kept.push(point);
        }
    }
    kept
}

/// Draws `count` uniformly-random points inside `area`'s bounding box,
/// rejecting points outside the polygon, up to a bounded number of tries.
pub fn sample_in_area(area: &MultiPolygon<f64>, count: usize, rng: &mut dyn SampleRng) -> Vec<(f64, f64)> {
    use geo::{BoundingRect, Contains};
    let Some(rect) = area.bounding_rect() else {
        return Vec::new();
    };
    let mut points = Vec::with_capacity(count);
    let mut attempts = 0;
    while points.len() < count && attempts < count * 50 {
        attempts += 1;
        let x = rect.min().x + rng.next_f64() * rect.width();
        let y = rect.min().y + rng.next_f64() * rect.height();
        let candidate = geo::Coord { x, y };
        if area.contains(&candidate) {
            points.push((x, y));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    struct FixedRng(f64);
    impl SampleRng for FixedRng {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn min_separation_drops_nearby_points() {
        let points = vec![(0.0, 0.0), (1.0, 1.0), (50.0, 50.0)];
        let kept = enforce_min_separation(points, 10.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn plan_refinement_reports_zero_for_fully_covered_region() {
        let region = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ];
        let ring = IsochroneRing {
            level_minutes: 10,
            geometry: MultiPolygon(vec![region.clone()]),
        };
        let (plan, _, _) = plan_refinement(&region, &MultiPolygon(vec![]), &[ring], 0.05);
        assert_eq!(plan.unsampled_points, 0);
    }

    #[test]
    fn sample_in_area_respects_bounds() {
        let area = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ]]);
        let mut rng = FixedRng(0.5);
        let points = sample_in_area(&area, 3, &mut rng);
        for (x, y) in points {
            assert!((0.0..=10.0).contains(&x));
            assert!((0.0..=10.0).contains(&y));
        }
    }
}
