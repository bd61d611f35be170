use std::sync::Arc;

use geo::{polygon, MultiPolygon};
use isochrone_core::{
    cache::TravelCache,
    config::Config,
    gate::{Error as GateError, JourneyPlanner, RateGate},
    mode::{FacilityClass, TransportMode},
    oracle::JourneyOracle,
    pipeline::{Pipeline, Status},
    resolver::{RideGraphs, TripResolver},
    sampler::SampleRng,
    shared::Coordinate,
    spatial::{graph::WalkGraph, Facility, SpatialIndex},
};

struct FixedRng(f64);
impl SampleRng for FixedRng {
    fn next_f64(&mut self) -> f64 {
        self.0
    }
}

struct StubPlanner {
    body: String,
}

#[async_trait::async_trait]
impl JourneyPlanner for StubPlanner {
    async fn send(&self, _request: &str) -> Result<(String, u16), GateError> {
        Ok((self.body.clone(), 200))
    }
}

fn coord(lat: f32, lon: f32) -> Coordinate {
    Coordinate {
        latitude: lat,
        longitude: lon,
    }
}

fn build_pipeline(
    config: Config,
    index: SpatialIndex,
    oracle_walk_graph: WalkGraph,
    ride_walk_graph: WalkGraph,
    body: &str,
) -> Pipeline<StubPlanner> {
    let cache = Arc::new(TravelCache::new());
    let gate = Arc::new(RateGate::new(
        StubPlanner { body: body.to_string() },
        4,
        std::time::Duration::from_millis(0),
    ));
    let oracle = Arc::new(JourneyOracle::new(gate, Arc::new(oracle_walk_graph), 1.4));
    let ride_graphs = Arc::new(RideGraphs {
        walk: ride_walk_graph,
        cycle: WalkGraph::build(&[], &[]),
        drive: WalkGraph::build(&[], &[]),
    });
    let index = Arc::new(index);
    let resolver = Arc::new(TripResolver::new(cache.clone(), index.clone(), oracle, ride_graphs));
    Pipeline {
        config,
        cache,
        index,
        resolver,
    }
}

/// A 4x4 grid of candidate origins around a single station, every one of
/// them within walking distance and wired into the walk graph passed in.
fn grid_walk_graph(station: Coordinate) -> WalkGraph {
    let step = 0.001_f32;
    let mut nodes = Vec::new();
    for cx in 0..4 {
        for cy in 0..4 {
            nodes.push(coord(
                0.0005 + cy as f32 * step,
                0.0005 + cx as f32 * step,
            ));
        }
    }
    nodes.push(station);
    let station_idx = nodes.len() - 1;
    let edges: Vec<(usize, usize, f32)> = (0..station_idx).map(|i| (i, station_idx, 80.0)).collect();
    WalkGraph::build(&nodes, &edges)
}

#[tokio::test]
async fn compute_network_walk_mode_produces_rings() {
    let station = coord(0.002, 0.002);
    let walk_graph_a = grid_walk_graph(station);
    let walk_graph_b = grid_walk_graph(station);

    let index = SpatialIndex::build([(
        FacilityClass::PublicTransport,
        Facility {
            coordinate: station,
            name: "central".into(),
            mode_tags: vec!["bus".into()],
        },
    )]);

    let config = Config {
        network_grid_side_m: 0.001,
        max_destinations_scored: 5,
        ..Config::default()
    };

    let pipeline = build_pipeline(config, index, walk_graph_a, walk_graph_b, "irrelevant");

    let region = polygon![
        (x: 0.0, y: 0.0),
        (x: 0.004, y: 0.0),
        (x: 0.004, y: 0.004),
        (x: 0.0, y: 0.004),
    ];
    let water = MultiPolygon(vec![]);
    let mut rng = FixedRng(0.5);

    let response = pipeline
        .compute_network(TransportMode::Walk, &region, &water, false, |_| false, &mut rng)
        .await;

    assert!(
        matches!(response.status, Status::Success | Status::PartialSuccess),
        "unexpected status {:?} (reason: {:?}, error: {:?})",
        response.status,
        response.reason,
        response.error
    );
    assert!(!response.rings.is_empty());
    assert!(response.runtime_minutes >= 0.0);
}

#[tokio::test]
async fn compute_point_performance_mode_aggregates_fields() {
    let center = coord(47.0, 8.0);

    let body = "{\"duration\":\"PT8M\"}\
                <ojp:TripLeg><ojp:IndividualMode>walk</ojp:IndividualMode>\
                <ojp:LegBoard><ojp:StopPointName>Rathaus</ojp:StopPointName></ojp:LegBoard>\
                </ojp:TripLeg>";

    let config = Config::default();
    let pipeline = build_pipeline(
        config,
        SpatialIndex::build([]),
        WalkGraph::build(&[], &[]),
        WalkGraph::build(&[], &[]),
        body,
    );

    let water = MultiPolygon(vec![]);
    let mut rng = FixedRng(0.5);

    let response = pipeline
        .compute_point(TransportMode::Walk, center, center, &water, true, &mut rng)
        .await;

    assert!(
        matches!(response.status, Status::Success | Status::PartialSuccess),
        "unexpected status {:?} (reason: {:?}, error: {:?})",
        response.status,
        response.reason,
        response.error
    );
    assert_eq!(response.used_modes, vec!["walk".to_string()]);
    assert_eq!(response.station_names, vec!["Rathaus".to_string()]);
}
