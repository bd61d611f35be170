use std::sync::Arc;

use isochrone_core::{
    cache::{Scope, TravelCache},
    gate::{CancellationToken, Error as GateError, JourneyPlanner},
    mode::{FacilityClass, TransportMode},
    oracle::JourneyOracle,
    resolver::{RideGraphs, TripOutcome, TripResolver},
    shared::Coordinate,
    spatial::{graph::WalkGraph, Facility, SpatialIndex},
};

fn coord(lat: f32, lon: f32) -> Coordinate {
    Coordinate {
        latitude: lat,
        longitude: lon,
    }
}

/// Always returns the same canned body; most scenarios below never reach it
/// (pure-walk legs and same-point legs resolve without a gate call).
struct StubPlanner {
    body: String,
}

#[async_trait::async_trait]
impl JourneyPlanner for StubPlanner {
    async fn send(&self, _request: &str) -> Result<(String, u16), GateError> {
        Ok((self.body.clone(), 200))
    }
}

fn walk_graph_with_stations(origins: &[Coordinate], station: Coordinate) -> WalkGraph {
    let mut nodes: Vec<Coordinate> = origins.to_vec();
    nodes.push(station);
    let station_idx = nodes.len() - 1;
    let edges: Vec<(usize, usize, f32)> = (0..station_idx).map(|i| (i, station_idx, 100.0)).collect();
    WalkGraph::build(&nodes, &edges)
}

fn make_resolver(
    index: SpatialIndex,
    walk_graph: WalkGraph,
    ride_walk_graph: WalkGraph,
    body: &str,
) -> (Arc<TravelCache>, TripResolver<StubPlanner>) {
    use isochrone_core::gate::RateGate;

    let cache = Arc::new(TravelCache::new());
    let gate = Arc::new(RateGate::new(
        StubPlanner { body: body.to_string() },
        4,
        std::time::Duration::from_millis(0),
    ));
    let oracle = Arc::new(JourneyOracle::new(gate, Arc::new(walk_graph), 1.4));
    let ride_graphs = Arc::new(RideGraphs {
        walk: ride_walk_graph,
        cycle: WalkGraph::build(&[], &[]),
        drive: WalkGraph::build(&[], &[]),
    });
    let resolver = TripResolver::new(cache.clone(), Arc::new(index), oracle, ride_graphs);
    (cache, resolver)
}

#[tokio::test]
async fn resolve_network_walk_mode_reaches_nearest_station() {
    let station = coord(0.001, 0.001);
    let origin = coord(0.0005, 0.0005);

    let index = SpatialIndex::build([(
        FacilityClass::PublicTransport,
        Facility {
            coordinate: station,
            name: "central".into(),
            mode_tags: vec!["bus".into()],
        },
    )]);

    let (cache, resolver) = make_resolver(
        index,
        walk_graph_with_stations(&[origin], station),
        walk_graph_with_stations(&[origin], station),
        "irrelevant",
    );

    let token = CancellationToken::new();
    let outcome = resolver.resolve_network(TransportMode::Walk, origin, 5, &token).await;
    match outcome {
        TripOutcome::Success(record) => {
            assert_eq!(record.point, origin);
            assert!(record.minutes > 0);
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert!(cache.network_time(TransportMode::Walk, origin).is_some());
}

/// Regression test for the rental-chain cache (I2): two distinct origins
/// whose nearest rental dock is the same station must end up with
/// `station_rental` keyed by the resolved destination, not by either
/// origin — otherwise the second origin's cache-hit branch never fires.
#[tokio::test]
async fn rental_chain_cache_is_keyed_by_destination_not_origin() {
    let station = coord(10.0, 10.0);
    let origin1 = coord(10.0005, 10.0005);
    let origin2 = coord(9.9995, 9.9995);

    let index = SpatialIndex::build([(
        FacilityClass::BikeRental,
        Facility {
            coordinate: station,
            name: "dock".into(),
            mode_tags: vec![],
        },
    )]);

    let (cache, resolver) = make_resolver(
        index,
        walk_graph_with_stations(&[origin1, origin2], station),
        WalkGraph::build(&[station], &[]),
        "irrelevant",
    );

    let token = CancellationToken::new();
    let first = resolver
        .resolve_network(TransportMode::BicycleRental, origin1, 5, &token)
        .await;
    assert!(matches!(first, TripOutcome::Success(_)));

    // The fix: the walk leg is cached under the resolved destination...
    assert!(cache
        .station_rental(TransportMode::BicycleRental, Scope::Network, station)
        .is_some());
    // ...never under the sampled origin that happened to produce it.
    assert!(cache
        .station_rental(TransportMode::BicycleRental, Scope::Network, origin1)
        .is_none());

    let second = resolver
        .resolve_network(TransportMode::BicycleRental, origin2, 5, &token)
        .await;
    match second {
        TripOutcome::Success(record) => assert_eq!(record.point, origin2),
        other => panic!("expected success via the shared-destination cache hit, got {other:?}"),
    }
    let (destination, _) = cache
        .network_time(TransportMode::BicycleRental, origin2)
        .expect("origin2 should have resolved");
    let (destination1, _) = cache
        .network_time(TransportMode::BicycleRental, origin1)
        .expect("origin1 should have resolved");
    assert_eq!(destination, destination1);
}

#[tokio::test]
async fn resolve_point_composes_walk_ride_walk_legs() {
    let station = coord(47.001, 8.001);
    let center = coord(47.0, 8.0);
    let radial_point = coord(47.0005, 8.0005);

    let index = SpatialIndex::build([(
        FacilityClass::PublicTransport,
        Facility {
            coordinate: station,
            name: "stop".into(),
            mode_tags: vec!["bus".into()],
        },
    )]);

    let (cache, resolver) = make_resolver(
        index,
        walk_graph_with_stations(&[center, radial_point], station),
        WalkGraph::build(&[], &[]),
        "PT5M",
    );

    let token = CancellationToken::new();
    let outcome = resolver
        .resolve_point(TransportMode::Cycle, center, station, radial_point, &token)
        .await;
    match outcome {
        TripOutcome::Success(record) => assert_eq!(record.point, radial_point),
        other => panic!("expected success, got {other:?}"),
    }
    assert!(cache.has_point_result(TransportMode::Cycle, center, radial_point));
}

#[tokio::test]
async fn resolve_point_performance_extracts_modes_and_stations() {
    let center = coord(47.0, 8.0);
    let radial_point = coord(47.01, 8.01);

    let body = "{\"duration\":\"PT12M\"}\
                <ojp:TripLeg><ojp:IndividualMode>walk</ojp:IndividualMode>\
                <ojp:LegBoard><ojp:StopPointName>Hauptbahnhof</ojp:StopPointName></ojp:LegBoard>\
                </ojp:TripLeg>";

    let (_cache, resolver) = make_resolver(
        SpatialIndex::build([]),
        WalkGraph::build(&[], &[]),
        WalkGraph::build(&[], &[]),
        body,
    );

    let token = CancellationToken::new();
    let outcome = resolver
        .resolve_point_performance(TransportMode::Walk, center, radial_point, &token)
        .await;
    match outcome {
        TripOutcome::Success(record) => {
            assert_eq!(record.minutes, 12);
            assert_eq!(record.used_modes, vec!["walk".to_string()]);
            assert_eq!(record.station_names, vec!["Hauptbahnhof".to_string()]);
        }
        other => panic!("expected success, got {other:?}"),
    }
}
