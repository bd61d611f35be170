use isochrone_core::{
    cache::{validate_invariant_i2, RentalWalk, Scope, TravelCache},
    mode::TransportMode,
    shared::Coordinate,
};

fn coord(lat: f32, lon: f32) -> Coordinate {
    Coordinate {
        latitude: lat,
        longitude: lon,
    }
}

#[test]
fn network_times_persist_across_save_and_load() {
    let dir = std::env::temp_dir().join(format!("isochrone-cache-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("travel_cache.bin");

    let cache = TravelCache::new();
    let origin = coord(47.37, 8.54);
    cache.store_network_time(TransportMode::Walk, origin, coord(47.38, 8.55).into(), 12);
    cache.save(&path).unwrap();

    let reloaded = TravelCache::load(&path).unwrap();
    let (_, minutes) = reloaded.network_time(TransportMode::Walk, origin).unwrap();
    assert_eq!(minutes, 12);
}

#[test]
fn well_formed_rental_chain_passes_integrity_check() {
    let cache = TravelCache::new();
    let station = coord(47.0, 8.0);
    let destination = coord(47.01, 8.01);

    cache.store_rental_ride(TransportMode::BicycleRental, station, destination.into(), 6);
    cache.store_station_rental(
        TransportMode::BicycleRental,
        Scope::Network,
        destination,
        RentalWalk {
            station: station.into(),
            walk_minutes: 3,
        },
    );

    assert!(validate_invariant_i2(&cache).is_empty());
}
