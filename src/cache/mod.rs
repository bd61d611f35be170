//! Cache Hierarchy (C4): five namespaced travel sub-caches behind one mutex,
//! plus an independently-guarded distance cache, both persisted with
//! `postcard`.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, atomic::{AtomicUsize, Ordering}},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    mode::TransportMode,
    shared::{Coordinate, Duration},
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cache file corrupt: {0}")]
    Corrupt(String),
    #[error("cache io failure: {0}")]
    Io(String),
}

const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointKey(i64, i64);

impl From<Coordinate> for PointKey {
    fn from(value: Coordinate) -> Self {
        // Quantize to ~1cm so floating-point jitter never defeats a cache hit.
        PointKey(
            (value.latitude as f64 * 1e7).round() as i64,
            (value.longitude as f64 * 1e7).round() as i64,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Network,
    Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalWalk {
    pub station: PointKey,
    pub walk_minutes: u32,
}

#[derive(Default, Serialize, Deserialize)]
struct TravelCacheData {
    network_times: HashMap<(u8, PointKey), (PointKey, u32)>,
    point_times: HashMap<(u8, PointKey), Vec<(PointKey, u32)>>,
    rental_ride: HashMap<(u8, PointKey), (PointKey, u32)>,
    station_rental: HashMap<(u8, bool, PointKey), RentalWalk>,
    parking: HashMap<(bool, bool, PointKey), RentalWalk>,
}

/// All five sub-caches from the data model, behind one mutex. Readers copy
/// values out of the lock; writers hold it only across the store call.
#[derive(Default)]
pub struct TravelCache {
    data: Mutex<TravelCacheData>,
}

impl TravelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Ok(Self::new()),
        };
        match decode_versioned::<TravelCacheData>(&bytes) {
            Ok(data) => Ok(Self {
                data: Mutex::new(data),
            }),
            Err(e) => {
                warn!("travel cache corrupt, starting empty: {e}");
                Ok(Self::new())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let data = self.data.lock().expect("cache mutex poisoned");
        let bytes = encode_versioned(&*data).map_err(|e| Error::Io(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| Error::Io(e.to_string()))
    }

    pub fn network_time(&self, mode: TransportMode, origin: Coordinate) -> Option<(PointKey, u32)> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.network_times.get(&(mode as u8, origin.into())).copied()
    }

    pub fn store_network_time(
        &self,
        mode: TransportMode,
        origin: Coordinate,
        destination: PointKey,
        minutes: u32,
    ) {
        let mut data = self.data.lock().expect("cache mutex poisoned");
        data.network_times
            .insert((mode as u8, origin.into()), (destination, minutes));
    }

    pub fn point_times(&self, mode: TransportMode, center: Coordinate) -> Vec<(PointKey, u32)> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.point_times
            .get(&(mode as u8, center.into()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_point_result(&self, mode: TransportMode, center: Coordinate, point: Coordinate) -> bool {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.point_times
            .get(&(mode as u8, center.into()))
            .is_some_and(|v| v.iter().any(|(p, _)| *p == PointKey::from(point)))
    }

    pub fn append_point_time(
        &self,
        mode: TransportMode,
        center: Coordinate,
        point: Coordinate,
        minutes: u32,
    ) {
        let mut data = self.data.lock().expect("cache mutex poisoned");
        data.point_times
            .entry((mode as u8, center.into()))
            .or_default()
            .push((point.into(), minutes));
    }

    pub fn rental_ride(&self, mode: TransportMode, station: Coordinate) -> Option<(PointKey, u32)> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.rental_ride.get(&(mode as u8, station.into())).copied()
    }

    pub fn store_rental_ride(
        &self,
        mode: TransportMode,
        station: Coordinate,
        destination: PointKey,
        minutes: u32,
    ) {
        let mut data = self.data.lock().expect("cache mutex poisoned");
        data.rental_ride
            .insert((mode as u8, station.into()), (destination, minutes));
    }

    pub fn station_rental(
        &self,
        mode: TransportMode,
        scope: Scope,
        destination: impl Into<PointKey>,
    ) -> Option<RentalWalk> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.station_rental
            .get(&(mode as u8, scope == Scope::Point, destination.into()))
            .cloned()
    }

    pub fn store_station_rental(
        &self,
        mode: TransportMode,
        scope: Scope,
        destination: impl Into<PointKey>,
        walk: RentalWalk,
    ) {
        let mut data = self.data.lock().expect("cache mutex poisoned");
        data.station_rental
            .insert((mode as u8, scope == Scope::Point, destination.into()), walk);
    }

    pub fn parking(&self, is_car: bool, scope: Scope, station: Coordinate) -> Option<RentalWalk> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.parking
            .get(&(is_car, scope == Scope::Point, station.into()))
            .cloned()
    }

    pub fn store_parking(&self, is_car: bool, scope: Scope, station: Coordinate, walk: RentalWalk) {
        let mut data = self.data.lock().expect("cache mutex poisoned");
        data.parking
            .insert((is_car, scope == Scope::Point, station.into()), walk);
    }
}

/// Process-wide nearest-access-point cache, independently guarded and
/// flushed on its own counter rather than per-request.
#[derive(Default)]
pub struct DistanceCache {
    data: Mutex<HashMap<(u8, PointKey), (PointKey, f32)>>,
    mutations_since_flush: AtomicUsize,
    flush_every: usize,
}

impl DistanceCache {
    pub fn new(flush_every: usize) -> Self {
        Self {
            data: Mutex::default(),
            mutations_since_flush: AtomicUsize::new(0),
            flush_every,
        }
    }

    pub fn load(path: &Path, flush_every: usize) -> Result<Self, Error> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Ok(Self::new(flush_every)),
        };
        match decode_versioned::<HashMap<(u8, PointKey), (PointKey, f32)>>(&bytes) {
            Ok(data) => Ok(Self {
                data: Mutex::new(data),
                mutations_since_flush: AtomicUsize::new(0),
                flush_every,
            }),
            Err(e) => {
                warn!("distance cache corrupt, starting empty: {e}");
                Ok(Self::new(flush_every))
            }
        }
    }

    pub fn get(&self, mode: TransportMode, destination: Coordinate) -> Option<(PointKey, f32)> {
        let data = self.data.lock().expect("cache mutex poisoned");
        data.get(&(mode as u8, destination.into())).copied()
    }

    /// Stores an entry and returns `true` if the flush threshold was just
    /// reached, signalling the caller should persist.
    pub fn store(
        &self,
        mode: TransportMode,
        destination: Coordinate,
        access_point: PointKey,
        length_m: f32,
    ) -> bool {
        {
            let mut data = self.data.lock().expect("cache mutex poisoned");
            data.insert((mode as u8, destination.into()), (access_point, length_m));
        }
        let count = self.mutations_since_flush.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.flush_every {
            self.mutations_since_flush.store(0, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let data = self.data.lock().expect("cache mutex poisoned");
        let bytes = encode_versioned(&*data).map_err(|e| Error::Io(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| Error::Io(e.to_string()))
    }
}

fn encode_versioned<T: Serialize>(value: &T) -> Result<Vec<u8>, postcard::Error> {
    let mut bytes = postcard::to_allocvec(&FORMAT_VERSION)?;
    bytes.extend(postcard::to_allocvec(value)?);
    Ok(bytes)
}

fn decode_versioned<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T, String> {
    let (version, rest): (u16, &[u8]) =
        postcard::take_from_bytes(bytes).map_err(|e| e.to_string())?;
    if version != FORMAT_VERSION {
        return Err(format!("unsupported cache format version {version}"));
    }
    postcard::from_bytes(rest).map_err(|e| e.to_string())
}

/// Converts a sub-leg chain of minutes into a whole-trip [`Duration`],
/// matching how the resolver accumulates leg totals.
pub fn sum_minutes(legs: &[u32]) -> Duration {
    Duration::from_seconds(legs.iter().sum::<u32>() * 60)
}

/// Integrity check (§4.4): an advisory pass that a cache has no dangling
/// `station_rental` entries without a matching `rental_ride` entry (I2).
pub fn validate_invariant_i2(cache: &TravelCache) -> Vec<String> {
    let data = cache.data.lock().expect("cache mutex poisoned");
    let mut problems = Vec::new();
    // A present station_rental entry for (mode, scope, dest) implies a
    // rental_ride entry exists for the station it names (I2).
    for ((mode, _scope, _dest), walk) in data.station_rental.iter() {
        if !data.rental_ride.contains_key(&(*mode, walk.station)) {
            problems.push(format!(
                "station_rental entry for mode {mode} references station with no rental_ride entry"
            ));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f32, lon: f32) -> Coordinate {
        Coordinate {
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn network_time_round_trips() {
        let cache = TravelCache::new();
        let origin = c(1.0, 2.0);
        assert!(cache.network_time(TransportMode::Walk, origin).is_none());
        cache.store_network_time(TransportMode::Walk, origin, PointKey::from(c(3.0, 4.0)), 12);
        let (_, minutes) = cache.network_time(TransportMode::Walk, origin).unwrap();
        assert_eq!(minutes, 12);
    }

    #[test]
    fn point_times_accumulate_in_order() {
        let cache = TravelCache::new();
        let center = c(0.0, 0.0);
        cache.append_point_time(TransportMode::Cycle, center, c(0.0, 1.0), 5);
        cache.append_point_time(TransportMode::Cycle, center, c(0.0, 2.0), 8);
        let times = cache.point_times(TransportMode::Cycle, center);
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].1, 5);
        assert_eq!(times[1].1, 8);
    }

    #[test]
    fn has_point_result_detects_duplicates() {
        let cache = TravelCache::new();
        let center = c(0.0, 0.0);
        let point = c(0.0, 1.0);
        assert!(!cache.has_point_result(TransportMode::Cycle, center, point));
        cache.append_point_time(TransportMode::Cycle, center, point, 5);
        assert!(cache.has_point_result(TransportMode::Cycle, center, point));
    }

    #[test]
    fn distance_cache_flush_threshold() {
        let dc = DistanceCache::new(2);
        let dest = c(0.0, 0.0);
        assert!(!dc.store(TransportMode::Walk, dest, PointKey(0, 0), 10.0));
        assert!(dc.store(TransportMode::Walk, dest, PointKey(0, 0), 10.0));
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = std::env::temp_dir().join(format!("cache-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corrupt.bin");
        std::fs::write(&path, b"not a valid cache file").unwrap();
        let cache = TravelCache::load(&path).unwrap();
        assert!(cache.network_time(TransportMode::Walk, c(0.0, 0.0)).is_none());
    }

    #[test]
    fn invariant_i2_flags_dangling_station_rental() {
        let cache = TravelCache::new();
        let dest = c(1.0, 1.0);
        cache.store_station_rental(
            TransportMode::BicycleRental,
            Scope::Network,
            dest,
            RentalWalk {
                station: PointKey(9, 9),
                walk_minutes: 4,
            },
        );
        let problems = validate_invariant_i2(&cache);
        assert_eq!(problems.len(), 1);
    }
}
