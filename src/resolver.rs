//! Trip Resolver (C6): composes a sampled point's sub-legs (walk to rental /
//! mode ride / walk to POI) into one end-to-end travel time, using the
//! oracle, evaluator, and cache. Network-mode and point-mode share this
//! module; both funnel into the unified [`TripOutcome`] sum type.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    cache::{RentalWalk, Scope, TravelCache},
    candidate::{evaluate_best_candidate, Candidate},
    gate::{CancellationToken, JourneyPlanner},
    mode::TransportMode,
    oracle::JourneyOracle,
    shared::{Coordinate, Distance},
    spatial::{graph::WalkGraph, SpatialIndex},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    #[error("no trip found")]
    NoTrip,
    #[error("no destination candidate found")]
    NoDestination,
    #[error("no access station found")]
    NoStation,
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("rate limit exceeded")]
    RateLimited,
}

/// A single resolved leg chain. Network mode carries `(destination,
/// minutes)`; point mode carries `(point, minutes)` relative to the
/// request's fixed center.
#[derive(Debug, Clone)]
pub struct TripRecord {
    pub point: Coordinate,
    pub minutes: u32,
    /// Populated only by [`TripResolver::resolve_point_performance`].
    pub used_modes: Vec<String>,
    pub station_names: Vec<String>,
}

/// The single result shape both resolver variants return, replacing the
/// tuple-vs-scalar split in the material this module is drawn from.
#[derive(Debug)]
pub enum TripOutcome<T> {
    Success(T),
    AlreadyProcessed,
    Skip(SkipReason),
    Err(ResolverError),
}

impl<T> TripOutcome<T> {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TripOutcome::Err(_))
    }
}

pub struct TripResolver<P> {
    cache: Arc<TravelCache>,
    index: Arc<SpatialIndex>,
    oracle: Arc<JourneyOracle<P>>,
    ride_graphs: Arc<RideGraphs>,
}

/// One walking/mode graph per ride mode the resolver ever routes on.
pub struct RideGraphs {
    pub walk: WalkGraph,
    pub cycle: WalkGraph,
    pub drive: WalkGraph,
}

impl RideGraphs {
    fn for_mode(&self, mode: TransportMode) -> &WalkGraph {
        match mode.ride_mode() {
            TransportMode::Cycle => &self.cycle,
            TransportMode::SelfDriveCar => &self.drive,
            _ => &self.walk,
        }
    }
}

impl<P: JourneyPlanner> TripResolver<P> {
    pub fn new(
        cache: Arc<TravelCache>,
        index: Arc<SpatialIndex>,
        oracle: Arc<JourneyOracle<P>>,
        ride_graphs: Arc<RideGraphs>,
    ) -> Self {
        Self {
            cache,
            index,
            oracle,
            ride_graphs,
        }
    }

    /// Network-mode resolution for a single sampled origin point (§4.6).
    pub async fn resolve_network(
        &self,
        mode: TransportMode,
        origin: Coordinate,
        max_destinations: usize,
        token: &CancellationToken,
    ) -> TripOutcome<TripRecord> {
        if self.cache.network_time(mode, origin).is_some() {
            return TripOutcome::AlreadyProcessed;
        }
        if token.is_cancelled() {
            return TripOutcome::Skip(SkipReason::NoTrip);
        }

        let ride_graph = self.ride_graphs.for_mode(mode);

        // Rental chain: resolve (or reuse) the walk-to-rental-station leg.
        let (chain_origin, walk_to_rental_minutes) = if mode.is_rental() {
            let Some(station) = self
                .index
                .nearest(mode.destination_class(), origin, 1)
                .into_iter()
                .next()
            else {
                return TripOutcome::Skip(SkipReason::NoStation);
            };
            match self.oracle.travel_time(origin, station.coordinate, TransportMode::Walk, token).await {
                Ok(Some(d)) => (station.coordinate, d.as_minutes_ceil()),
                Ok(None) => return TripOutcome::Skip(SkipReason::NoStation),
                Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
            }
        } else {
            (origin, 0)
        };

        // Cache hit short-circuit (I3): a pre-resolved rental chain skips
        // straight to the access-station walk leg. `station_rental` is keyed
        // by the resolved destination POI, not the origin, so a different
        // origin whose chain lands on the same destination reuses it too.
        if mode.is_rental() {
            if let Some((destination, ride_minutes)) = self.cache.rental_ride(mode, chain_origin) {
                if let Some(walk) = self.cache.station_rental(mode, Scope::Network, destination) {
                    let total = walk_to_rental_minutes + ride_minutes + walk.walk_minutes;
                    self.cache.store_network_time(mode, origin, destination, total);
                    return TripOutcome::Success(TripRecord {
                        point: origin,
                        minutes: total,
                        used_modes: Vec::new(),
                        station_names: Vec::new(),
                    });
                }
            }
        }

        let candidates: Vec<Candidate> = self
            .index
            .nearest(mode.destination_class(), chain_origin, max_destinations)
            .into_iter()
            .map(|f| Candidate {
                destination: f.coordinate,
                access_station: f.coordinate,
                mode_tags: f.mode_tags.clone(),
            })
            .collect();

        if candidates.is_empty() {
            return TripOutcome::Skip(SkipReason::NoDestination);
        }

        let Some(best) = evaluate_best_candidate(
            chain_origin,
            mode,
            &candidates,
            ride_graph,
            max_destinations,
            |c| chain_origin.network_distance(&c.destination),
        ) else {
            return TripOutcome::Skip(SkipReason::NoDestination);
        };

        if token.is_cancelled() {
            return TripOutcome::Skip(SkipReason::NoTrip);
        }

        let ride_minutes = match self
            .oracle
            .travel_time(chain_origin, best.access_station, mode.ride_mode(), token)
            .await
        {
            Ok(Some(d)) => d.as_minutes_ceil(),
            Ok(None) => return TripOutcome::Skip(SkipReason::NoTrip),
            Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
        };

        let final_walk_minutes = match self
            .oracle
            .travel_time(best.access_station, best.destination, TransportMode::Walk, token)
            .await
        {
            Ok(Some(d)) => d.as_minutes_ceil(),
            Ok(None) => return TripOutcome::Skip(SkipReason::NoTrip),
            Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
        };

        let total = walk_to_rental_minutes + ride_minutes + final_walk_minutes;

        if mode.is_rental() {
            self.cache.store_rental_ride(
                mode,
                chain_origin,
                best.access_station.into(),
                ride_minutes,
            );
            self.cache.store_station_rental(
                mode,
                Scope::Network,
                best.destination,
                RentalWalk {
                    station: best.access_station.into(),
                    walk_minutes: final_walk_minutes,
                },
            );
        }
        self.cache
            .store_network_time(mode, origin, best.destination.into(), total);

        TripOutcome::Success(TripRecord {
            point: origin,
            minutes: total,
            used_modes: Vec::new(),
            station_names: Vec::new(),
        })
    }

    /// Point-mode resolution for a single radial destination relative to a
    /// fixed `center`. `origin_access` is the center's own resolved access
    /// station/point, computed once per request by the caller.
    pub async fn resolve_point(
        &self,
        mode: TransportMode,
        center: Coordinate,
        origin_access: Coordinate,
        radial_point: Coordinate,
        token: &CancellationToken,
    ) -> TripOutcome<TripRecord> {
        if self.cache.has_point_result(mode, center, radial_point) {
            return TripOutcome::AlreadyProcessed;
        }
        if token.is_cancelled() {
            return TripOutcome::Skip(SkipReason::NoTrip);
        }

        let destination_access = if mode.is_rental() {
            match self
                .index
                .nearest(mode.destination_class(), radial_point, 1)
                .into_iter()
                .next()
            {
                Some(station) => station.coordinate,
                None => return TripOutcome::Skip(SkipReason::NoStation),
            }
        } else {
            radial_point
        };

        let walk_start_minutes = if mode == TransportMode::Walk {
            0
        } else {
            match self
                .oracle
                .travel_time(center, origin_access, TransportMode::Walk, token)
                .await
            {
                Ok(Some(d)) => d.as_minutes_ceil(),
                Ok(None) => return TripOutcome::Skip(SkipReason::NoStation),
                Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
            }
        };

        let ride_minutes = match self
            .oracle
            .travel_time(origin_access, destination_access, mode.ride_mode(), token)
            .await
        {
            Ok(Some(d)) => d.as_minutes_ceil(),
            Ok(None) => return TripOutcome::Skip(SkipReason::NoTrip),
            Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
        };

        let walk_end_minutes = if mode.is_rental() {
            match self
                .oracle
                .travel_time(destination_access, radial_point, TransportMode::Walk, token)
                .await
            {
                Ok(Some(d)) => d.as_minutes_ceil(),
                Ok(None) => return TripOutcome::Skip(SkipReason::NoTrip),
                Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
            }
        } else {
            0
        };

        let total = walk_start_minutes + ride_minutes + walk_end_minutes;
        self.cache
            .append_point_time(mode, center, radial_point, total);

        TripOutcome::Success(TripRecord {
            point: radial_point,
            minutes: total,
            used_modes: Vec::new(),
            station_names: Vec::new(),
        })
    }

    /// Performance-mode point resolution (§4.2): bypasses the walk/ride/walk
    /// leg decomposition and asks the oracle for one full trip per radial
    /// point, also extracting the used-mode and boarded-station sets.
    pub async fn resolve_point_performance(
        &self,
        mode: TransportMode,
        center: Coordinate,
        radial_point: Coordinate,
        token: &CancellationToken,
    ) -> TripOutcome<TripRecord> {
        if self.cache.has_point_result(mode, center, radial_point) {
            return TripOutcome::AlreadyProcessed;
        }
        if token.is_cancelled() {
            return TripOutcome::Skip(SkipReason::NoTrip);
        }

        let details = match self
            .oracle
            .travel_details(center, radial_point, mode, token)
            .await
        {
            Ok(Some(details)) => details,
            Ok(None) => return TripOutcome::Skip(SkipReason::NoTrip),
            Err(_) => return TripOutcome::Err(ResolverError::RateLimited),
        };

        let minutes = details.duration.as_minutes_ceil();
        self.cache.append_point_time(mode, center, radial_point, minutes);

        TripOutcome::Success(TripRecord {
            point: radial_point,
            minutes,
            used_modes: details.used_modes,
            station_names: details.station_names,
        })
    }
}

/// Distance between two coordinates, kept here rather than re-derived per
/// call site; the weighted-distance formula in [`Evaluation`] depends on
/// this matching [`Coordinate::network_distance`] exactly.
pub fn leg_distance(a: Coordinate, b: Coordinate) -> Distance {
    a.network_distance(&b)
}
