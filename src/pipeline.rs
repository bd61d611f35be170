//! Top-level orchestration matching the external request/response shapes
//! (§6): sample, resolve via the scheduler, interpolate, contour, and
//! (network mode) refine.

use std::{sync::Arc, time::Instant};

use geo::{BooleanOps, MultiPolygon, Polygon};
use tracing::{info, info_span, warn, Instrument};

use crate::{
    cache::TravelCache,
    config::Config,
    contour::{build_isochrones, build_isochrones_performance, clip_to_radius, IsochroneRing},
    gate::{CancellationToken, JourneyPlanner},
    interpolate::{interpolate, Sample},
    mode::TransportMode,
    refine::{enforce_min_separation, plan_refinement, sample_in_area},
    resolver::{TripOutcome, TripRecord, TripResolver},
    sampler::{radial::{generate_rings, offsets_to_coordinates}, require_enough_points, SampleRng},
    scheduler::run_batches,
    shared::Coordinate,
    spatial::SpatialIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Network,
    Point,
}

#[derive(Debug, Clone)]
pub struct ComputeRequest {
    pub mode: TransportMode,
    pub kind: RequestKind,
    pub input_station: Option<Coordinate>,
    pub performance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Skipped,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ComputeResponse {
    pub status: Status,
    pub kind: Option<RequestKind>,
    pub station: Option<Coordinate>,
    pub mode: Option<TransportMode>,
    /// Business-level skip/partial reason (insufficient samples, etc).
    pub reason: Option<String>,
    /// Hard-failure description, distinct from `reason` (interpolation or
    /// contouring blew up rather than the request being under-sampled).
    pub error: Option<String>,
    /// Wall-clock time spent computing this response, for benchmarking only.
    pub runtime_minutes: f64,
    /// Aggregated across all resolved points; only populated in performance
    /// point-mode requests (§4.2).
    pub used_modes: Vec<String>,
    pub station_names: Vec<String>,
    pub rings: Vec<IsochroneRing>,
}

pub struct Pipeline<P> {
    pub config: Config,
    pub cache: Arc<TravelCache>,
    pub index: Arc<SpatialIndex>,
    pub resolver: Arc<TripResolver<P>>,
}

impl<P: JourneyPlanner + 'static> Pipeline<P> {
    /// Runs a full network-mode compute, per §6's request/response shapes.
    /// When the first interpolate+contour pass succeeds, a second pass
    /// through Iterative Refinement (§4.11) is attempted; if it or its own
    /// interpolation/contouring fails, the first pass's rings are kept.
    pub async fn compute_network(
        &self,
        mode: TransportMode,
        region: &Polygon<f64>,
        water: &MultiPolygon<f64>,
        performance: bool,
        excluded: impl Fn(geo::Coord<f64>) -> bool + Send + Sync + 'static,
        rng: &mut dyn SampleRng,
    ) -> ComputeResponse {
        let span = info_span!("compute", ?mode, kind = "network");
        async {
            let started = Instant::now();
            let points = crate::sampler::network::sample_network_points(
                region,
                self.config.network_grid_side_m,
                0,
                excluded,
                |_, _| 1.0,
                rng,
            );

            let origins: Vec<Coordinate> = points
                .into_iter()
                .map(|p| Coordinate {
                    latitude: p.y() as f32,
                    longitude: p.x() as f32,
                })
                .collect();

            let token = CancellationToken::new();
            let max_destinations = self.config.max_destinations_scored;
            let batch_size = self.config.network_batch_size;
            let timeout = self.config.network_task_timeout;

            let outcomes = self
                .run_network_batch(mode, origins, max_destinations, batch_size, timeout, &token)
                .await;

            let mut records = collect_records(&outcomes);
            if let Err(reason) = require_enough_points(&records) {
                warn!("insufficient data after network resolution: {reason}");
                return failed_response(RequestKind::Network, None, mode, started, reason.to_string(), false);
            }

            let resolution = self.config.grid_resolution(mode.family(), performance);
            let (grid, samples) = match self.interpolate_network(region, &records, resolution) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("interpolation failed: {e}");
                    return failed_response(RequestKind::Network, None, mode, started, e, true);
                }
            };

            let max_level = samples.iter().map(|s| s.minutes as u32).max().unwrap_or(0);
            let rings = match build_isochrones(&grid, 1, max_level.max(1), water) {
                Ok(rings) => rings,
                Err(e) => {
                    warn!("contouring failed: {e}");
                    return failed_response(RequestKind::Network, None, mode, started, e.to_string(), true);
                }
            };

            let refined_rings = self
                .refine_network(region, water, &rings, mode, max_destinations, batch_size, timeout, &token, rng, &mut records, resolution)
                .await;
            let rings = refined_rings.unwrap_or(rings);

            let had_abort = outcomes.iter().any(|o| o.is_fatal());
            info!("network compute finished, {} rings", rings.len());
            ComputeResponse {
                status: if had_abort { Status::PartialSuccess } else { Status::Success },
                kind: Some(RequestKind::Network),
                station: None,
                mode: Some(mode),
                reason: None,
                error: None,
                runtime_minutes: elapsed_minutes(started),
                used_modes: Vec::new(),
                station_names: Vec::new(),
                rings,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_network_batch(
        &self,
        mode: TransportMode,
        origins: Vec<Coordinate>,
        max_destinations: usize,
        batch_size: usize,
        timeout: std::time::Duration,
        token: &CancellationToken,
    ) -> Vec<TripOutcome<TripRecord>> {
        let resolver = self.resolver.clone();
        run_batches(
            origins,
            batch_size,
            timeout,
            token,
            move |origin, task_token| {
                let resolver = resolver.clone();
                async move {
                    resolver
                        .resolve_network(mode, origin, max_destinations, &task_token)
                        .await
                }
            },
            |outcome: &TripOutcome<TripRecord>| outcome.is_fatal(),
        )
        .await
    }

    fn interpolate_network(
        &self,
        region: &Polygon<f64>,
        records: &[TripRecord],
        resolution: usize,
    ) -> Result<(crate::interpolate::Grid, Vec<Sample>), String> {
        let samples: Vec<Sample> = records
            .iter()
            .map(|r| Sample {
                x: r.point.longitude as f64,
                y: r.point.latitude as f64,
                minutes: r.minutes as f64,
            })
            .collect();
        let grid = interpolate(
            &samples,
            region_min_x(region),
            region_min_y(region),
            region_size(region),
            resolution,
            self.config.interpolation_k_neighbors,
            self.config.interpolation_base_power,
            1.0,
        )
        .map_err(|e| e.to_string())?;
        Ok((grid, samples))
    }

    /// Second pass (§4.11, scenario S5): samples extra points in under-
    /// covered area and oversized isochrones, re-resolves them, and
    /// re-contours. Returns `None` (keep the first pass) on any failure.
    #[allow(clippy::too_many_arguments)]
    async fn refine_network(
        &self,
        region: &Polygon<f64>,
        water: &MultiPolygon<f64>,
        rings: &[IsochroneRing],
        mode: TransportMode,
        max_destinations: usize,
        batch_size: usize,
        timeout: std::time::Duration,
        token: &CancellationToken,
        rng: &mut dyn SampleRng,
        records: &mut Vec<TripRecord>,
        resolution: usize,
    ) -> Option<Vec<IsochroneRing>> {
        let (plan, unsampled, large) =
            plan_refinement(region, water, rings, self.config.refine_large_isochrone_fraction);
        if plan.unsampled_points == 0 && plan.large_isochrone_points == 0 {
            return None;
        }

        let mut raw_points = sample_in_area(&unsampled, plan.unsampled_points, rng);
        for area in &large {
            raw_points.extend(sample_in_area(area, plan.large_isochrone_points, rng));
        }
        let raw_points = enforce_min_separation(raw_points, self.config.refine_min_separation_m / 111_320.0);
        if raw_points.is_empty() {
            return None;
        }

        let extra_origins: Vec<Coordinate> = raw_points
            .into_iter()
            .map(|(x, y)| Coordinate {
                latitude: y as f32,
                longitude: x as f32,
            })
            .collect();

        let outcomes = self
            .run_network_batch(mode, extra_origins, max_destinations, batch_size, timeout, token)
            .await;
        let extra_records = collect_records(&outcomes);
        if extra_records.is_empty() {
            return None;
        }

        records.extend(extra_records);
        let (grid, samples) = self.interpolate_network(region, records, resolution).ok()?;
        let max_level = samples.iter().map(|s| s.minutes as u32).max().unwrap_or(0);
        build_isochrones(&grid, 1, max_level.max(1), water).ok()
    }

    /// Runs a full point-mode compute around `center`. In performance mode,
    /// each radial point is resolved via a single oracle trip query instead
    /// of the walk/ride/walk decomposition, and contouring subtracts only
    /// `water` under a soft timeout rather than intersecting land (§4.10).
    pub async fn compute_point(
        &self,
        mode: TransportMode,
        center: Coordinate,
        origin_access: Coordinate,
        water: &MultiPolygon<f64>,
        performance: bool,
        rng: &mut dyn SampleRng,
    ) -> ComputeResponse {
        let started = Instant::now();
        let params = self.config.radial_sampling(mode.family(), performance);
        let offsets = generate_rings(&params, rng);
        let destinations = offsets_to_coordinates(center, &offsets);

        let token = CancellationToken::new();
        let resolver = self.resolver.clone();
        let batch_size = self.config.point_batch_size;
        let timeout = if performance {
            self.config.performance_task_timeout
        } else {
            self.config.network_task_timeout
        };

        let outcomes = run_batches(
            destinations,
            batch_size,
            timeout,
            &token,
            move |point, task_token| {
                let resolver = resolver.clone();
                async move {
                    if performance {
                        resolver
                            .resolve_point_performance(mode, center, point, &task_token)
                            .await
                    } else {
                        resolver
                            .resolve_point(mode, center, origin_access, point, &task_token)
                            .await
                    }
                }
            },
            |outcome: &TripOutcome<TripRecord>| outcome.is_fatal(),
        )
        .await;

        let records = collect_records(&outcomes);
        if let Err(reason) = require_enough_points(&records) {
            return failed_response(RequestKind::Point, Some(center), mode, started, reason.to_string(), false);
        }

        let (used_modes, station_names) = if performance {
            aggregate_fields(&records)
        } else {
            (Vec::new(), Vec::new())
        };

        let samples: Vec<Sample> = records
            .iter()
            .map(|r| Sample {
                x: r.point.longitude as f64,
                y: r.point.latitude as f64,
                minutes: r.minutes as f64,
            })
            .collect();

        let resolution = self.config.grid_resolution(mode.family(), performance);
        let span = params.max_radius_m * 2.2 / 111_320.0;
        let grid = match interpolate(
            &samples,
            center.longitude as f64 - span / 2.0,
            center.latitude as f64 - span / 2.0,
            span,
            resolution,
            self.config.interpolation_k_neighbors,
            self.config.interpolation_base_power,
            1.0,
        ) {
            Ok(grid) => grid,
            Err(e) => {
                return failed_response(RequestKind::Point, Some(center), mode, started, e.to_string(), true);
            }
        };

        let max_level = samples.iter().map(|s| s.minutes as u32).max().unwrap_or(0);
        let rings = if performance {
            match build_isochrones_performance(&grid, 1, max_level.max(1), water, self.config.contour_soft_timeout)
            {
                Ok((rings, timed_out)) => {
                    if timed_out {
                        warn!("performance contouring hit its soft timeout, returning partial rings");
                    }
                    rings
                }
                Err(e) => {
                    return failed_response(RequestKind::Point, Some(center), mode, started, e.to_string(), true);
                }
            }
        } else {
            let whole_world = geo::Polygon::new(
                geo::LineString(vec![
                    geo::Coord { x: -180.0, y: -90.0 },
                    geo::Coord { x: 180.0, y: -90.0 },
                    geo::Coord { x: 180.0, y: 90.0 },
                    geo::Coord { x: -180.0, y: 90.0 },
                ]),
                vec![],
            );
            let admissible = MultiPolygon(vec![whole_world]).difference(water);
            match build_isochrones(&grid, 1, max_level.max(1), &admissible) {
                Ok(rings) => rings,
                Err(e) => {
                    return failed_response(RequestKind::Point, Some(center), mode, started, e.to_string(), true);
                }
            }
        };
        let rings = clip_to_radius(
            rings,
            geo::Coord {
                x: center.longitude as f64,
                y: center.latitude as f64,
            },
            params.max_radius_m / 111_320.0,
        );

        let had_abort = outcomes.iter().any(|o| o.is_fatal());
        ComputeResponse {
            status: if had_abort { Status::PartialSuccess } else { Status::Success },
            kind: Some(RequestKind::Point),
            station: Some(center),
            mode: Some(mode),
            reason: None,
            error: None,
            runtime_minutes: elapsed_minutes(started),
            used_modes,
            station_names,
            rings,
        }
    }
}

/// Builds a `Failed` response; `is_hard_error` routes the message into
/// `error` (contouring/interpolation blew up) rather than `reason`
/// (business-level skip, e.g. insufficient samples).
fn failed_response(
    kind: RequestKind,
    station: Option<Coordinate>,
    mode: TransportMode,
    started: Instant,
    message: String,
    is_hard_error: bool,
) -> ComputeResponse {
    ComputeResponse {
        status: Status::Failed,
        kind: Some(kind),
        station,
        mode: Some(mode),
        reason: if is_hard_error { None } else { Some(message.clone()) },
        error: if is_hard_error { Some(message) } else { None },
        runtime_minutes: elapsed_minutes(started),
        used_modes: Vec::new(),
        station_names: Vec::new(),
        rings: Vec::new(),
    }
}

fn elapsed_minutes(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() / 60.0 * 100.0).round() / 100.0
}

/// Aggregates `used_modes`/`station_names` across all resolved points,
/// deduplicating in first-seen order.
fn aggregate_fields(records: &[TripRecord]) -> (Vec<String>, Vec<String>) {
    let mut modes = Vec::new();
    let mut stations = Vec::new();
    for record in records {
        for m in &record.used_modes {
            if !modes.contains(m) {
                modes.push(m.clone());
            }
        }
        for s in &record.station_names {
            if !stations.contains(s) {
                stations.push(s.clone());
            }
        }
    }
    (modes, stations)
}

fn collect_records(outcomes: &[TripOutcome<TripRecord>]) -> Vec<TripRecord> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            TripOutcome::Success(record) => Some(record.clone()),
            _ => None,
        })
        .collect()
}

fn region_min_x(region: &Polygon<f64>) -> f64 {
    use geo::BoundingRect;
    region.bounding_rect().map(|r| r.min().x).unwrap_or(0.0)
}

fn region_min_y(region: &Polygon<f64>) -> f64 {
    use geo::BoundingRect;
    region.bounding_rect().map(|r| r.min().y).unwrap_or(0.0)
}

fn region_size(region: &Polygon<f64>) -> f64 {
    use geo::BoundingRect;
    region
        .bounding_rect()
        .map(|r| r.width().max(r.height()))
        .unwrap_or(1.0)
}
