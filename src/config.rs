//! Crate-wide configuration. A single plain-data struct constructed once by
//! the caller and threaded by reference, mirroring the `gtfs::Config` /
//! loader `Config` pattern this crate started from: small, `Default`-able
//! settings, no I/O.

use std::time::Duration as StdDuration;

use crate::mode::ModeFamily;

/// Sample-generation constants for one mode family, for either the
/// performance or full variant of a request.
#[derive(Debug, Clone, Copy)]
pub struct RadialSamplingParams {
    pub num_rings: u32,
    pub base: u32,
    pub offset_m: f64,
    pub max_points: u32,
    pub max_radius_m: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum in-flight journey-planner calls.
    pub gate_concurrency: usize,
    /// Minimum spacing, in whole seconds, between call initiations.
    pub gate_spacing: StdDuration,

    pub network_batch_size: usize,
    pub point_batch_size: usize,
    pub network_task_timeout: StdDuration,
    pub performance_task_timeout: StdDuration,
    /// Soft deadline for performance-mode contouring (§4.10): once elapsed,
    /// tracing stops after the current level and returns partial rings.
    pub contour_soft_timeout: StdDuration,

    /// Grid cell side for network-mode sampling, in meters.
    pub network_grid_side_m: f64,
    /// Minimum separation enforced by cluster-dedup, in meters.
    pub network_dedup_radius_m: f64,
    /// Minimum separation enforced between refinement sample points, in meters.
    pub refine_min_separation_m: f64,
    /// Fraction of total sampled area above which an isochrone counts as "large".
    pub refine_large_isochrone_fraction: f64,

    pub distance_cache_flush_every: usize,

    pub interpolation_k_neighbors: usize,
    pub interpolation_base_power: f64,

    pub max_destinations_scored: usize,
}

impl Config {
    pub fn radial_sampling(&self, family: ModeFamily, performance: bool) -> RadialSamplingParams {
        match (family, performance) {
            (ModeFamily::Walk, true) => RadialSamplingParams {
                num_rings: 5,
                base: 8,
                offset_m: 50.0,
                max_points: 50,
                max_radius_m: 1500.0,
            },
            (ModeFamily::Walk, false) => RadialSamplingParams {
                num_rings: 6,
                base: 8,
                offset_m: 50.0,
                max_points: 99,
                max_radius_m: 2000.0,
            },
            (ModeFamily::CycleFamily, true) => RadialSamplingParams {
                num_rings: 6,
                base: 7,
                offset_m: 100.0,
                max_points: 50,
                max_radius_m: 2500.0,
            },
            (ModeFamily::CycleFamily, false) => RadialSamplingParams {
                num_rings: 10,
                base: 7,
                offset_m: 100.0,
                max_points: 199,
                max_radius_m: 7500.0,
            },
            (ModeFamily::CarFamily, true) => RadialSamplingParams {
                num_rings: 7,
                base: 6,
                offset_m: 150.0,
                max_points: 50,
                max_radius_m: 5000.0,
            },
            (ModeFamily::CarFamily, false) => RadialSamplingParams {
                num_rings: 12,
                base: 6,
                offset_m: 150.0,
                max_points: 249,
                max_radius_m: 10000.0,
            },
        }
    }

    /// Interpolation grid resolution for a family/performance combination.
    pub fn grid_resolution(&self, family: ModeFamily, performance: bool) -> usize {
        match (family, performance) {
            (ModeFamily::Walk, _) => 250,
            (_, true) => 500,
            (_, false) => 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gate_concurrency: 100,
            gate_spacing: StdDuration::from_millis(350),
            network_batch_size: 20,
            point_batch_size: 50,
            network_task_timeout: StdDuration::from_secs(15 * 60),
            performance_task_timeout: StdDuration::from_secs(2 * 60),
            contour_soft_timeout: StdDuration::from_secs(20),
            network_grid_side_m: 500.0,
            network_dedup_radius_m: 100.0,
            refine_min_separation_m: 150.0,
            refine_large_isochrone_fraction: 0.05,
            distance_cache_flush_every: 50,
            interpolation_k_neighbors: 8,
            interpolation_base_power: 2.0,
            max_destinations_scored: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_constructible() {
        let cfg = Config::default();
        assert_eq!(cfg.gate_concurrency, 100);
    }

    #[test]
    fn radial_sampling_matches_table() {
        let cfg = Config::default();
        let walk_full = cfg.radial_sampling(ModeFamily::Walk, false);
        assert_eq!(walk_full.num_rings, 6);
        assert_eq!(walk_full.max_points, 99);
        let car_perf = cfg.radial_sampling(ModeFamily::CarFamily, true);
        assert_eq!(car_perf.max_radius_m, 5000.0);
    }
}
