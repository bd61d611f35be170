//! Radial ring sampling for point-mode requests (§4.8).

use std::f64::consts::PI;

use crate::{config::RadialSamplingParams, sampler::SampleRng, shared::Coordinate};

/// Projected-plane offset, resolved back to a geographic coordinate by the
/// caller's projector; kept as plain meters here so this module has no
/// dependency on a concrete CRS.
#[derive(Debug, Clone, Copy)]
pub struct PlanarOffset {
    pub dx_m: f64,
    pub dy_m: f64,
}

/// Generates up to `params.max_points` destination offsets around a center:
/// four close directional points, then `num_rings` concentric, angularly
/// perturbed rings, each with an increasing slot count.
pub fn generate_rings(params: &RadialSamplingParams, rng: &mut dyn SampleRng) -> Vec<PlanarOffset> {
    let mut points = Vec::new();

    let close_radius = params.max_radius_m / 10.0;
    for i in 0..4 {
        let angle = i as f64 * PI / 2.0;
        points.push(PlanarOffset {
            dx_m: close_radius * angle.cos(),
            dy_m: close_radius * angle.sin(),
        });
    }

    for ring in 0..params.num_rings {
        let ring_fraction = (ring + 1) as f64 / params.num_rings as f64;
        let radius = params.offset_m + ring_fraction * (params.max_radius_m - params.offset_m);
        let slots = (params.base as f64 * (1.0 + ring as f64 / 2.0)).round() as u32;
        for slot in 0..slots.max(1) {
            let base_angle = slot as f64 * (2.0 * PI / slots.max(1) as f64);
            let angle = base_angle + rng.jitter(0.15);
            let perturbed_radius = radius + rng.jitter(radius * 0.1);
            points.push(PlanarOffset {
                dx_m: perturbed_radius * angle.cos(),
                dy_m: perturbed_radius * angle.sin(),
            });
        }
    }

    if points.len() > params.max_points as usize {
        points.truncate(params.max_points as usize);
    }

    points
}

/// Converts a set of planar offsets around `center` into geographic
/// coordinates using the crate's haversine-based approximation (the linear
/// equirectangular-style stand-in transformer named in the data model).
pub fn offsets_to_coordinates(center: Coordinate, offsets: &[PlanarOffset]) -> Vec<Coordinate> {
    const METERS_PER_DEGREE_LAT: f64 = 110_540.0;
    let meters_per_degree_lon =
        111_320.0 * (center.latitude as f64).to_radians().cos().max(1e-6);

    let mut points: Vec<Coordinate> = offsets
        .iter()
        .map(|o| Coordinate {
            latitude: center.latitude + (o.dy_m / METERS_PER_DEGREE_LAT) as f32,
            longitude: center.longitude + (o.dx_m / meters_per_degree_lon) as f32,
        })
        .collect();
    points.push(center);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mode::ModeFamily, config::Config};

    struct FixedRng(f64);
    impl SampleRng for FixedRng {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn respects_max_points_cap() {
        let cfg = Config::default();
        let params = cfg.radial_sampling(ModeFamily::CarFamily, false);
        let mut rng = FixedRng(0.5);
        let offsets = generate_rings(&params, &mut rng);
        assert!(offsets.len() <= params.max_points as usize);
    }

    #[test]
    fn includes_four_close_directional_points() {
        let cfg = Config::default();
        let params = cfg.radial_sampling(ModeFamily::Walk, true);
        let mut rng = FixedRng(0.5);
        let offsets = generate_rings(&params, &mut rng);
        assert!(offsets.len() >= 4);
        let close_radius = params.max_radius_m / 10.0;
        assert!((offsets[0].dx_m - close_radius).abs() < 1e-6);
    }

    #[test]
    fn center_is_included_in_final_coordinates() {
        let center = Coordinate {
            latitude: 47.0,
            longitude: 8.0,
        };
        let coords = offsets_to_coordinates(center, &[PlanarOffset { dx_m: 100.0, dy_m: 0.0 }]);
        assert_eq!(*coords.last().unwrap(), center);
    }
}
