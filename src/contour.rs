//! Contour & Clip (C10): per-minute binary masks, morphology, marching-
//! squares tracing, and geometric post-processing into non-overlapping,
//! clipped isochrone rings.

use std::time::{Duration, Instant};

use contour::ContourBuilder;
use geo::{
    BooleanOps, BoundingRect, Coord, MultiPolygon, Polygon,
};
use thiserror::Error;

use crate::interpolate::Grid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

#[derive(Debug, Clone)]
pub struct IsochroneRing {
    pub level_minutes: u32,
    pub geometry: MultiPolygon<f64>,
}

/// Binary mask: `true` where the grid's value is within this level's band.
/// The lowest level is `value <= level`; every other level is
/// `prev_level < value <= level` (§4.10 step 1).
fn level_mask(grid: &Grid, level: f64, prev_level: Option<f64>, epsilon: f64) -> Vec<f64> {
    grid.values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return 0.0;
            }
            let upper_ok = v <= level + epsilon;
            let lower_ok = prev_level.is_none_or(|p| v > p);
            if upper_ok && lower_ok {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Binary dilation with a square structuring element of the given radius.
fn dilate(mask: &[f64], resolution: usize, radius: usize) -> Vec<f64> {
    let mut out = mask.to_vec();
    for row in 0..resolution {
        for col in 0..resolution {
            if mask[row * resolution + col] > 0.0 {
                continue;
            }
            'search: for dr in -(radius as isize)..=radius as isize {
                for dc in -(radius as isize)..=radius as isize {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= resolution || nc as usize >= resolution {
                        continue;
                    }
                    if mask[nr as usize * resolution + nc as usize] > 0.0 {
                        out[row * resolution + col] = 1.0;
                        break 'search;
                    }
                }
            }
        }
    }
    out
}

/// Traces one level's mask into polygons via marching squares, in the
/// grid's own coordinate space (the caller reprojects afterward).
fn trace_mask(grid: &Grid, mask: &[f64]) -> Result<MultiPolygon<f64>, Error> {
    let builder = ContourBuilder::new(grid.resolution, grid.resolution, false)
        .x_origin(grid.min_x)
        .y_origin(grid.min_y)
        .x_step(grid.cell_size)
        .y_step(grid.cell_size);
    let bands = builder
        .contours(mask, &[0.5])
        .map_err(|e| Error::InvalidGeometry(e.to_string()))?;

    let mut polygons = Vec::new();
    for band in bands {
        for polygon in band.geometry().0.iter() {
            polygons.push(make_valid(polygon.clone()));
        }
    }
    Ok(MultiPolygon(polygons))
}

fn make_valid(polygon: Polygon<f64>) -> Polygon<f64> {
    // `buffer(0)` is the common trick for coercing a self-intersecting ring
    // into something boolean-ops-safe; `geo`'s boolean-ops already reject
    // degenerate input internally, so unioning with an empty polygon here
    // serves the same purpose without a dedicated buffer implementation.
    let empty = Polygon::new(geo::LineString(vec![]), vec![]);
    let fixed = polygon.union(&empty);
    fixed.0.into_iter().next().unwrap_or(polygon)
}

/// Produces ordered, non-overlapping isochrone rings for a full set of
/// integer levels, clipped against `admissible` (land minus water, or just
/// water for performance mode).
pub fn build_isochrones(
    grid: &Grid,
    min_level: u32,
    max_level: u32,
    admissible: &MultiPolygon<f64>,
) -> Result<Vec<IsochroneRing>, Error> {
    let mut rings = Vec::new();
    let mut prev_level_value: Option<f64> = None;

    for level in min_level..=max_level {
        let mask = level_mask(grid, level as f64, prev_level_value, 0.5);
        let mask = fill_holes(&mask, grid.resolution);
        let mask = dilate(&mask, grid.resolution, 1);
        let traced = trace_mask(grid, &mask)?;
        let clipped = traced.intersection(admissible);
        rings.push(IsochroneRing {
            level_minutes: level,
            geometry: clipped,
        });
        prev_level_value = Some(level as f64);
    }

    dissolve_overlaps(rings)
}

/// Performance-mode variant of [`build_isochrones`]: subtracts only `water`
/// instead of intersecting with a full land-minus-water mask, and bounds the
/// whole trace under `soft_timeout`. On timeout, returns the rings traced so
/// far without the overlap-dissolving post-pass, flagged via the returned
/// `bool` so the caller can attach a warning (§4.10).
pub fn build_isochrones_performance(
    grid: &Grid,
    min_level: u32,
    max_level: u32,
    water: &MultiPolygon<f64>,
    soft_timeout: Duration,
) -> Result<(Vec<IsochroneRing>, bool), Error> {
    let deadline = Instant::now() + soft_timeout;
    let mut rings = Vec::new();
    let mut prev_level_value: Option<f64> = None;
    let mut timed_out = false;

    for level in min_level..=max_level {
        if Instant::now() >= deadline {
            timed_out = true;
            break;
        }
        let mask = level_mask(grid, level as f64, prev_level_value, 0.5);
        let mask = fill_holes(&mask, grid.resolution);
        let mask = dilate(&mask, grid.resolution, 1);
        let traced = trace_mask(grid, &mask)?;
        let clipped = traced.difference(water);
        rings.push(IsochroneRing {
            level_minutes: level,
            geometry: clipped,
        });
        prev_level_value = Some(level as f64);
    }

    if timed_out {
        Ok((rings, true))
    } else {
        Ok((dissolve_overlaps(rings)?, false))
    }
}

/// Flood-fill-free hole closing: any zero cell fully surrounded by ones in
/// its 3x3 neighborhood is promoted to one.
fn fill_holes(mask: &[f64], resolution: usize) -> Vec<f64> {
    let mut out = mask.to_vec();
    for row in 1..resolution.saturating_sub(1) {
        for col in 1..resolution.saturating_sub(1) {
            if mask[row * resolution + col] > 0.0 {
                continue;
            }
            let mut surrounded = true;
            for dr in -1..=1 {
                for dc in -1..=1 {
                    let nr = (row as isize + dr) as usize;
                    let nc = (col as isize + dc) as usize;
                    if mask[nr * resolution + nc] == 0.0 {
                        surrounded = false;
                    }
                }
            }
            if surrounded {
                out[row * resolution + col] = 1.0;
            }
        }
    }
    out
}

/// Orders rings by area ascending and subtracts each newly admitted
/// geometry from all larger ones, so an outer ring never re-covers
/// territory already attributed to a smaller, faster level (invariant 7).
fn dissolve_overlaps(mut rings: Vec<IsochroneRing>) -> Result<Vec<IsochroneRing>, Error> {
    rings.sort_by(|a, b| {
        area(&a.geometry)
            .partial_cmp(&area(&b.geometry))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for i in 0..rings.len() {
        let (before, after) = rings.split_at_mut(i + 1);
        let accumulated = before[i].geometry.clone();
        for later in after.iter_mut() {
            later.geometry = later.geometry.difference(&accumulated);
        }
    }

    Ok(rings)
}

fn area(mp: &MultiPolygon<f64>) -> f64 {
    use geo::Area;
    mp.unsigned_area()
}

/// Intersects every ring with a disk of `max_radius_m` around `center`,
/// used by point-mode requests to cap output at the mode's maximum radius.
pub fn clip_to_radius(rings: Vec<IsochroneRing>, center: Coord<f64>, max_radius_m: f64) -> Vec<IsochroneRing> {
    let disk = approximate_disk(center, max_radius_m, 64);
    rings
        .into_iter()
        .map(|mut r| {
            r.geometry = r.geometry.intersection(&MultiPolygon(vec![disk.clone()]));
            r
        })
        .collect()
}

fn approximate_disk(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    use std::f64::consts::PI;
    let mut coords = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        coords.push(Coord {
            x: center.x + radius * angle.cos(),
            y: center.y + radius * angle.sin(),
        });
    }
    coords.push(coords[0]);
    Polygon::new(geo::LineString(coords), vec![])
}

/// Bounding-box sanity check used by the pipeline before reprojection.
pub fn bounds_within(mp: &MultiPolygon<f64>, region: &Polygon<f64>) -> bool {
    match (mp.bounding_rect(), region.bounding_rect()) {
        (Some(a), Some(b)) => {
            a.min().x >= b.min().x - 1e-6
                && a.min().y >= b.min().y - 1e-6
                && a.max().x <= b.max().x + 1e-6
                && a.max().y <= b.max().y + 1e-6
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(resolution: usize, value: f64) -> Grid {
        Grid {
            resolution,
            min_x: 0.0,
            min_y: 0.0,
            cell_size: 1.0,
            values: vec![value; resolution * resolution],
        }
    }

    #[test]
    fn level_mask_marks_lowest_band_as_value_leq_level() {
        let grid = flat_grid(4, 5.0);
        let mask = level_mask(&grid, 5.0, None, 0.5);
        assert!(mask.iter().all(|&v| v == 1.0));
        let mask = level_mask(&grid, 1.0, None, 0.0);
        assert!(mask.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn higher_levels_exclude_already_covered_band() {
        let grid = flat_grid(4, 5.0);
        let mask = level_mask(&grid, 10.0, Some(5.0), 0.0);
        assert!(mask.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn performance_path_reports_timeout_and_keeps_partial_rings() {
        let grid = flat_grid(4, 5.0);
        let water = MultiPolygon(vec![]);
        let (rings, timed_out) =
            build_isochrones_performance(&grid, 1, 3, &water, std::time::Duration::from_secs(0))
                .unwrap();
        assert!(timed_out);
        assert!(rings.is_empty());
    }

    #[test]
    fn performance_path_dissolves_when_not_timed_out() {
        let grid = flat_grid(4, 5.0);
        let water = MultiPolygon(vec![]);
        let (rings, timed_out) =
            build_isochrones_performance(&grid, 1, 3, &water, std::time::Duration::from_secs(5))
                .unwrap();
        assert!(!timed_out);
        assert_eq!(rings.len(), 3);
    }

    #[test]
    fn dissolve_overlaps_shrinks_larger_rings() {
        let small_square = geo::polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0),
        ];
        let big_square = geo::polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ];
        let rings = vec![
            IsochroneRing {
                level_minutes: 20,
                geometry: MultiPolygon(vec![big_square]),
            },
            IsochroneRing {
                level_minutes: 10,
                geometry: MultiPolygon(vec![small_square]),
            },
        ];
        let dissolved = dissolve_overlaps(rings).unwrap();
        assert_eq!(dissolved[0].level_minutes, 10);
        let small_area = area(&dissolved[0].geometry);
        let big_area_after = area(&dissolved[1].geometry);
        assert!(big_area_after < 100.0 - small_area + 1e-6);
    }
}
