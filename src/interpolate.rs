//! Interpolator (C9): inverse-distance-weighted rasterization from sampled
//! (point, time) pairs, with gap-fill and Gaussian smoothing.

use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("interpolation grid is entirely NaN")]
    GridAllNaN,
    #[error("fewer than 4 points resolved, refusing to interpolate")]
    InsufficientData,
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub minutes: f64,
}

/// A square raster of minute values in row-major order, `resolution` cells
/// per side, covering `[min_x, min_x + size) x [min_y, min_y + size)`.
pub struct Grid {
    pub resolution: usize,
    pub min_x: f64,
    pub min_y: f64,
    pub cell_size: f64,
    pub values: Vec<f64>,
}

impl Grid {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.resolution + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.resolution + col] = value;
    }

    fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.cell_size,
            self.min_y + (row as f64 + 0.5) * self.cell_size,
        )
    }
}

/// Runs the full interpolation pipeline: normalize, IDW, gap-fill, smooth,
/// denormalize.
pub fn interpolate(
    samples: &[Sample],
    min_x: f64,
    min_y: f64,
    size: f64,
    resolution: usize,
    k_neighbors: usize,
    base_power: f64,
    gaussian_sigma: f64,
) -> Result<Grid, Error> {
    if samples.len() < 4 {
        return Err(Error::InsufficientData);
    }

    let min_t = samples.iter().map(|s| s.minutes).fold(f64::MAX, f64::min);
    let max_t = samples.iter().map(|s| s.minutes).fold(f64::MIN, f64::max);
    let span = (max_t - min_t).max(1e-9);

    let mean_d = samples.iter().map(|s| s.minutes).sum::<f64>() / samples.len() as f64;
    let variance = samples
        .iter()
        .map(|s| (s.minutes - mean_d).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    let power = base_power + variance.sqrt() / (mean_d.abs() + 1e-9);

    let cell_size = size / resolution as f64;
    let mut grid = Grid {
        resolution,
        min_x,
        min_y,
        cell_size,
        values: vec![f64::NAN; resolution * resolution],
    };

    let rows: Vec<Vec<f64>> = (0..resolution)
        .into_par_iter()
        .map(|row| {
            (0..resolution)
                .map(|col| {
                    let cx = min_x + (col as f64 + 0.5) * cell_size;
                    let cy = min_y + (row as f64 + 0.5) * cell_size;
                    idw_at(samples, cx, cy, k_neighbors, power, min_t, span)
                })
                .collect()
        })
        .collect();

    for (row, values) in rows.into_iter().enumerate() {
        for (col, v) in values.into_iter().enumerate() {
            grid.set(row, col, v);
        }
    }

    fill_gaps(&mut grid);
    gaussian_blur(&mut grid, gaussian_sigma);

    for v in grid.values.iter_mut() {
        if !v.is_nan() {
            *v = min_t + *v * span;
        }
    }

    if grid.values.iter().all(|v| v.is_nan()) {
        return Err(Error::GridAllNaN);
    }

    Ok(grid)
}

fn idw_at(
    samples: &[Sample],
    x: f64,
    y: f64,
    k: usize,
    power: f64,
    min_t: f64,
    span: f64,
) -> f64 {
    let mut distances: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| {
            let dx = s.x - x;
            let dy = s.y - y;
            let d2 = dx * dx + dy * dy;
            let normalized = (s.minutes - min_t) / span;
            (d2, normalized)
        })
        .collect();
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let nearest = &distances[..k.min(distances.len())];

    if let Some(&(d2, value)) = nearest.iter().find(|(d2, _)| *d2 == 0.0) {
        let _ = d2;
        return value;
    }

    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for &(d2, value) in nearest {
        let weight = 1.0 / d2.sqrt().powf(power);
        weight_sum += weight;
        value_sum += weight * value;
    }
    if weight_sum > 0.0 {
        value_sum / weight_sum
    } else {
        f64::NAN
    }
}

/// 3x3 median fill for isolated NaNs, then a 5x5 dilation pass for anything
/// still unresolved.
fn fill_gaps(grid: &mut Grid) {
    let r = grid.resolution;
    let snapshot = grid.values.clone();
    for row in 0..r {
        for col in 0..r {
            if !snapshot[row * r + col].is_nan() {
                continue;
            }
            if let Some(median) = neighborhood_median(&snapshot, r, row, col, 1) {
                grid.set(row, col, median);
            }
        }
    }

    let snapshot = grid.values.clone();
    for row in 0..r {
        for col in 0..r {
            if !snapshot[row * r + col].is_nan() {
                continue;
            }
            if let Some(value) = neighborhood_first_valid(&snapshot, r, row, col, 2) {
                grid.set(row, col, value);
            }
        }
    }
}

fn neighborhood_median(values: &[f64], r: usize, row: usize, col: usize, radius: usize) -> Option<f64> {
    let mut collected = Vec::new();
    for dr in -(radius as isize)..=radius as isize {
        for dc in -(radius as isize)..=radius as isize {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= r || nc as usize >= r {
                continue;
            }
            let v = values[nr as usize * r + nc as usize];
            if !v.is_nan() {
                collected.push(v);
            }
        }
    }
    if collected.is_empty() {
        return None;
    }
    collected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some(collected[collected.len() / 2])
}

fn neighborhood_first_valid(values: &[f64], r: usize, row: usize, col: usize, radius: usize) -> Option<f64> {
    for dr in -(radius as isize)..=radius as isize {
        for dc in -(radius as isize)..=radius as isize {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= r || nc as usize >= r {
                continue;
            }
            let v = values[nr as usize * r + nc as usize];
            if !v.is_nan() {
                return Some(v);
            }
        }
    }
    None
}

fn gaussian_blur(grid: &mut Grid, sigma: f64) {
    if sigma <= 0.0 {
        return;
    }
    let radius = (sigma * 3.0).ceil() as isize;
    let mut kernel = Vec::new();
    let mut kernel_sum = 0.0;
    for d in -radius..=radius {
        let w = (-(d * d) as f64 / (2.0 * sigma * sigma)).exp();
        kernel.push(w);
        kernel_sum += w;
    }

    let r = grid.resolution;
    let snapshot = grid.values.clone();

    // Horizontal pass.
    let mut horizontal = vec![f64::NAN; r * r];
    for row in 0..r {
        for col in 0..r {
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for (i, &w) in kernel.iter().enumerate() {
                let offset = i as isize - radius;
                let c = col as isize + offset;
                if c < 0 || c as usize >= r {
                    continue;
                }
                let v = snapshot[row * r + c as usize];
                if v.is_nan() {
                    continue;
                }
                sum += w * v;
                weight_sum += w;
            }
            horizontal[row * r + col] = if weight_sum > 0.0 { sum / weight_sum } else { f64::NAN };
        }
    }

    // Vertical pass.
    for col in 0..r {
        for row in 0..r {
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for (i, &w) in kernel.iter().enumerate() {
                let offset = i as isize - radius;
                let rr = row as isize + offset;
                if rr < 0 || rr as usize >= r {
                    continue;
                }
                let v = horizontal[rr as usize * r + col];
                if v.is_nan() {
                    continue;
                }
                sum += w * v;
                weight_sum += w;
            }
            grid.set(
                row,
                col,
                if weight_sum > 0.0 { sum / weight_sum } else { f64::NAN },
            );
        }
    }
    let _ = kernel_sum;
}
