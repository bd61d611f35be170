//! Sample Generator (C8): produces the input point set for a request —
//! an adaptive jittered grid for network mode, radial rings for point mode.

pub mod network;
pub mod radial;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("fewer than 4 points resolved, refusing to interpolate")]
    InsufficientData,
}

/// Injectable random source so samplers are deterministic for a fixed seed
/// (S2), rather than reaching for a process-global RNG.
pub trait SampleRng {
    fn next_f64(&mut self) -> f64;

    fn jitter(&mut self, magnitude: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * magnitude
    }
}

pub struct StdRng(rand::rngs::StdRng);

impl StdRng {
    pub fn from_seed(seed: u64) -> Self {
        use rand::SeedableRng;
        Self(rand::rngs::StdRng::seed_from_u64(seed))
    }
}

impl SampleRng for StdRng {
    fn next_f64(&mut self) -> f64 {
        use rand::Rng;
        self.0.r#gen()
    }
}

/// Minimum number of resolved points required to proceed to interpolation
/// (§7's `InsufficientData`).
pub const MIN_POINTS_FOR_INTERPOLATION: usize = 4;

pub fn require_enough_points<T>(points: &[T]) -> Result<(), Error> {
    if points.len() < MIN_POINTS_FOR_INTERPOLATION {
        Err(Error::InsufficientData)
    } else {
        Ok(())
    }
}
