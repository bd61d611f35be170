use thiserror::Error;

use crate::{cache, contour, gate, interpolate, sampler};

/// Crate-level error surface. Every module-local error enum converts into one
/// of these variants; callers match on this type rather than reaching into
/// module internals.
#[derive(Error, Debug)]
pub enum Error {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("no trip found")]
    NoTrip,
    #[error("no destination candidate found")]
    NoDestination,
    #[error("no access station found")]
    NoStation,
    #[error("task exceeded its time budget")]
    Timeout,
    #[error("task was cancelled")]
    Cancelled,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("cache corrupt, starting empty: {0}")]
    CacheCorrupt(String),
    #[error("fewer than 4 points resolved, refusing to interpolate")]
    InsufficientData,
    #[error("interpolation grid is entirely NaN")]
    GridAllNaN,
}

impl From<gate::Error> for Error {
    fn from(value: gate::Error) -> Self {
        match value {
            gate::Error::RateLimited => Error::RateLimited,
            gate::Error::Transport(msg) => Error::Transport(msg),
        }
    }
}

impl From<cache::Error> for Error {
    fn from(value: cache::Error) -> Self {
        match value {
            cache::Error::Corrupt(msg) => Error::CacheCorrupt(msg),
            cache::Error::Io(msg) => Error::CacheCorrupt(msg),
        }
    }
}

impl From<sampler::Error> for Error {
    fn from(value: sampler::Error) -> Self {
        match value {
            sampler::Error::InsufficientData => Error::InsufficientData,
        }
    }
}

impl From<interpolate::Error> for Error {
    fn from(value: interpolate::Error) -> Self {
        match value {
            interpolate::Error::GridAllNaN => Error::GridAllNaN,
            interpolate::Error::InsufficientData => Error::InsufficientData,
        }
    }
}

impl From<contour::Error> for Error {
    fn from(value: contour::Error) -> Self {
        match value {
            contour::Error::InvalidGeometry(msg) => Error::Transport(msg),
        }
    }
}
