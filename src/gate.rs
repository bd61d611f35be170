//! Rate-limited request gate (C1). Serializes outbound journey-planner calls
//! under a global concurrency cap and a minimum inter-call spacing.

use std::{sync::Arc, time::Duration as StdDuration};

use thiserror::Error;
use tokio::{
    sync::{Mutex, Semaphore},
    time::Instant,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Abstraction over the outbound call itself. A `reqwest`-backed
/// implementation lives in [`crate::oracle`] behind the `remote-oracle`
/// feature; tests substitute a scripted planner.
#[async_trait::async_trait]
pub trait JourneyPlanner: Send + Sync {
    /// Performs one request and returns the raw response body alongside an
    /// HTTP-style status code. A `429` status signals quota exhaustion; the
    /// gate does not interpret the body.
    async fn send(&self, request: &str) -> Result<(String, u16), Error>;
}

/// Holds the two coordination primitives described in the concurrency
/// model: a semaphore bounding in-flight calls, and a mutex guarding the
/// last-call timestamp used for spacing.
pub struct RateGate<P> {
    planner: P,
    permits: Semaphore,
    spacing: StdDuration,
    last_call: Mutex<Option<Instant>>,
}

impl<P: JourneyPlanner> RateGate<P> {
    pub fn new(planner: P, concurrency: usize, spacing: StdDuration) -> Self {
        Self {
            planner,
            permits: Semaphore::new(concurrency),
            spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Sends one request, respecting spacing and concurrency. The spacing
    /// mutex is held only across the scheduling decision, not the I/O, so
    /// concurrent permits achieve real parallelism once clear to proceed.
    pub async fn send(&self, request: &str) -> Result<(String, u16), Error> {
        {
            let mut last = self.last_call.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < self.spacing {
                    tokio::time::sleep(self.spacing - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .expect("semaphore is never closed");
        self.planner.send(request).await
    }
}

/// Cooperative cancellation token threaded through oracle/gate calls. A
/// cloneable flag, not a future: callers check it at each suspension point
/// named in the concurrency model rather than racing against it.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
