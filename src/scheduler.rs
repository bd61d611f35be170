//! Batch Scheduler (C7): runs task factories as bounded-concurrency batches
//! with a per-task timeout and an abort predicate, over `tokio::task::JoinSet`.

use std::{future::Future, time::Duration as StdDuration};

use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, warn};

use crate::gate::CancellationToken;

/// Runs `items` through `make_task`, B at a time, cancelling the remainder
/// of the whole run the moment `should_abort` returns true for a finished
/// result. Results preserve item order; aborted/timed-out/not-yet-started
/// items are simply absent rather than padded with placeholders.
pub async fn run_batches<I, T, Fut, F, A>(
    items: Vec<I>,
    batch_size: usize,
    per_task_timeout: StdDuration,
    token: &CancellationToken,
    mut make_task: F,
    mut should_abort: A,
) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    F: FnMut(I, CancellationToken) -> Fut,
    A: FnMut(&T) -> bool,
{
    let mut results = Vec::with_capacity(items.len());
    let mut chunks = items.into_iter();
    let mut aborted = false;

    'batches: loop {
        if aborted || token.is_cancelled() {
            break;
        }
        let batch: Vec<I> = (&mut chunks).take(batch_size).collect();
        if batch.is_empty() {
            break;
        }

        let mut set: JoinSet<Option<T>> = JoinSet::new();
        for item in batch {
            let task = make_task(item, token.clone());
            set.spawn(async move {
                match timeout(per_task_timeout, task).await {
                    Ok(result) => Some(result),
                    Err(_) => {
                        warn!("task exceeded its time budget");
                        None
                    }
                }
            });
        }

        debug!("batch of {} tasks dispatched", set.len());

        while let Some(joined) = set.join_next().await {
            let Ok(Some(result)) = joined else {
                continue;
            };
            let abort_now = should_abort(&result);
            results.push(result);
            if abort_now {
                token.cancel();
                set.abort_all();
                aborted = true;
                break 'batches;
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test]
    async fn runs_all_items_without_abort() {
        let items: Vec<u32> = (0..25).collect();
        let token = CancellationToken::new();
        let results = run_batches(
            items,
            10,
            StdDuration::from_secs(1),
            &token,
            |item, _token| async move { item * 2 },
            |_| false,
        )
        .await;
        assert_eq!(results.len(), 25);
    }

    #[tokio::test]
    async fn abort_predicate_stops_remaining_batches() {
        let items: Vec<u32> = (0..100).collect();
        let token = CancellationToken::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let results = run_batches(
            items,
            5,
            StdDuration::from_secs(1),
            &token,
            move |item, _token| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
                async move { item }
            },
            |item| *item == 3,
        )
        .await;
        assert!(results.len() < 100);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn timed_out_task_is_dropped_from_results() {
        let items = vec![1u32];
        let token = CancellationToken::new();
        let results = run_batches(
            items,
            1,
            StdDuration::from_millis(10),
            &token,
            |_item, _token| async move {
                tokio::time::sleep(StdDuration::from_millis(50)).await;
                1u32
            },
            |_| false,
        )
        .await;
        assert!(results.is_empty());
    }
}
