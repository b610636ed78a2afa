//! Bounded-parallelism helper used everywhere a concurrency limit applies
//! (chunk upload/download, per-file session execution, full-scan hashing,
//! change-detector batch hashing).

use std::future::Future;
use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::sync::Semaphore;

/// Runs `items` through `f`, with at most `limit` futures in flight at
/// once, returning results in the order they complete (not input order).
pub struct Bounded {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Bounded {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Acquires a permit, valid until dropped. Use this when you need to
    /// hold a slot across an arbitrary async scope rather than driving a
    /// whole collection through [`Bounded::run_all`].
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    /// Drives `items` through `f` with bounded concurrency, collecting all
    /// results (order not preserved). `buffer_unordered` polls every
    /// in-flight future as it drives the combinator forward, so up to
    /// `limit` of them make progress concurrently regardless of how many
    /// items are queued behind them.
    pub async fn run_all<T, R, Fut, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
    {
        futures::stream::iter(items)
            .map(f)
            .buffer_unordered(self.limit)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_runs_all_items() {
        let bounded = Bounded::new(2);
        let items: Vec<u32> = (0..10).collect();
        let results = bounded.run_all(items, |i| async move { i * 2 }).await;
        let sum: u32 = results.iter().sum();
        assert_eq!(results.len(), 10);
        assert_eq!(sum, (0..10).map(|i| i * 2).sum::<u32>());
    }

    #[tokio::test]
    async fn run_all_never_exceeds_the_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limit = 3;
        let bounded = Bounded::new(limit);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..20).collect();

        bounded
            .run_all(items, |_| {
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert!(max_seen.load(Ordering::SeqCst) <= limit);
    }
}
