//! Bounded concurrent batch execution.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::TinyConfig;

/// Runs batches of futures with at most `limit` in flight.
///
/// The cap comes from `TINY_SEMAPHORE_LIMIT` (default 5) when built via
/// [`SemaphoreRunner::from_env`]. Results are returned in input order.
#[derive(Clone)]
pub struct SemaphoreRunner {
    limit: usize,
    semaphore: Arc<Semaphore>,
}

impl SemaphoreRunner {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Build from the process config (environment-driven cap).
    pub fn from_env() -> Self {
        Self::new(TinyConfig::global().semaphore_limit())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run all futures, never more than `limit` concurrently.
    pub async fn run_all<F, T>(&self, futures: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T> + Send,
        T: Send,
    {
        let guarded = futures.into_iter().map(|future| {
            let semaphore = self.semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("semaphore closed while running batch");
                future.await
            }
        });
        futures::future::join_all(guarded).await
    }
}

impl std::fmt::Debug for SemaphoreRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemaphoreRunner")
            .field("limit", &self.limit)
            .finish()
    }
}
