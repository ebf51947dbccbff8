//! Worker pool for blocking verification/download/hash tasks.
//!
//! Pool size is a configuration knob: `None` (the default) places no bound on
//! in-flight tasks, `Some(n)` gates them through a semaphore. There is no
//! cancellation: callers submit a batch and await every unit to completion.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Clone)]
pub struct TaskPool {
    permits: Option<Arc<Semaphore>>,
}

impl TaskPool {
    pub fn new(size: Option<usize>) -> Self {
        let permits = size.map(|n| Arc::new(Semaphore::new(n.max(1))));
        if let Some(n) = size {
            tracing::debug!(size = n, "bounded task pool");
        } else {
            tracing::debug!("unbounded task pool");
        }
        Self { permits }
    }

    /// Run one blocking unit of work on the pool, waiting for a permit first
    /// when the pool is bounded.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = match &self.permits {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow!("task pool closed: {e}"))?,
            ),
            None => None,
        };
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| anyhow!("worker task join: {e}"))
    }

    /// Submit a batch of blocking units and wait for all of them, preserving
    /// submission order in the returned vector. A panicked or otherwise
    /// unjoinable unit surfaces as an error; the rest of the batch is still
    /// awaited first.
    pub async fn run_all<F, T>(&self, tasks: Vec<F>) -> Vec<Result<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut join_set = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let pool = self.clone();
            join_set.spawn(async move { (index, pool.run(task).await) });
        }
        let mut results: Vec<Option<Result<T>>> = Vec::new();
        results.resize_with(join_set.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => {
                    // Slot stays None only if the task itself vanished; the
                    // index is unrecoverable, so report at drain time below.
                    tracing::error!("BUG: batch task join failed: {e}");
                }
            }
        }
        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("worker task vanished before joining"))))
            .collect()
    }
}
