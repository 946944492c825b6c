//! Bounded, order-preserving task execution
//!
//! [`ConcurrencyScheduler::run`] drives a batch of futures with at most
//! `max_workers` in flight. Each task runs in its own tokio task, so a panic
//! only poisons that task's slot; siblings keep running. Results come back
//! in submission order regardless of completion order.

use futures::stream::{self, StreamExt};
use std::future::Future;
use thiserror::Error;
use tokio::task::JoinError;

/// Failure of a single scheduled task
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled")]
    Cancelled,
}

impl From<JoinError> for TaskError {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return TaskError::Cancelled;
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        TaskError::Panicked(message)
    }
}

/// Fixed-size worker set for batch work
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyScheduler {
    max_workers: usize,
}

impl ConcurrencyScheduler {
    /// Creates a scheduler; a worker count of zero is treated as one
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs every task and returns their results in input order
    ///
    /// Tasks are spawned lazily, so no more than `max_workers` exist at a
    /// time. A panicking task yields [`TaskError::Panicked`] in its slot.
    pub async fn run<I, F, T>(&self, tasks: I) -> Vec<Result<T, TaskError>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut indexed: Vec<(usize, Result<T, TaskError>)> =
            stream::iter(tasks.into_iter().enumerate())
                .map(|(index, task)| async move {
                    let result = tokio::spawn(task).await.map_err(TaskError::from);
                    if let Err(e) = &result {
                        tracing::warn!(index, error = %e, "Scheduled task failed");
                    }
                    (index, result)
                })
                .buffer_unordered(self.max_workers)
                .collect()
                .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}
