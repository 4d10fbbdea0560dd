//! Executor dispatch table — routes a task by kind to its handler and
//! normalizes whatever happens inside to a single outcome the retry logic
//! understands. Handler errors never escape past the registry.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;

use crate::task::{Task, TaskKind};

/// An error reported by a task handler.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Worth retrying with backoff (timeout, rate limit, flaky fetch).
    #[error("{0}")]
    Transient(String),
    /// Retrying cannot help (bad input, unsupported operation).
    #[error("{0}")]
    Permanent(String),
}

/// Handles one task kind. Implementations delegate to external
/// collaborators and report failure through the error type — they must not
/// panic for expected failure modes.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<(), ExecError>;
}

/// Normalized outcome of one dispatch, consumed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Failed, but the retry policy may re-enqueue.
    Retryable(String),
    /// Failed for good — no retry benefit.
    Permanent(String),
}

/// Maps task kinds to handlers.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: TaskKind, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn has(&self, kind: TaskKind) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Run the handler for `task` under `timeout`, converting every failure
    /// mode into an [`Outcome`].
    pub async fn run(&self, task: &Task, timeout: Duration) -> Outcome {
        let kind = task.kind();
        let Some(executor) = self.executors.get(&kind) else {
            // Unknown kind: retrying cannot conjure a handler.
            tracing::error!("🚫 No executor registered for task kind '{kind}' (task {})", task.id);
            return Outcome::Permanent(format!("no executor for kind '{kind}'"));
        };

        // Handlers must not unwind into the tick loop: a panicking handler
        // is caught here and settled as a permanent failure.
        let run = AssertUnwindSafe(executor.execute(task)).catch_unwind();
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(Ok(()))) => Outcome::Success,
            Ok(Ok(Err(ExecError::Transient(e)))) => Outcome::Retryable(e),
            Ok(Ok(Err(ExecError::Permanent(e)))) => Outcome::Permanent(e),
            Ok(Err(panic)) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("💥 Handler for task {} ({kind}) panicked: {msg}", task.id);
                Outcome::Permanent(format!("handler panicked: {msg}"))
            }
            Err(_) => Outcome::Retryable(format!("execution timed out after {timeout:?}")),
        }
    }
}
