//! # PromoPilot Scheduler
//!
//! Durable, priority-ordered task scheduling for the automation core.
//!
//! ## Architecture
//! ```text
//! schedule(payload, priority, when)
//!   → placement (clamp past → nudge/compress)
//!   → TaskQueue (priority desc, scheduled_for asc, FIFO)
//!   → tick(): due tasks, bounded batch
//!     → ExecutorRegistry.run(kind → handler, timeout)
//!       → Success  → Completed
//!       → Retryable → RetryPolicy (linear backoff) → Pending | Failed
//!       → Permanent → Failed
//!   → SQLite persistence on every transition
//! ```

pub mod engine;
pub mod executor;
pub mod persistence;
pub mod queue;
pub mod retry;
pub mod task;

pub use engine::{SchedulerEngine, SchedulerStatus, TickSummary, spawn_scheduler};
pub use executor::{ExecError, ExecutorRegistry, Outcome, TaskExecutor};
pub use persistence::SchedulerDb;
pub use queue::{QueueStats, TaskQueue};
pub use retry::{RetryDecision, RetryPolicy};
pub use task::{Task, TaskKind, TaskPayload, TaskPriority, TaskStatus};
