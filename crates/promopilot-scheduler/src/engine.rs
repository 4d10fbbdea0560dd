//! Scheduler engine — owns the task queue and guarantees each ready task is
//! dispatched exactly once (barring explicit retry).
//!
//! Two entry points matter: [`SchedulerEngine::schedule_at`] places new work
//! and [`SchedulerEngine::tick_at`] drains due work. Both take an explicit
//! `now` so tests drive a virtual clock; the wall-clock wrappers are what
//! the runtime loop calls.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use promopilot_core::config::SchedulerConfig;
use promopilot_core::error::{PromoPilotError, Result};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::executor::{ExecutorRegistry, Outcome};
use crate::persistence::SchedulerDb;
use crate::queue::{QueueStats, TaskQueue};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::task::{Task, TaskPayload, TaskPriority, TaskStatus};

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickSummary {
    pub dispatched: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Admin-facing scheduler status.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub queue: QueueStats,
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// The scheduler engine — maintains the durable priority queue and
/// dispatches due tasks to registered executors.
pub struct SchedulerEngine {
    queue: TaskQueue,
    db: SchedulerDb,
    registry: Arc<ExecutorRegistry>,
    retry: RetryPolicy,
    config: SchedulerConfig,
    last_tick_at: Option<DateTime<Utc>>,
}

impl SchedulerEngine {
    /// Create an engine, reloading any persisted tasks.
    pub fn new(db: SchedulerDb, registry: Arc<ExecutorRegistry>, config: SchedulerConfig) -> Self {
        let tasks = db.load_tasks();
        if !tasks.is_empty() {
            tracing::info!("📦 Reloaded {} task(s) from storage", tasks.len());
        }
        let retry = RetryPolicy::new(config.base_retry_delay_secs);
        Self {
            queue: TaskQueue::from_tasks(tasks),
            db,
            registry,
            retry,
            config,
            last_tick_at: None,
        }
    }

    /// Schedule new work at the wall clock.
    pub fn schedule(
        &mut self,
        payload: TaskPayload,
        priority: TaskPriority,
        requested_for: DateTime<Utc>,
    ) -> Result<String> {
        self.schedule_at(payload, priority, requested_for, Utc::now())
    }

    /// Schedule new work relative to an explicit `now`.
    ///
    /// Placement rules:
    /// - a requested time in the past is clamped to `now + 1s`;
    /// - High/Urgent under acceptable pending load run as soon as possible;
    /// - everything else is nudged forward to the per-kind optimal hour,
    ///   never earlier than requested.
    pub fn schedule_at(
        &mut self,
        payload: TaskPayload,
        priority: TaskPriority,
        requested_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let task = Task::new(payload, priority, requested_for)
            .with_max_retries(self.config.default_max_retries);
        self.schedule_task_at(task, now)
    }

    /// Schedule a pre-built task (callers that need custom retry budgets or
    /// duration estimates). Placement rules still apply.
    pub fn schedule_task_at(&mut self, mut task: Task, now: DateTime<Utc>) -> Result<String> {
        if task.status != TaskStatus::Pending {
            return Err(PromoPilotError::Scheduler(format!(
                "cannot schedule task in status '{}'",
                task.status
            )));
        }

        let floor = now + Duration::seconds(1);
        let requested = task.scheduled_for.max(floor);

        task.scheduled_for = if task.priority.is_elevated()
            && self.queue.pending_count() < self.config.load_compression_threshold
        {
            // Light load: elevated work runs as soon as it legally can.
            floor
        } else {
            self.nudge_to_optimal_hour(&task, requested)
        };

        tracing::info!(
            "📅 Scheduled {} task {} ({}) for {}",
            task.priority,
            task.id,
            task.kind(),
            task.scheduled_for.to_rfc3339()
        );

        let id = self.queue.insert(task);
        self.persist(&id);
        Ok(id)
    }

    /// Move `when` forward to the next occurrence of the kind's preferred
    /// hour, if one is configured and `when` isn't already inside it.
    fn nudge_to_optimal_hour(&self, task: &Task, when: DateTime<Utc>) -> DateTime<Utc> {
        let Some(&hour) = self.config.optimal_hours.get(&task.kind().to_string()) else {
            return when;
        };
        if when.hour() == hour {
            return when;
        }
        let same_day = Utc
            .with_ymd_and_hms(when.year(), when.month(), when.day(), hour, 0, 0)
            .single();
        match same_day {
            Some(candidate) if candidate >= when => candidate,
            Some(candidate) => candidate + Duration::days(1),
            None => when,
        }
    }

    /// Cancel a task. Only Pending tasks are cancellable; in-flight work
    /// runs to completion and terminal tasks stay as they are.
    pub fn cancel(&mut self, id: &str) -> Result<()> {
        let task = self
            .queue
            .get_mut(id)
            .ok_or_else(|| PromoPilotError::Scheduler(format!("unknown task: {id}")))?;
        if task.status != TaskStatus::Pending {
            return Err(PromoPilotError::Scheduler(format!(
                "cannot cancel task {id} in status '{}'",
                task.status
            )));
        }
        task.status = TaskStatus::Cancelled;
        tracing::info!("🛑 Cancelled task {id}");
        self.persist(id);
        Ok(())
    }

    /// Dispatch due tasks at the wall clock.
    pub async fn tick(&mut self) -> TickSummary {
        self.tick_at(Utc::now()).await
    }

    /// Dispatch up to `max_dispatch_per_tick` due tasks, in
    /// `(priority desc, scheduled_for asc, seq asc)` order. One task's
    /// failure never stops the rest of the batch.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();
        self.last_tick_at = Some(now);

        let due = self
            .queue
            .due_pending(now, self.config.max_dispatch_per_tick);
        if due.is_empty() {
            return summary;
        }

        // Claim the batch before any await so a re-entrant tick cannot
        // double-dispatch.
        let mut batch: Vec<Task> = Vec::with_capacity(due.len());
        for id in &due {
            if let Some(task) = self.queue.get_mut(id) {
                task.status = TaskStatus::InProgress;
                batch.push(task.clone());
            }
        }
        for task in &batch {
            self.persist(&task.id);
        }
        summary.dispatched = batch.len();

        let timeout = StdDuration::from_secs(self.config.executor_timeout_secs);
        let registry = Arc::clone(&self.registry);
        let outcomes = futures::future::join_all(
            batch.iter().map(|task| {
                let registry = Arc::clone(&registry);
                async move { registry.run(task, timeout).await }
            }),
        )
        .await;

        for (task, outcome) in batch.iter().zip(outcomes) {
            self.settle(&task.id, outcome, now, &mut summary);
        }
        self.queue.resort();
        summary
    }

    /// Apply one dispatch outcome to the task's state machine.
    fn settle(&mut self, id: &str, outcome: Outcome, now: DateTime<Utc>, summary: &mut TickSummary) {
        let retry = self.retry;
        let Some(task) = self.queue.get_mut(id) else { return };

        match outcome {
            Outcome::Success => {
                task.status = TaskStatus::Completed;
                summary.completed += 1;
                tracing::info!("✅ Task {id} ({}) completed", task.kind());
            }
            Outcome::Permanent(err) => {
                task.status = TaskStatus::Failed;
                task.last_error = Some(err.clone());
                summary.failed += 1;
                tracing::warn!("❌ Task {id} ({}) failed permanently: {err}", task.kind());
            }
            Outcome::Retryable(err) => match retry.next_attempt(task.retry_count, task.max_retries)
            {
                RetryDecision::Retry { retry_count, delay } => {
                    task.retry_count = retry_count;
                    task.status = TaskStatus::Pending;
                    task.scheduled_for = now + delay;
                    task.last_error = Some(err.clone());
                    summary.retried += 1;
                    tracing::warn!(
                        "🔁 Task {id} ({}) failed (attempt {retry_count}/{}), retrying in {}s: {err}",
                        task.kind(),
                        task.max_retries,
                        delay.num_seconds()
                    );
                }
                RetryDecision::GiveUp => {
                    task.status = TaskStatus::Failed;
                    task.last_error = Some(err.clone());
                    summary.failed += 1;
                    tracing::warn!(
                        "❌ Task {id} ({}) exhausted {} retries: {err}",
                        task.kind(),
                        task.max_retries
                    );
                }
            },
        }
        self.persist(id);
    }

    /// Look up a task (admin/status surface).
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.queue.get(id)
    }

    /// Iterate all known tasks (the controller reads completed work here).
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            queue: self.queue.stats(),
            last_tick_at: self.last_tick_at,
        }
    }

    /// Best-effort persist; storage trouble is logged, never fatal to a tick.
    fn persist(&self, id: &str) {
        if let Some(task) = self.queue.get(id) {
            if let Err(e) = self.db.save_task(task) {
                tracing::warn!("⚠️ Failed to persist task {id}: {e}");
            }
        }
    }
}

/// Run the scheduler tick loop until shutdown is signalled.
pub async fn spawn_scheduler(
    engine: Arc<Mutex<SchedulerEngine>>,
    poll_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("⏰ Scheduler started (tick every {poll_interval_secs}s)");
    let mut interval = tokio::time::interval(StdDuration::from_secs(poll_interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = {
                    let mut eng = engine.lock().await;
                    eng.tick().await
                };
                if summary.dispatched > 0 {
                    tracing::info!(
                        "🎛️ Tick: {} dispatched, {} completed, {} retried, {} failed",
                        summary.dispatched,
                        summary.completed,
                        summary.retried,
                        summary.failed
                    );
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("⏰ Scheduler loop stopping");
                break;
            }
        }
    }
}
