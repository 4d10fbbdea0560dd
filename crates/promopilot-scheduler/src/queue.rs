//! Priority-ordered task queue.
//!
//! Order is `(priority desc, scheduled_for asc, seq asc)` — urgent work
//! first, earlier deadlines first, FIFO between equals. Terminal tasks stay
//! in the collection for status queries but never re-enter dispatch order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{Task, TaskStatus};

/// In-memory task collection kept in dispatch order.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted tasks (restart path).
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let next_seq = tasks.iter().map(|t| t.seq + 1).max().unwrap_or(0);
        let mut queue = Self { tasks, next_seq };
        queue.resort();
        queue
    }

    /// Insert a task, assigning its FIFO sequence number.
    pub fn insert(&mut self, mut task: Task) -> String {
        task.seq = self.next_seq;
        self.next_seq += 1;
        let id = task.id.clone();
        self.tasks.push(task);
        self.resort();
        id
    }

    /// IDs of pending tasks due at `now`, in dispatch order, capped at `limit`.
    pub fn due_pending(&self, now: DateTime<Utc>, limit: usize) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.is_due(now))
            .take(limit)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks still waiting to run — the "system load" signal
    /// used by schedule-time placement.
    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    /// Re-sort after any mutation that changes priority or time.
    pub fn resort(&mut self) {
        self.tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_for.cmp(&b.scheduled_for))
                .then(a.seq.cmp(&b.seq))
        });
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

/// Per-status task counts, reported on the admin surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPayload, TaskPriority};
    use chrono::Duration;

    fn report(priority: TaskPriority, at: DateTime<Utc>) -> Task {
        Task::new(TaskPayload::AnalyticsReport { period_days: 1 }, priority, at)
    }

    #[test]
    fn test_priority_before_time() {
        let now = Utc::now();
        let mut q = TaskQueue::new();
        // B is due earlier but has lower priority than A.
        let b = q.insert(report(TaskPriority::Low, now - Duration::seconds(10)));
        let a = q.insert(report(TaskPriority::High, now));

        let due = q.due_pending(now, 10);
        assert_eq!(due, vec![a, b]);
    }

    #[test]
    fn test_fifo_tie_break() {
        let now = Utc::now();
        let mut q = TaskQueue::new();
        let first = q.insert(report(TaskPriority::Medium, now));
        let second = q.insert(report(TaskPriority::Medium, now));

        let due = q.due_pending(now, 10);
        assert_eq!(due, vec![first, second]);
    }

    #[test]
    fn test_due_respects_limit_and_time() {
        let now = Utc::now();
        let mut q = TaskQueue::new();
        q.insert(report(TaskPriority::Low, now));
        q.insert(report(TaskPriority::Low, now));
        q.insert(report(TaskPriority::Low, now + Duration::hours(1)));

        assert_eq!(q.due_pending(now, 10).len(), 2);
        assert_eq!(q.due_pending(now, 1).len(), 1);
    }

    #[test]
    fn test_terminal_tasks_not_due() {
        let now = Utc::now();
        let mut q = TaskQueue::new();
        let id = q.insert(report(TaskPriority::Urgent, now));
        q.get_mut(&id).unwrap().status = TaskStatus::Completed;

        assert!(q.due_pending(now, 10).is_empty());
        assert_eq!(q.stats().completed, 1);
    }

    #[test]
    fn test_from_tasks_restores_seq() {
        let now = Utc::now();
        let mut q = TaskQueue::new();
        q.insert(report(TaskPriority::Low, now));
        q.insert(report(TaskPriority::Low, now));
        let tasks: Vec<Task> = q.iter().cloned().collect();

        let mut restored = TaskQueue::from_tasks(tasks);
        let id = restored.insert(report(TaskPriority::Low, now));
        assert_eq!(restored.get(&id).unwrap().seq, 2);
    }
}
