//! Task definitions — the core data model for scheduled work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal task priority. `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// High/Urgent tasks get pulled toward "now" when the queue is quiet.
    pub fn is_elevated(&self) -> bool {
        matches!(self, TaskPriority::High | TaskPriority::Urgent)
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// What a task does, with a strongly-typed payload per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    ContentCreation { topic: String, category: String },
    AffiliateScraping { url: String },
    BlogOptimization { post_id: String },
    ProductUpdate { product_id: String, source_url: Option<String> },
    AnalyticsReport { period_days: u32 },
    SocialPost { account: String, content_id: String },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::ContentCreation { .. } => TaskKind::ContentCreation,
            TaskPayload::AffiliateScraping { .. } => TaskKind::AffiliateScraping,
            TaskPayload::BlogOptimization { .. } => TaskKind::BlogOptimization,
            TaskPayload::ProductUpdate { .. } => TaskKind::ProductUpdate,
            TaskPayload::AnalyticsReport { .. } => TaskKind::AnalyticsReport,
            TaskPayload::SocialPost { .. } => TaskKind::SocialPost,
        }
    }
}

/// Payload-free discriminant, used as the executor dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ContentCreation,
    AffiliateScraping,
    BlogOptimization,
    ProductUpdate,
    AnalyticsReport,
    SocialPost,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::ContentCreation => write!(f, "content_creation"),
            TaskKind::AffiliateScraping => write!(f, "affiliate_scraping"),
            TaskKind::BlogOptimization => write!(f, "blog_optimization"),
            TaskKind::ProductUpdate => write!(f, "product_update"),
            TaskKind::AnalyticsReport => write!(f, "analytics_report"),
            TaskKind::SocialPost => write!(f, "social_post"),
        }
    }
}

/// Task lifecycle status.
///
/// Transitions are monotonic: `Pending → InProgress → {Completed | Failed}`,
/// or `Pending → Cancelled`. Terminal tasks are never re-enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A unit of schedulable, retryable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID, assigned on creation.
    pub id: String,
    pub payload: TaskPayload,
    pub priority: TaskPriority,
    /// Task is eligible for dispatch only at or after this time.
    pub scheduled_for: DateTime<Utc>,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Informational, feeds load estimates.
    pub estimated_duration_secs: u64,
    /// Final error context of the last failed attempt.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Monotonic insertion counter — FIFO tie-break within equal
    /// priority and time.
    pub seq: u64,
}

impl Task {
    /// Create a new pending task. The queue assigns `seq` on insert.
    pub fn new(payload: TaskPayload, priority: TaskPriority, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: task_id(),
            payload,
            priority,
            scheduled_for,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            estimated_duration_secs: 60,
            last_error: None,
            created_at: Utc::now(),
            seq: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    /// Ready for dispatch at `now`?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.scheduled_for <= now
    }
}

/// Process-unique task id (no uuid crate needed for this).
fn task_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("task-{:x}-{:x}", t.as_secs(), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert!(TaskPriority::Medium < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Urgent);
        assert!(TaskPriority::Urgent.is_elevated());
        assert!(!TaskPriority::Low.is_elevated());
    }

    #[test]
    fn test_payload_kind() {
        let p = TaskPayload::ContentCreation {
            topic: "standing desks".into(),
            category: "office".into(),
        };
        assert_eq!(p.kind(), TaskKind::ContentCreation);
        assert_eq!(p.kind().to_string(), "content_creation");
    }

    #[test]
    fn test_payload_roundtrip_json() {
        let p = TaskPayload::SocialPost {
            account: "main".into(),
            content_id: "c-7".into(),
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"kind\":\"social_post\""));
        let back: TaskPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), TaskKind::SocialPost);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let task = Task::new(
            TaskPayload::AnalyticsReport { period_days: 7 },
            TaskPriority::Low,
            now - chrono::Duration::seconds(1),
        );
        assert!(task.is_due(now));

        let future = Task::new(
            TaskPayload::AnalyticsReport { period_days: 7 },
            TaskPriority::Low,
            now + chrono::Duration::hours(1),
        );
        assert!(!future.is_due(now));
    }

    #[test]
    fn test_unique_ids() {
        let a = Task::new(
            TaskPayload::AnalyticsReport { period_days: 1 },
            TaskPriority::Low,
            Utc::now(),
        );
        let b = Task::new(
            TaskPayload::AnalyticsReport { period_days: 1 },
            TaskPriority::Low,
            Utc::now(),
        );
        assert_ne!(a.id, b.id);
    }
}
