//! SQLite-backed persistence for scheduler tasks.
//! The queue survives restarts; terminal tasks stay queryable with their
//! final error context.

use std::path::Path;

use chrono::{DateTime, Utc};
use promopilot_core::error::{PromoPilotError, Result};

use crate::task::{Task, TaskPriority, TaskStatus};

/// SQLite store for the task queue.
pub struct SchedulerDb {
    conn: rusqlite::Connection,
}

impl SchedulerDb {
    /// Open or create the scheduler database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| PromoPilotError::Storage(format!("DB open: {e}")))?;
        // Several components hold their own connection to this file; WAL and
        // a busy timeout keep concurrent writes from surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| PromoPilotError::Storage(format!("DB busy timeout: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PromoPilotError::Storage(format!("DB journal mode: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| PromoPilotError::Storage(format!("DB open: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,           -- JSON, tagged by kind
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                scheduled_for TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                estimated_duration_secs INTEGER NOT NULL DEFAULT 60,
                last_error TEXT,
                created_at TEXT NOT NULL,
                seq INTEGER NOT NULL DEFAULT 0
            );
         ",
            )
            .map_err(|e| PromoPilotError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Insert or update a task (idempotent write).
    pub fn save_task(&self, task: &Task) -> Result<()> {
        let payload = serde_json::to_string(&task.payload)
            .map_err(|e| PromoPilotError::Storage(format!("Serialize payload: {e}")))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO tasks
                 (id, payload, priority, status, scheduled_for, retry_count, max_retries,
                  estimated_duration_secs, last_error, created_at, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    task.id,
                    payload,
                    task.priority.to_string(),
                    task.status.to_string(),
                    task.scheduled_for.to_rfc3339(),
                    task.retry_count,
                    task.max_retries,
                    task.estimated_duration_secs,
                    task.last_error,
                    task.created_at.to_rfc3339(),
                    task.seq,
                ],
            )
            .map_err(|e| PromoPilotError::Storage(format!("Save task: {e}")))?;
        Ok(())
    }

    /// Load all tasks. Rows that no longer parse are skipped with a warning
    /// rather than poisoning the whole load.
    pub fn load_tasks(&self) -> Vec<Task> {
        let mut stmt = match self.conn.prepare(
            "SELECT id, payload, priority, status, scheduled_for, retry_count, max_retries,
                    estimated_duration_secs, last_error, created_at, seq
             FROM tasks ORDER BY seq",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let payload_str: String = row.get(1)?;
                let priority_str: String = row.get(2)?;
                let status_str: String = row.get(3)?;
                let scheduled_for_str: String = row.get(4)?;
                let retry_count: u32 = row.get(5)?;
                let max_retries: u32 = row.get(6)?;
                let estimated_duration_secs: u64 = row.get(7)?;
                let last_error: Option<String> = row.get(8)?;
                let created_at_str: String = row.get(9)?;
                let seq: u64 = row.get(10)?;
                Ok((
                    id,
                    payload_str,
                    priority_str,
                    status_str,
                    scheduled_for_str,
                    retry_count,
                    max_retries,
                    estimated_duration_secs,
                    last_error,
                    created_at_str,
                    seq,
                ))
            })
            .ok();

        let Some(rows) = rows else { return Vec::new() };

        rows.filter_map(|r| r.ok())
            .filter_map(
                |(
                    id,
                    payload_str,
                    priority_str,
                    status_str,
                    scheduled_for_str,
                    retry_count,
                    max_retries,
                    estimated_duration_secs,
                    last_error,
                    created_at_str,
                    seq,
                )| {
                    let payload = match serde_json::from_str(&payload_str) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!("⚠️ Skipping task {id}: bad payload ({e})");
                            return None;
                        }
                    };
                    Some(Task {
                        id,
                        payload,
                        priority: parse_priority(&priority_str),
                        scheduled_for: parse_time(&scheduled_for_str),
                        status: parse_status(&status_str),
                        retry_count,
                        max_retries,
                        estimated_duration_secs,
                        last_error,
                        created_at: parse_time(&created_at_str),
                        seq,
                    })
                },
            )
            .collect()
    }

}

fn parse_priority(s: &str) -> TaskPriority {
    match s {
        "urgent" => TaskPriority::Urgent,
        "high" => TaskPriority::High,
        "low" => TaskPriority::Low,
        _ => TaskPriority::Medium,
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
