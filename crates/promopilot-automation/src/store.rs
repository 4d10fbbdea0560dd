//! SQLite persistence for automation rules plus the append-only audit log
//! shared by the controller and the autonomous engine.

use std::path::Path;

use chrono::{DateTime, Utc};
use promopilot_core::error::{PromoPilotError, Result};

use crate::rules::AutomationRule;

/// One entry in the decision audit trail. Never updated, only appended.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    /// Which component wrote the entry ("controller", "autonomy").
    pub component: String,
    pub decision: String,
    pub reason: String,
}

/// SQLite store for rules and the audit trail.
pub struct RuleDb {
    conn: rusqlite::Connection,
}

impl RuleDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| PromoPilotError::Storage(format!("DB open: {e}")))?;
        // Shares a file with the scheduler store; WAL plus a busy timeout
        // keep concurrent writes from surfacing SQLITE_BUSY.
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
            CREATE TABLE IF NOT EXISTS rules (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                body TEXT NOT NULL,              -- full rule as JSON
                is_active INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                component TEXT NOT NULL,
                decision TEXT NOT NULL,
                reason TEXT NOT NULL
            );
         ",
            )
            .map_err(|e| PromoPilotError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Insert or update a rule (idempotent write).
    pub fn save_rule(&self, rule: &AutomationRule) -> Result<()> {
        let body = serde_json::to_string(rule)
            .map_err(|e| PromoPilotError::Storage(format!("Serialize rule: {e}")))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO rules (id, name, body, is_active, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    rule.id,
                    rule.name,
                    body,
                    rule.is_active as i64,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| PromoPilotError::Storage(format!("Save rule: {e}")))?;
        Ok(())
    }

    /// Load all rules, including deactivated ones. Rows that no longer
    /// parse are skipped with a warning.
    pub fn load_rules(&self) -> Vec<AutomationRule> {
        let mut stmt = match self
            .conn
            .prepare("SELECT id, body FROM rules ORDER BY rowid")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok((id, body))
            })
            .ok();

        let Some(rows) = rows else { return Vec::new() };

        rows.filter_map(|r| r.ok())
            .filter_map(|(id, body)| match serde_json::from_str(&body) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping rule {id}: bad body ({e})");
                    None
                }
            })
            .collect()
    }

    /// Append one audit entry.
    pub fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO audit_log (at, component, decision, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    record.at.to_rfc3339(),
                    record.component,
                    record.decision,
                    record.reason,
                ],
            )
            .map_err(|e| PromoPilotError::Storage(format!("Append audit: {e}")))?;
        Ok(())
    }

    /// Most recent audit entries, newest first.
    pub fn recent_audit(&self, limit: u32) -> Vec<AuditRecord> {
        let mut stmt = match self.conn.prepare(
            "SELECT at, component, decision, reason
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        let rows = stmt
            .query_map([limit], |row| {
                let at: String = row.get(0)?;
                let component: String = row.get(1)?;
                let decision: String = row.get(2)?;
                let reason: String = row.get(3)?;
                Ok(AuditRecord {
                    at: DateTime::parse_from_rfc3339(&at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    component,
                    decision,
                    reason,
                })
            })
            .ok();

        match rows {
            Some(rows) => rows.filter_map(|r| r.ok()).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleTrigger, Schedule, seed_defaults};

    #[test]
    fn test_rule_roundtrip() {
        let db = RuleDb::open_in_memory().unwrap();
        let mut rule = AutomationRule::new(
            "daily",
            RuleTrigger::Interval { schedule: Schedule::Daily },
        );
        rule.execution_count = 4;
        db.save_rule(&rule).unwrap();

        let loaded = db.load_rules();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "daily");
        assert_eq!(loaded[0].execution_count, 4);
        assert!(matches!(
            loaded[0].trigger,
            RuleTrigger::Interval { schedule: Schedule::Daily }
        ));
    }

    #[test]
    fn test_save_updates_in_place() {
        let db = RuleDb::open_in_memory().unwrap();
        let mut rule = AutomationRule::new(
            "daily",
            RuleTrigger::Interval { schedule: Schedule::Daily },
        );
        db.save_rule(&rule).unwrap();
        rule.is_active = false;
        db.save_rule(&rule).unwrap();

        let loaded = db.load_rules();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_active);
    }

    #[test]
    fn test_seed_then_load() {
        let db = RuleDb::open_in_memory().unwrap();
        for rule in seed_defaults() {
            db.save_rule(&rule).unwrap();
        }
        assert_eq!(db.load_rules().len(), 3);
    }

    #[test]
    fn test_audit_append_and_read_newest_first() {
        let db = RuleDb::open_in_memory().unwrap();
        for i in 0..3 {
            db.append_audit(&AuditRecord {
                at: Utc::now(),
                component: "controller".into(),
                decision: format!("decision-{i}"),
                reason: "test".into(),
            })
            .unwrap();
        }
        let recent = db.recent_audit(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].decision, "decision-2");
    }
}
