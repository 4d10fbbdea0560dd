//! Admin handle — a cheap, cloneable front door to the running
//! orchestrator. Everything an operator surface (CLI, future HTTP admin)
//! needs goes through here rather than touching the engines directly.

use std::sync::Arc;

use chrono::Utc;
use promopilot_core::error::Result;
use promopilot_scheduler::{SchedulerEngine, SchedulerStatus, Task, TaskPayload, TaskPriority};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::autonomous::{AutonomousEngine, AutonomyTuning};
use crate::controller::{AutomationController, ControllerStatus};
use crate::store::AuditRecord;

/// Combined status snapshot across the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub scheduler: SchedulerStatus,
    pub automation: ControllerStatus,
    pub autonomy_enabled: bool,
}

/// Handle onto the running engines.
#[derive(Clone)]
pub struct OrchestratorHandle {
    scheduler: Arc<Mutex<SchedulerEngine>>,
    controller: Arc<Mutex<AutomationController>>,
    autonomous: Option<Arc<Mutex<AutonomousEngine>>>,
    shutdown: watch::Sender<bool>,
}

impl OrchestratorHandle {
    pub fn new(
        scheduler: Arc<Mutex<SchedulerEngine>>,
        controller: Arc<Mutex<AutomationController>>,
        autonomous: Option<Arc<Mutex<AutonomousEngine>>>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self { scheduler, controller, autonomous, shutdown }
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let scheduler = self.scheduler.lock().await.status();
        let automation = self.controller.lock().await.status();
        OrchestratorStatus {
            scheduler,
            automation,
            autonomy_enabled: self.autonomous.is_some(),
        }
    }

    /// Enqueue a one-off task.
    pub async fn schedule(&self, payload: TaskPayload, priority: TaskPriority) -> Result<String> {
        let now = Utc::now();
        self.scheduler.lock().await.schedule_at(payload, priority, now, now)
    }

    pub async fn cancel_task(&self, id: &str) -> Result<()> {
        self.scheduler.lock().await.cancel(id)
    }

    pub async fn task(&self, id: &str) -> Option<Task> {
        self.scheduler.lock().await.task(id).cloned()
    }

    /// Fire a rule by name, bypassing its interval gate.
    pub async fn trigger_rule(&self, name: &str) -> Result<()> {
        self.controller.lock().await.trigger_rule(name, Utc::now()).await
    }

    /// Newest entries from the decision audit trail.
    pub async fn recent_decisions(&self, limit: u32) -> Vec<AuditRecord> {
        self.controller.lock().await.recent_audit(limit)
    }

    /// Adjust the autonomous engine's knobs. No-op when autonomy is off.
    pub async fn update_tuning(&self, tuning: AutonomyTuning) {
        if let Some(engine) = &self.autonomous {
            engine.lock().await.set_tuning(tuning);
        }
    }

    /// Signal every loop to stop.
    pub fn shutdown(&self) {
        tracing::info!("🛑 Shutdown requested");
        let _ = self.shutdown.send(true);
    }
}
