//! # PromoPilot Automation
//!
//! The orchestration layer on top of the scheduler:
//!
//! ```text
//! AutomationController (cycle loop)
//!   rules → link discovery → content pipeline → posting → revenue → pruning
//!                │
//!                ▼ schedules tasks
//! SchedulerEngine ◄── AutonomousEngine (metric-gated corrective actions)
//!                │
//!                ▼ dispatches by kind
//! executors (content / scraping / optimization / products / analytics / social)
//! ```
//!
//! An [`OrchestratorHandle`] is the admin surface over all of it.

pub mod autonomous;
pub mod controller;
pub mod executors;
pub mod handle;
pub mod rules;
pub mod store;

pub use autonomous::{
    AutonomousEngine, AutonomySummary, AutonomyTuning, FixedMetrics, MetricsProvider,
    SystemMetrics, spawn_autonomous,
};
pub use controller::{
    AutomationController, ControllerStatus, PipelineItem, PipelineState, spawn_controller,
};
pub use executors::register_default_executors;
pub use handle::{OrchestratorHandle, OrchestratorStatus};
pub use rules::{
    AutomationRule, RuleActions, RuleConditions, RuleTrigger, Schedule, seed_defaults,
};
pub use store::{AuditRecord, RuleDb};
