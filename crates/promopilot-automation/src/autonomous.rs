//! Autonomous decision layer — samples platform metrics and schedules
//! corrective work without human input. Every gate is evaluated
//! independently, every decision lands in the audit trail, and the engine
//! tunes its own pace within configured bounds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promopilot_core::config::AutonomyConfig;
use promopilot_scheduler::{SchedulerEngine, TaskPayload, TaskPriority};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::store::{AuditRecord, RuleDb};

/// A point-in-time view of platform health. Scores are 0–100;
/// `revenue_trend` is the relative change over the sampling window.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemMetrics {
    pub content_velocity: f64,
    pub engagement: f64,
    pub revenue_trend: f64,
    pub health: f64,
}

/// Source of [`SystemMetrics`]. Production wires a live sampler; tests
/// inject fixed values.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn sample(&self) -> SystemMetrics;
}

/// Metrics provider returning a constant sample.
pub struct FixedMetrics(pub SystemMetrics);

#[async_trait]
impl MetricsProvider for FixedMetrics {
    async fn sample(&self) -> SystemMetrics {
        self.0
    }
}

/// Self-adjusted knobs, always held inside the configured bounds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AutonomyTuning {
    pub cycle_interval_mins: u64,
    pub max_actions_per_cycle: u32,
}

impl AutonomyTuning {
    fn from_config(config: &AutonomyConfig) -> Self {
        Self {
            cycle_interval_mins: config.cycle_interval_mins,
            max_actions_per_cycle: config.max_actions_per_cycle,
        }
        .clamped(config)
    }

    fn clamped(mut self, config: &AutonomyConfig) -> Self {
        self.cycle_interval_mins = self
            .cycle_interval_mins
            .clamp(config.min_cycle_interval_mins, config.max_cycle_interval_mins);
        self.max_actions_per_cycle = self
            .max_actions_per_cycle
            .clamp(config.min_actions_per_cycle, config.max_actions_per_cycle);
        self
    }
}

/// What one autonomous cycle decided.
#[derive(Debug, Clone, Default)]
pub struct AutonomySummary {
    pub actions_taken: u32,
    pub paused: bool,
}

/// The autonomous engine. Reads metrics, schedules corrective tasks,
/// audits every decision, and adapts its own cadence.
pub struct AutonomousEngine {
    metrics: Arc<dyn MetricsProvider>,
    scheduler: Arc<Mutex<SchedulerEngine>>,
    store: RuleDb,
    config: AutonomyConfig,
    tuning: AutonomyTuning,
    cycle_count: u64,
    last_run_at: Option<DateTime<Utc>>,
}

impl AutonomousEngine {
    pub fn new(
        metrics: Arc<dyn MetricsProvider>,
        scheduler: Arc<Mutex<SchedulerEngine>>,
        store: RuleDb,
        config: AutonomyConfig,
    ) -> Self {
        let tuning = AutonomyTuning::from_config(&config);
        Self {
            metrics,
            scheduler,
            store,
            config,
            tuning,
            cycle_count: 0,
            last_run_at: None,
        }
    }

    pub fn tuning(&self) -> AutonomyTuning {
        self.tuning
    }

    /// Force the tuning knobs (admin surface). Values are clamped to the
    /// configured bounds before taking effect.
    pub fn set_tuning(&mut self, tuning: AutonomyTuning) {
        self.tuning = tuning.clamped(&self.config);
        tracing::info!(
            "🎚️ Autonomy tuning set: every {}m, up to {} action(s)",
            self.tuning.cycle_interval_mins,
            self.tuning.max_actions_per_cycle
        );
    }

    pub async fn run_cycle(&mut self) -> AutonomySummary {
        self.run_cycle_at(Utc::now()).await
    }

    /// One decision cycle at an explicit `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> AutonomySummary {
        if !self.config.enabled {
            return AutonomySummary::default();
        }
        self.cycle_count += 1;
        self.last_run_at = Some(now);

        let m = self.metrics.sample().await;
        tracing::info!(
            "🧠 Autonomy cycle #{}: velocity {:.0}, engagement {:.0}, trend {:+.2}, health {:.0}",
            self.cycle_count,
            m.content_velocity,
            m.engagement,
            m.revenue_trend,
            m.health
        );

        // Health floor overrides everything: a struggling system gets no
        // extra load.
        if m.health < self.config.health_floor {
            tracing::warn!(
                "🛑 Health {:.0} below floor {:.0}, skipping autonomous actions",
                m.health,
                self.config.health_floor
            );
            self.record(now, "paused", &format!("health {:.0} below floor", m.health));
            self.slow_down();
            return AutonomySummary { actions_taken: 0, paused: true };
        }

        let mut actions = 0u32;
        let max = self.tuning.max_actions_per_cycle;

        if m.content_velocity < self.config.content_threshold && actions < max {
            self.schedule(
                TaskPayload::ContentCreation {
                    topic: "audience favorites refresh".to_string(),
                    category: "autonomous".to_string(),
                },
                TaskPriority::High,
                now,
            )
            .await;
            self.record(
                now,
                "boost_content",
                &format!("velocity {:.0} below {:.0}", m.content_velocity, self.config.content_threshold),
            );
            actions += 1;
        }

        if m.engagement < self.config.optimize_threshold && actions < max {
            self.schedule(
                TaskPayload::BlogOptimization { post_id: "latest".to_string() },
                TaskPriority::Medium,
                now,
            )
            .await;
            self.record(
                now,
                "optimize_content",
                &format!("engagement {:.0} below {:.0}", m.engagement, self.config.optimize_threshold),
            );
            actions += 1;
        }

        if m.revenue_trend < 0.0 && actions < max {
            self.schedule(
                TaskPayload::AnalyticsReport { period_days: 7 },
                TaskPriority::Medium,
                now,
            )
            .await;
            self.record(
                now,
                "investigate_revenue",
                &format!("revenue trend {:+.2}", m.revenue_trend),
            );
            actions += 1;
        }

        // Everything performing well: scale output up instead.
        let composite = (m.content_velocity + m.engagement + m.health) / 3.0;
        if composite > self.config.scale_threshold && actions < max {
            self.schedule(
                TaskPayload::ContentCreation {
                    topic: "momentum follow-up".to_string(),
                    category: "autonomous".to_string(),
                },
                TaskPriority::Medium,
                now,
            )
            .await;
            self.record(now, "scale_up", &format!("composite score {composite:.0}"));
            actions += 1;
        }

        // Floor: keep at least the minimum telemetry flowing.
        while actions < self.config.min_actions_per_cycle {
            self.schedule(
                TaskPayload::AnalyticsReport { period_days: 1 },
                TaskPriority::Low,
                now,
            )
            .await;
            self.record(now, "baseline_telemetry", "minimum action floor");
            actions += 1;
        }

        self.adapt(actions, max);
        AutonomySummary { actions_taken: actions, paused: false }
    }

    /// Adjust cadence from how busy the cycle was.
    fn adapt(&mut self, actions: u32, max: u32) {
        let before = self.tuning;
        if actions >= max {
            // Saturated: act more often and allow more per cycle.
            self.tuning.cycle_interval_mins = self.tuning.cycle_interval_mins.saturating_sub(15);
            self.tuning.max_actions_per_cycle += 1;
        } else if actions <= self.config.min_actions_per_cycle {
            self.slow_down();
        }
        self.tuning = self.tuning.clamped(&self.config);
        if self.tuning.cycle_interval_mins != before.cycle_interval_mins
            || self.tuning.max_actions_per_cycle != before.max_actions_per_cycle
        {
            tracing::info!(
                "🎚️ Autonomy tuned: every {}m, up to {} action(s)",
                self.tuning.cycle_interval_mins,
                self.tuning.max_actions_per_cycle
            );
        }
    }

    fn slow_down(&mut self) {
        self.tuning.cycle_interval_mins += 15;
        self.tuning = self.tuning.clamped(&self.config);
    }

    // Takes `&mut self` so the future holds no shared borrow of the engine
    // (and its SQLite connection) across the await — the spawned loop needs
    // a `Send` future.
    async fn schedule(&mut self, payload: TaskPayload, priority: TaskPriority, now: DateTime<Utc>) {
        let scheduler = Arc::clone(&self.scheduler);
        let mut scheduler = scheduler.lock().await;
        if let Err(e) = scheduler.schedule_at(payload, priority, now, now) {
            tracing::warn!("⚠️ Autonomous scheduling failed: {e}");
        }
    }

    /// Append-only decision record: audit table plus the log stream.
    fn record(&self, now: DateTime<Utc>, decision: &str, reason: &str) {
        tracing::info!("🧠 Decision: {decision} ({reason})");
        let record = AuditRecord {
            at: now,
            component: "autonomy".to_string(),
            decision: decision.to_string(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.store.append_audit(&record) {
            tracing::warn!("⚠️ Failed to write decision record: {e}");
        }
    }
}

/// Run the autonomous loop until shutdown. The interval follows the
/// engine's self-tuned cadence.
pub async fn spawn_autonomous(
    engine: Arc<Mutex<AutonomousEngine>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("🧠 Autonomous engine started");
    loop {
        let interval_mins = {
            let eng = engine.lock().await;
            eng.tuning().cycle_interval_mins
        };
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval_mins * 60)) => {
                let mut eng = engine.lock().await;
                eng.run_cycle().await;
            }
            _ = shutdown.changed() => {
                tracing::info!("🧠 Autonomous engine stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promopilot_core::config::SchedulerConfig;
    use promopilot_scheduler::{ExecutorRegistry, SchedulerDb, TaskKind, TaskStatus};

    fn test_scheduler() -> Arc<Mutex<SchedulerEngine>> {
        let config = SchedulerConfig {
            optimal_hours: Default::default(),
            ..Default::default()
        };
        Arc::new(Mutex::new(SchedulerEngine::new(
            SchedulerDb::open_in_memory().unwrap(),
            Arc::new(ExecutorRegistry::new()),
            config,
        )))
    }

    fn engine_with(metrics: SystemMetrics, config: AutonomyConfig) -> (AutonomousEngine, Arc<Mutex<SchedulerEngine>>) {
        let scheduler = test_scheduler();
        let engine = AutonomousEngine::new(
            Arc::new(FixedMetrics(metrics)),
            scheduler.clone(),
            RuleDb::open_in_memory().unwrap(),
            config,
        );
        (engine, scheduler)
    }

    fn healthy() -> SystemMetrics {
        SystemMetrics {
            content_velocity: 60.0,
            engagement: 55.0,
            revenue_trend: 0.1,
            health: 70.0,
        }
    }

    fn enabled_config() -> AutonomyConfig {
        AutonomyConfig { enabled: true, ..Default::default() }
    }

    #[tokio::test]
    async fn test_disabled_engine_does_nothing() {
        let (mut engine, scheduler) = engine_with(healthy(), AutonomyConfig::default());
        let summary = engine.run_cycle_at(Utc::now()).await;
        assert_eq!(summary.actions_taken, 0);
        assert_eq!(scheduler.lock().await.status().queue.pending, 0);
    }

    #[tokio::test]
    async fn test_health_floor_pauses_all_actions() {
        let metrics = SystemMetrics { health: 10.0, ..healthy() };
        let (mut engine, scheduler) = engine_with(metrics, enabled_config());

        let summary = engine.run_cycle_at(Utc::now()).await;
        assert!(summary.paused);
        assert_eq!(summary.actions_taken, 0);
        assert_eq!(scheduler.lock().await.status().queue.pending, 0);
    }

    #[tokio::test]
    async fn test_low_velocity_boosts_content() {
        let metrics = SystemMetrics { content_velocity: 20.0, ..healthy() };
        let (mut engine, scheduler) = engine_with(metrics, enabled_config());

        let summary = engine.run_cycle_at(Utc::now()).await;
        assert_eq!(summary.actions_taken, 1);
        let sched = scheduler.lock().await;
        assert!(sched.tasks().any(|t| t.kind() == TaskKind::ContentCreation
            && t.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_gates_fire_independently() {
        // Low velocity AND low engagement AND falling revenue: three
        // separate corrective actions.
        let metrics = SystemMetrics {
            content_velocity: 20.0,
            engagement: 15.0,
            revenue_trend: -0.2,
            health: 50.0,
        };
        let (mut engine, scheduler) = engine_with(metrics, enabled_config());

        let summary = engine.run_cycle_at(Utc::now()).await;
        assert_eq!(summary.actions_taken, 3);
        assert_eq!(scheduler.lock().await.status().queue.pending, 3);
    }

    #[tokio::test]
    async fn test_strong_performance_scales_up() {
        let metrics = SystemMetrics {
            content_velocity: 90.0,
            engagement: 85.0,
            revenue_trend: 0.3,
            health: 95.0,
        };
        let (mut engine, scheduler) = engine_with(metrics, enabled_config());

        engine.run_cycle_at(Utc::now()).await;
        let sched = scheduler.lock().await;
        assert!(sched.tasks().any(|t| t.kind() == TaskKind::ContentCreation));
    }

    #[tokio::test]
    async fn test_min_action_floor_keeps_telemetry_flowing() {
        // Nothing to correct, nothing to scale: the floor still schedules
        // baseline analytics.
        let (mut engine, scheduler) = engine_with(healthy(), enabled_config());

        let summary = engine.run_cycle_at(Utc::now()).await;
        assert_eq!(summary.actions_taken, 1);
        let sched = scheduler.lock().await;
        assert!(sched.tasks().any(|t| t.kind() == TaskKind::AnalyticsReport));
    }

    #[tokio::test]
    async fn test_loop_spawns_and_stops() {
        // The loop runs on a multi-threaded runtime, so its future must be
        // spawnable; shutdown must end it promptly.
        let (engine, _scheduler) = engine_with(healthy(), enabled_config());
        let engine = Arc::new(Mutex::new(engine));
        let (tx, rx) = watch::channel(false);

        let join = tokio::spawn(spawn_autonomous(engine, rx));
        tx.send(true).unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_tuning_stays_inside_bounds() {
        let config = AutonomyConfig {
            enabled: true,
            min_cycle_interval_mins: 15,
            max_cycle_interval_mins: 240,
            min_actions_per_cycle: 1,
            max_actions_per_cycle: 10,
            ..Default::default()
        };
        let (mut engine, _scheduler) = engine_with(healthy(), config.clone());

        // Many quiet cycles push the interval up, but never past the cap.
        for _ in 0..50 {
            engine.run_cycle_at(Utc::now()).await;
        }
        assert!(engine.tuning().cycle_interval_mins <= 240);

        engine.set_tuning(AutonomyTuning {
            cycle_interval_mins: 1,
            max_actions_per_cycle: 100,
        });
        assert_eq!(engine.tuning().cycle_interval_mins, 15);
        assert_eq!(engine.tuning().max_actions_per_cycle, 10);
    }
}
