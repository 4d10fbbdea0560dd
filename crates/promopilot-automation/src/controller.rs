//! Automation cycle controller.
//!
//! Runs a fixed sequence of phases each cycle:
//! rule evaluation → link discovery → content pipeline → social posting →
//! revenue bookkeeping → rule pruning. A phase failure is logged and the
//! cycle moves on; one broken phase never takes the loop down.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use promopilot_core::config::AutomationConfig;
use promopilot_core::error::{PromoPilotError, Result};
use promopilot_scheduler::{SchedulerEngine, TaskPayload, TaskPriority, TaskStatus};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::rules::{AutomationRule, RuleTrigger, seed_defaults};
use crate::store::{AuditRecord, RuleDb};

/// A content item moving through the publish pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineItem {
    pub content_id: String,
    pub title: String,
    pub state: PipelineState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Generated, waiting for enrichment.
    Draft,
    /// Enriched and eligible for posting.
    Ready,
    Posted,
}

/// A tracked affiliate link with engagement bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct AffiliateLink {
    pub url: String,
    pub merchant: String,
    pub commission_rate: f64,
    pub clicks: u64,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Admin-facing controller status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub cycle_count: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub active_rules: usize,
    pub total_rules: usize,
    pub pipeline_drafts: usize,
    pub pipeline_ready: usize,
    pub pipeline_posted: usize,
    pub posts_today: u32,
    pub tracked_links: usize,
    pub estimated_revenue: f64,
}

struct FiringPlan {
    rule_idx: usize,
    rule_name: String,
    topics: Vec<String>,
    optimize_blog: bool,
}

/// Orchestrates the automation cycle. Owns the rules; reads the scheduler
/// for completed work and writes to it when rules fire.
pub struct AutomationController {
    rules: Vec<AutomationRule>,
    store: RuleDb,
    scheduler: Arc<Mutex<SchedulerEngine>>,
    config: AutomationConfig,

    pipeline: Vec<PipelineItem>,
    links: Vec<AffiliateLink>,
    /// Task ids already folded into controller state.
    ingested: HashSet<String>,
    /// Titles completed in the previous cycle, fed to keyword rules.
    recent_titles: Vec<String>,

    estimated_revenue: f64,
    last_link_check: Option<DateTime<Utc>>,
    posts_today: u32,
    posts_day: Option<NaiveDate>,
    content_counter: u64,
    cycle_count: u64,
    last_cycle_at: Option<DateTime<Utc>>,
}

impl AutomationController {
    /// Create a controller, reloading persisted rules.
    pub fn new(
        store: RuleDb,
        scheduler: Arc<Mutex<SchedulerEngine>>,
        config: AutomationConfig,
    ) -> Self {
        let rules = store.load_rules();
        if !rules.is_empty() {
            tracing::info!("📋 Reloaded {} automation rule(s)", rules.len());
        }
        Self {
            rules,
            store,
            scheduler,
            config,
            pipeline: Vec::new(),
            links: Vec::new(),
            ingested: HashSet::new(),
            recent_titles: Vec::new(),
            estimated_revenue: 0.0,
            last_link_check: None,
            posts_today: 0,
            posts_day: None,
            content_counter: 0,
            cycle_count: 0,
            last_cycle_at: None,
        }
    }

    /// Install the default rule set if the store is empty.
    pub fn ensure_seed_rules(&mut self) -> Result<()> {
        if !self.rules.is_empty() {
            return Ok(());
        }
        let seeds = seed_defaults();
        tracing::info!("🌱 Seeding {} default automation rule(s)", seeds.len());
        for rule in &seeds {
            self.store.save_rule(rule)?;
        }
        self.rules = seeds;
        Ok(())
    }

    /// Run one cycle at the wall clock.
    pub async fn run_cycle(&mut self) {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one full automation cycle relative to an explicit `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) {
        self.cycle_count += 1;
        self.last_cycle_at = Some(now);
        tracing::info!("🔄 Automation cycle #{} starting", self.cycle_count);

        if let Err(e) = self.evaluate_rules(now).await {
            tracing::warn!("⚠️ Rule evaluation phase failed: {e}");
        }
        if let Err(e) = self.check_links(now).await {
            tracing::warn!("⚠️ Link discovery phase failed: {e}");
        }
        if let Err(e) = self.drain_pipeline(now).await {
            tracing::warn!("⚠️ Content pipeline phase failed: {e}");
        }
        if let Err(e) = self.post_ready_content(now).await {
            tracing::warn!("⚠️ Social posting phase failed: {e}");
        }
        if let Err(e) = self.tally_revenue(now) {
            tracing::warn!("⚠️ Revenue bookkeeping phase failed: {e}");
        }
        if let Err(e) = self.prune_rules(now) {
            tracing::warn!("⚠️ Rule pruning phase failed: {e}");
        }

        tracing::info!("🔄 Automation cycle #{} done", self.cycle_count);
    }

    /// Phase 1: fire every rule whose gate is open.
    async fn evaluate_rules(&mut self, now: DateTime<Utc>) -> Result<()> {
        let mut plans = Vec::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.can_fire(now) {
                continue;
            }
            let triggered = match &rule.trigger {
                RuleTrigger::Interval { .. } => true,
                RuleTrigger::Keyword { .. } => rule.keywords_match(&self.recent_titles),
            };
            if triggered {
                plans.push(self.plan_firing(idx));
            }
        }
        for plan in plans {
            self.fire(plan, now).await?;
        }
        Ok(())
    }

    fn plan_firing(&self, idx: usize) -> FiringPlan {
        let rule = &self.rules[idx];
        let topics = if !rule.actions.create_content {
            Vec::new()
        } else if rule.conditions.topics.is_empty() {
            vec!["weekly highlights".to_string()]
        } else {
            // Rotate through the topic list so successive firings cover
            // different ground.
            let pool = &rule.conditions.topics;
            let take = self.config.max_topics_per_firing.min(pool.len());
            let start = (rule.execution_count as usize * take) % pool.len();
            pool.iter().cycle().skip(start).take(take).cloned().collect()
        };
        FiringPlan {
            rule_idx: idx,
            rule_name: rule.name.clone(),
            topics,
            optimize_blog: rule.actions.optimize_blog,
        }
    }

    async fn fire(&mut self, plan: FiringPlan, now: DateTime<Utc>) -> Result<()> {
        tracing::info!("⚡ Rule '{}' firing", plan.rule_name);

        {
            let mut scheduler = self.scheduler.lock().await;
            for topic in &plan.topics {
                scheduler.schedule_at(
                    TaskPayload::ContentCreation {
                        topic: topic.clone(),
                        category: "affiliate".to_string(),
                    },
                    TaskPriority::Medium,
                    now,
                    now,
                )?;
            }
            if plan.optimize_blog {
                // Refresh the oldest published piece, if there is one.
                if let Some(item) = self
                    .pipeline
                    .iter()
                    .find(|i| i.state == PipelineState::Posted)
                {
                    scheduler.schedule_at(
                        TaskPayload::BlogOptimization { post_id: item.content_id.clone() },
                        TaskPriority::Low,
                        now,
                        now,
                    )?;
                }
            }
        }

        let rule = &mut self.rules[plan.rule_idx];
        rule.record_fired(now);
        self.store.save_rule(rule)?;
        self.audit(now, "rule_fired", &format!("rule '{}' executed", plan.rule_name));
        Ok(())
    }

    /// Phase 2: discover and re-validate affiliate links. Gated to run at
    /// most once per `link_check_interval_mins`.
    async fn check_links(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(last) = self.last_link_check {
            if now - last < Duration::minutes(self.config.link_check_interval_mins as i64) {
                return Ok(());
            }
        }
        self.last_link_check = Some(now);

        let stale: Vec<String> = self
            .links
            .iter()
            .filter(|l| match l.last_checked {
                Some(checked) => now - checked >= Duration::hours(24),
                None => true,
            })
            .take(5)
            .map(|l| l.url.clone())
            .collect();

        let sources = self.config.affiliate_sources.clone();
        if sources.is_empty() && stale.is_empty() {
            return Ok(());
        }

        let mut scheduler = self.scheduler.lock().await;
        for url in sources.iter().chain(stale.iter()) {
            scheduler.schedule_at(
                TaskPayload::AffiliateScraping { url: url.clone() },
                TaskPriority::Low,
                now,
                now,
            )?;
        }
        tracing::info!(
            "🔗 Link check: {} source(s), {} stale link(s) queued",
            sources.len(),
            stale.len()
        );
        Ok(())
    }

    /// Phase 3: fold completed scheduler work into controller state and
    /// advance drafts toward Ready.
    async fn drain_pipeline(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.recent_titles.clear();

        let completed: Vec<(String, TaskPayload)> = {
            let scheduler = self.scheduler.lock().await;
            scheduler
                .tasks()
                .filter(|t| t.status == TaskStatus::Completed && !self.ingested.contains(&t.id))
                .map(|t| (t.id.clone(), t.payload.clone()))
                .collect()
        };

        for (task_id, payload) in completed {
            match payload {
                TaskPayload::ContentCreation { topic, .. } => {
                    self.content_counter += 1;
                    let content_id = format!("content-{}", self.content_counter);
                    tracing::info!("📝 Draft {content_id} ready from topic '{topic}'");
                    self.recent_titles.push(topic.clone());
                    self.pipeline.push(PipelineItem {
                        content_id,
                        title: topic,
                        state: PipelineState::Draft,
                        created_at: now,
                    });
                }
                TaskPayload::AffiliateScraping { url } => {
                    match self.links.iter_mut().find(|l| l.url == url) {
                        Some(link) => link.last_checked = Some(now),
                        None => {
                            self.links.push(AffiliateLink {
                                merchant: merchant_of(&url),
                                url,
                                commission_rate: 0.05,
                                clicks: 0,
                                last_checked: Some(now),
                            });
                        }
                    }
                }
                _ => {}
            }
            self.ingested.insert(task_id);
        }

        // Enrich drafts. Link insertion is driven by the active rule set.
        let insert_links = self
            .rules
            .iter()
            .any(|r| r.is_active && r.actions.insert_affiliate_links);
        let available_links = self.links.len();
        for item in self.pipeline.iter_mut().filter(|i| i.state == PipelineState::Draft) {
            if insert_links && available_links > 0 {
                tracing::info!(
                    "🔗 Inserted {} affiliate link(s) into {}",
                    available_links.min(3),
                    item.content_id
                );
            }
            item.state = PipelineState::Ready;
        }
        Ok(())
    }

    /// Phase 4: publish Ready items under the daily cap.
    async fn post_ready_content(&mut self, now: DateTime<Utc>) -> Result<()> {
        // Day rollover resets the counter.
        if self.posts_day != Some(now.date_naive()) {
            self.posts_day = Some(now.date_naive());
            self.posts_today = 0;
        }

        let posting_rules: Vec<&AutomationRule> = self
            .rules
            .iter()
            .filter(|r| r.is_active && r.actions.post_to_social)
            .collect();
        if posting_rules.is_empty() {
            return Ok(());
        }
        let cap = posting_rules
            .iter()
            .filter_map(|r| r.conditions.max_posts_per_day)
            .min()
            .unwrap_or(self.config.max_posts_per_day);

        let account = self.config.social_account.clone();
        let mut scheduler = self.scheduler.lock().await;
        for item in self.pipeline.iter_mut().filter(|i| i.state == PipelineState::Ready) {
            if self.posts_today >= cap {
                tracing::info!("📣 Daily post cap ({cap}) reached, holding remaining content");
                break;
            }
            scheduler.schedule_at(
                TaskPayload::SocialPost {
                    account: account.clone(),
                    content_id: item.content_id.clone(),
                },
                TaskPriority::Medium,
                now,
                now,
            )?;
            item.state = PipelineState::Posted;
            self.posts_today += 1;
            // Posting drives link exposure.
            for link in &mut self.links {
                link.clicks += 1;
            }
        }
        Ok(())
    }

    /// Phase 5: recompute the revenue estimate from link engagement.
    fn tally_revenue(&mut self, _now: DateTime<Utc>) -> Result<()> {
        let estimate: f64 = self
            .links
            .iter()
            .map(|l| l.clicks as f64 * l.commission_rate * self.config.avg_order_value)
            .sum();
        if (estimate - self.estimated_revenue).abs() > f64::EPSILON {
            tracing::info!("💰 Estimated affiliate revenue: ${estimate:.2}");
        }
        self.estimated_revenue = estimate;
        Ok(())
    }

    /// Phase 6: deactivate rules whose performance dropped below the cutoff.
    fn prune_rules(&mut self, now: DateTime<Utc>) -> Result<()> {
        let cutoff = self.config.rule_score_cutoff;
        let mut pruned = Vec::new();
        for rule in &mut self.rules {
            if !rule.is_active {
                continue;
            }
            let score = rule.performance_score(now);
            if score < cutoff {
                rule.is_active = false;
                self.store.save_rule(rule)?;
                tracing::warn!(
                    "🪓 Deactivated rule '{}' (score {score:.2} < {cutoff:.2})",
                    rule.name
                );
                pruned.push((rule.name.clone(), score));
            }
        }
        for (name, score) in pruned {
            self.audit(
                now,
                "rule_pruned",
                &format!("rule '{name}' deactivated at score {score:.2}"),
            );
        }
        Ok(())
    }

    /// Fire a rule by name immediately, bypassing its interval gate.
    pub async fn trigger_rule(&mut self, name: &str, now: DateTime<Utc>) -> Result<()> {
        let idx = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| PromoPilotError::RuleNotFound(name.to_string()))?;
        if !self.rules[idx].is_active {
            return Err(PromoPilotError::RuleNotFound(format!("{name} (inactive)")));
        }
        let plan = self.plan_firing(idx);
        self.fire(plan, now).await
    }

    pub fn rules(&self) -> &[AutomationRule] {
        &self.rules
    }

    /// Most recent audit entries (controller and autonomy decisions alike —
    /// both components write to the same table).
    pub fn recent_audit(&self, limit: u32) -> Vec<AuditRecord> {
        self.store.recent_audit(limit)
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            cycle_count: self.cycle_count,
            last_cycle_at: self.last_cycle_at,
            active_rules: self.rules.iter().filter(|r| r.is_active).count(),
            total_rules: self.rules.len(),
            pipeline_drafts: self.count_state(PipelineState::Draft),
            pipeline_ready: self.count_state(PipelineState::Ready),
            pipeline_posted: self.count_state(PipelineState::Posted),
            posts_today: self.posts_today,
            tracked_links: self.links.len(),
            estimated_revenue: self.estimated_revenue,
        }
    }

    fn count_state(&self, state: PipelineState) -> usize {
        self.pipeline.iter().filter(|i| i.state == state).count()
    }

    /// Best-effort audit write; storage trouble never fails a phase caller.
    fn audit(&self, now: DateTime<Utc>, decision: &str, reason: &str) {
        let record = AuditRecord {
            at: now,
            component: "controller".to_string(),
            decision: decision.to_string(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.store.append_audit(&record) {
            tracing::warn!("⚠️ Failed to write audit entry: {e}");
        }
    }
}

fn merchant_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("unknown")
        .to_string()
}

/// Run the automation cycle loop until shutdown. The first cycle runs
/// immediately at startup.
pub async fn spawn_controller(
    controller: Arc<Mutex<AutomationController>>,
    cycle_interval_mins: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("🤖 Automation controller started (cycle every {cycle_interval_mins}m)");
    let mut interval = tokio::time::interval(StdDuration::from_secs(cycle_interval_mins * 60));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut ctrl = controller.lock().await;
                ctrl.run_cycle().await;
            }
            _ = shutdown.changed() => {
                tracing::info!("🤖 Automation controller stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::register_default_executors;
    use crate::rules::{RuleActions, RuleConditions, Schedule};
    use promopilot_core::config::SchedulerConfig;
    use promopilot_providers::stub::{StubContentGenerator, StubLinkScraper, StubSocialPoster};
    use promopilot_scheduler::{ExecutorRegistry, SchedulerDb, TaskKind};

    fn test_scheduler() -> Arc<Mutex<SchedulerEngine>> {
        let mut registry = ExecutorRegistry::new();
        register_default_executors(
            &mut registry,
            Arc::new(StubContentGenerator::new()),
            Arc::new(StubLinkScraper::new()),
            Arc::new(StubSocialPoster::new()),
        );
        let config = SchedulerConfig {
            max_dispatch_per_tick: 10,
            optimal_hours: Default::default(),
            ..Default::default()
        };
        Arc::new(Mutex::new(SchedulerEngine::new(
            SchedulerDb::open_in_memory().unwrap(),
            Arc::new(registry),
            config,
        )))
    }

    fn content_rule(schedule: Schedule, topics: Vec<String>) -> AutomationRule {
        AutomationRule::new("content", RuleTrigger::Interval { schedule })
            .with_actions(RuleActions {
                create_content: true,
                post_to_social: true,
                ..Default::default()
            })
            .with_conditions(RuleConditions { topics, max_posts_per_day: None })
    }

    fn controller_with(
        rules: Vec<AutomationRule>,
        config: AutomationConfig,
        scheduler: Arc<Mutex<SchedulerEngine>>,
    ) -> AutomationController {
        let store = RuleDb::open_in_memory().unwrap();
        for rule in &rules {
            store.save_rule(rule).unwrap();
        }
        AutomationController::new(store, scheduler, config)
    }

    #[tokio::test]
    async fn test_daily_rule_fires_once_not_twice() {
        let scheduler = test_scheduler();
        let mut rule = content_rule(Schedule::Daily, vec!["espresso picks".into()]);
        rule.last_executed = Some(Utc::now() - Duration::hours(25));
        let mut ctrl =
            controller_with(vec![rule], AutomationConfig::default(), scheduler.clone());

        let now = Utc::now();
        ctrl.run_cycle_at(now).await;
        assert_eq!(ctrl.rules()[0].execution_count, 1);

        // One minute later the window is still closed.
        ctrl.run_cycle_at(now + Duration::minutes(1)).await;
        assert_eq!(ctrl.rules()[0].execution_count, 1);

        let pending = scheduler.lock().await.status().queue.pending;
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn test_topic_fanout_is_bounded() {
        let scheduler = test_scheduler();
        let topics: Vec<String> = (0..10).map(|i| format!("topic-{i}")).collect();
        let rule = content_rule(Schedule::Daily, topics);
        let config = AutomationConfig { max_topics_per_firing: 3, ..Default::default() };
        let mut ctrl = controller_with(vec![rule], config, scheduler.clone());

        ctrl.run_cycle_at(Utc::now()).await;
        assert_eq!(scheduler.lock().await.status().queue.pending, 3);
    }

    #[tokio::test]
    async fn test_pipeline_content_to_social_post() {
        let scheduler = test_scheduler();
        let rule = content_rule(Schedule::Daily, vec!["coffee grinders".into()]);
        let config = AutomationConfig { max_topics_per_firing: 1, ..Default::default() };
        let mut ctrl = controller_with(vec![rule], config, scheduler.clone());

        let now = Utc::now();
        // Cycle 1 fires the rule and enqueues content creation.
        ctrl.run_cycle_at(now).await;
        // The scheduler completes it.
        scheduler.lock().await.tick_at(now + Duration::seconds(2)).await;
        // Cycle 2 ingests the draft, enriches it, and posts it.
        ctrl.run_cycle_at(now + Duration::minutes(30)).await;

        let status = ctrl.status();
        assert_eq!(status.pipeline_posted, 1);
        assert_eq!(status.posts_today, 1);

        // A social post task was enqueued for the published item.
        let sched = scheduler.lock().await;
        assert!(
            sched
                .tasks()
                .any(|t| t.kind() == TaskKind::SocialPost && t.status == TaskStatus::Pending)
        );
    }

    #[tokio::test]
    async fn test_daily_post_cap_holds_content_back() {
        let scheduler = test_scheduler();
        let rule = content_rule(Schedule::Daily, (0..4).map(|i| format!("t{i}")).collect());
        let config = AutomationConfig {
            max_topics_per_firing: 4,
            max_posts_per_day: 2,
            ..Default::default()
        };
        let mut ctrl = controller_with(vec![rule], config, scheduler.clone());

        let now = Utc::now();
        ctrl.run_cycle_at(now).await;
        scheduler.lock().await.tick_at(now + Duration::seconds(2)).await;
        ctrl.run_cycle_at(now + Duration::minutes(30)).await;

        let status = ctrl.status();
        assert_eq!(status.pipeline_posted, 2);
        assert_eq!(status.pipeline_ready, 2);

        // Next day the held content goes out.
        ctrl.run_cycle_at(now + Duration::days(1) + Duration::minutes(1)).await;
        assert_eq!(ctrl.status().pipeline_posted, 4);
    }

    #[tokio::test]
    async fn test_link_discovery_gated_by_interval() {
        let scheduler = test_scheduler();
        let config = AutomationConfig {
            link_check_interval_mins: 60,
            affiliate_sources: vec!["https://shop.example/deals".into()],
            ..Default::default()
        };
        let mut ctrl = controller_with(Vec::new(), config, scheduler.clone());

        let now = Utc::now();
        ctrl.run_cycle_at(now).await;
        assert_eq!(scheduler.lock().await.status().queue.pending, 1);

        // 30 minutes later the gate is still closed.
        ctrl.run_cycle_at(now + Duration::minutes(30)).await;
        assert_eq!(scheduler.lock().await.status().queue.pending, 1);
    }

    #[tokio::test]
    async fn test_scraped_links_feed_revenue_estimate() {
        let scheduler = test_scheduler();
        let rule = content_rule(Schedule::Daily, vec!["best deals".into()]);
        let config = AutomationConfig {
            max_topics_per_firing: 1,
            affiliate_sources: vec!["https://shop.example/p/1".into()],
            avg_order_value: 25.0,
            ..Default::default()
        };
        let mut ctrl = controller_with(vec![rule], config, scheduler.clone());

        let now = Utc::now();
        ctrl.run_cycle_at(now).await;
        scheduler.lock().await.tick_at(now + Duration::seconds(2)).await;
        ctrl.run_cycle_at(now + Duration::minutes(30)).await;

        let status = ctrl.status();
        assert_eq!(status.tracked_links, 1);
        // One post drove one click: 1 * 0.05 * 25.0.
        assert!((status.estimated_revenue - 1.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stale_rule_is_pruned() {
        let scheduler = test_scheduler();
        // A keyword rule with no matching content stays idle and decays.
        let mut rule = AutomationRule::new(
            "dormant-trend",
            RuleTrigger::Keyword { keywords: vec!["clearance".into()] },
        );
        let now = Utc::now();
        rule.created_at = now - Duration::days(30);
        rule.last_executed = Some(now - Duration::hours(1));
        rule.execution_count = 5;
        let mut ctrl =
            controller_with(vec![rule], AutomationConfig::default(), scheduler.clone());

        // Recently active rule survives.
        ctrl.run_cycle_at(now).await;
        assert!(ctrl.rules()[0].is_active);

        // Twenty idle days later it falls below the cutoff.
        ctrl.run_cycle_at(now + Duration::days(20)).await;
        assert!(!ctrl.rules()[0].is_active);
    }

    #[tokio::test]
    async fn test_trigger_rule_bypasses_interval_gate() {
        let scheduler = test_scheduler();
        let mut rule = content_rule(Schedule::Daily, vec!["flash sale".into()]);
        let now = Utc::now();
        rule.last_executed = Some(now - Duration::minutes(5));
        let mut ctrl =
            controller_with(vec![rule], AutomationConfig::default(), scheduler.clone());

        assert!(!ctrl.rules()[0].can_fire(now));
        ctrl.trigger_rule("content", now).await.unwrap();
        assert_eq!(ctrl.rules()[0].execution_count, 1);

        assert!(ctrl.trigger_rule("no-such-rule", now).await.is_err());
    }

    #[tokio::test]
    async fn test_keyword_rule_fires_on_matching_content() {
        let scheduler = test_scheduler();
        let interval_rule = content_rule(Schedule::Daily, vec!["spring sale preview".into()]);
        let keyword_rule = AutomationRule::new(
            "trend",
            RuleTrigger::Keyword { keywords: vec!["sale".into()] },
        )
        .with_actions(RuleActions { create_content: true, ..Default::default() })
        .with_conditions(RuleConditions {
            topics: vec!["sale follow-up".into()],
            max_posts_per_day: None,
        });
        let config = AutomationConfig { max_topics_per_firing: 1, ..Default::default() };
        let mut ctrl =
            controller_with(vec![interval_rule, keyword_rule], config, scheduler.clone());

        let now = Utc::now();
        // Cycle 1: only the interval rule fires (no recent titles yet).
        ctrl.run_cycle_at(now).await;
        assert_eq!(ctrl.rules()[1].execution_count, 0);

        scheduler.lock().await.tick_at(now + Duration::seconds(2)).await;

        // Cycle 2 ingests "spring sale preview"; cycle 3 sees the match.
        ctrl.run_cycle_at(now + Duration::minutes(30)).await;
        ctrl.run_cycle_at(now + Duration::minutes(60)).await;
        assert_eq!(ctrl.rules()[1].execution_count, 1);
    }

    #[tokio::test]
    async fn test_seed_rules_installed_once() {
        let scheduler = test_scheduler();
        let mut ctrl =
            controller_with(Vec::new(), AutomationConfig::default(), scheduler.clone());
        ctrl.ensure_seed_rules().unwrap();
        assert_eq!(ctrl.rules().len(), 3);
        // Idempotent.
        ctrl.ensure_seed_rules().unwrap();
        assert_eq!(ctrl.rules().len(), 3);
    }
}
