//! Automation rules — declarative trigger → action mappings evaluated each
//! controller cycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often an interval-triggered rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Hourly,
    Daily,
    Weekly,
    Every { secs: u64 },
}

impl Schedule {
    pub fn interval(&self) -> Duration {
        match self {
            Schedule::Hourly => Duration::hours(1),
            Schedule::Daily => Duration::days(1),
            Schedule::Weekly => Duration::weeks(1),
            Schedule::Every { secs } => Duration::seconds(*secs as i64),
        }
    }
}

/// What makes a rule fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    /// Fire when the schedule's interval has elapsed since the last firing.
    Interval { schedule: Schedule },
    /// Fire when newly completed content matches any keyword.
    Keyword { keywords: Vec<String> },
}

/// Declarative action flags — the controller interprets them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RuleActions {
    #[serde(default)]
    pub create_content: bool,
    #[serde(default)]
    pub insert_affiliate_links: bool,
    #[serde(default)]
    pub post_to_social: bool,
    #[serde(default)]
    pub optimize_blog: bool,
}

/// Guard values limiting what a firing may do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Topics fed to content creation, consumed round-robin per firing.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Per-rule override of the daily social post cap.
    #[serde(default)]
    pub max_posts_per_day: Option<u32>,
}

/// A trigger → action rule owned by the automation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub name: String,
    pub trigger: RuleTrigger,
    pub actions: RuleActions,
    pub conditions: RuleConditions,
    pub last_executed: Option<DateTime<Utc>>,
    pub execution_count: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AutomationRule {
    pub fn new(name: &str, trigger: RuleTrigger) -> Self {
        Self {
            id: rule_id(),
            name: name.to_string(),
            trigger,
            actions: RuleActions::default(),
            conditions: RuleConditions::default(),
            last_executed: None,
            execution_count: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_actions(mut self, actions: RuleActions) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_conditions(mut self, conditions: RuleConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Minimum gap between firings. Keyword rules have no schedule of
    /// their own and default to one hour.
    pub fn interval(&self) -> Duration {
        match &self.trigger {
            RuleTrigger::Interval { schedule } => schedule.interval(),
            RuleTrigger::Keyword { .. } => Duration::hours(1),
        }
    }

    /// Idempotent-per-window firing gate: at most once per interval.
    pub fn can_fire(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_executed {
            Some(last) => now - last >= self.interval(),
            None => true,
        }
    }

    /// For keyword rules: does any recently completed title match?
    pub fn keywords_match(&self, titles: &[String]) -> bool {
        let RuleTrigger::Keyword { keywords } = &self.trigger else {
            return false;
        };
        titles.iter().any(|title| {
            let title = title.to_lowercase();
            keywords.iter().any(|kw| title.contains(&kw.to_lowercase()))
        })
    }

    pub fn record_fired(&mut self, now: DateTime<Utc>) {
        self.last_executed = Some(now);
        self.execution_count += 1;
    }

    /// Derived performance score in [0, 1]. Heuristic: recently active,
    /// regularly firing rules score high; stale ones decay toward zero.
    /// Rules that never fired get a grace score until they do.
    pub fn performance_score(&self, now: DateTime<Utc>) -> f64 {
        if self.execution_count == 0 {
            return 1.0;
        }
        let last = self.last_executed.unwrap_or(self.created_at);
        let days_idle = (now - last).num_days().max(0) as f64;
        let age_days = (now - self.created_at).num_days().max(0) as f64;
        let freshness = 1.0 / (1.0 + days_idle / 7.0);
        let usage = (self.execution_count as f64 / (age_days + 1.0)).min(1.0);
        0.6 * freshness + 0.4 * usage
    }
}

/// Default rules installed at first bootstrap.
pub fn seed_defaults() -> Vec<AutomationRule> {
    vec![
        AutomationRule::new(
            "daily-content",
            RuleTrigger::Interval { schedule: Schedule::Daily },
        )
        .with_actions(RuleActions {
            create_content: true,
            insert_affiliate_links: true,
            post_to_social: true,
            ..Default::default()
        })
        .with_conditions(RuleConditions {
            topics: vec![
                "best budget picks".into(),
                "seasonal gift guide".into(),
                "top rated this week".into(),
            ],
            max_posts_per_day: None,
        }),
        AutomationRule::new(
            "weekly-refresh",
            RuleTrigger::Interval { schedule: Schedule::Weekly },
        )
        .with_actions(RuleActions { optimize_blog: true, ..Default::default() }),
        AutomationRule::new(
            "trend-response",
            RuleTrigger::Keyword { keywords: vec!["deal".into(), "sale".into()] },
        )
        .with_actions(RuleActions {
            create_content: true,
            post_to_social: true,
            ..Default::default()
        })
        .with_conditions(RuleConditions {
            topics: vec!["trending deals roundup".into()],
            max_posts_per_day: None,
        }),
    ]
}

fn rule_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("rule-{:x}-{:x}", t.as_millis(), n)
}
