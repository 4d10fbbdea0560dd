//! PromoPilot configuration system.
//!
//! All knobs are heuristic defaults, not load-bearing business constants —
//! tune them per deployment in `~/.promopilot/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PromoPilotError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromoPilotConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub autonomy: AutonomyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl PromoPilotConfig {
    /// Load config from the default path (~/.promopilot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PromoPilotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PromoPilotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PromoPilotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the PromoPilot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promopilot")
    }
}

/// Scheduler (task queue + tick loop) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between dispatch ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Max tasks dispatched per tick — caps burst load on external APIs.
    #[serde(default = "default_max_dispatch")]
    pub max_dispatch_per_tick: usize,
    /// Base delay for linear retry backoff.
    #[serde(default = "default_retry_delay")]
    pub base_retry_delay_secs: u64,
    /// Retry budget for tasks that don't override it.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Hard timeout on a single executor run.
    #[serde(default = "default_executor_timeout")]
    pub executor_timeout_secs: u64,
    /// Pending-queue size under which High/Urgent tasks are pulled toward "now".
    #[serde(default = "default_load_threshold")]
    pub load_compression_threshold: usize,
    /// Preferred execution hour (UTC) per task kind; tasks of other kinds
    /// run at their requested time.
    #[serde(default = "default_optimal_hours")]
    pub optimal_hours: HashMap<String, u32>,
}

fn default_poll_interval() -> u64 { 30 }
fn default_max_dispatch() -> usize { 3 }
fn default_retry_delay() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }
fn default_executor_timeout() -> u64 { 120 }
fn default_load_threshold() -> usize { 10 }
fn default_optimal_hours() -> HashMap<String, u32> {
    [
        ("content_creation", 9),
        ("affiliate_scraping", 3),
        ("blog_optimization", 4),
        ("product_update", 6),
        ("analytics_report", 1),
        ("social_post", 17),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_dispatch_per_tick: default_max_dispatch(),
            base_retry_delay_secs: default_retry_delay(),
            default_max_retries: default_max_retries(),
            executor_timeout_secs: default_executor_timeout(),
            load_compression_threshold: default_load_threshold(),
            optimal_hours: default_optimal_hours(),
        }
    }
}

/// Automation cycle controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Minutes between controller cycles.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_mins: u64,
    /// Minutes between affiliate link discovery/validation runs.
    #[serde(default = "default_link_check_interval")]
    pub link_check_interval_mins: u64,
    /// Max topics one rule firing may enqueue (bounded fan-out).
    #[serde(default = "default_max_topics")]
    pub max_topics_per_firing: usize,
    /// Daily cap on social posts.
    #[serde(default = "default_max_posts")]
    pub max_posts_per_day: u32,
    /// Rules scoring below this are paused.
    #[serde(default = "default_score_cutoff")]
    pub rule_score_cutoff: f64,
    /// Assumed average order value for revenue estimates.
    #[serde(default = "default_avg_order_value")]
    pub avg_order_value: f64,
    /// Merchant/network URLs scanned for affiliate products.
    #[serde(default)]
    pub affiliate_sources: Vec<String>,
    /// Social account handle used for automated posts.
    #[serde(default = "default_social_account")]
    pub social_account: String,
}

fn default_cycle_interval() -> u64 { 30 }
fn default_link_check_interval() -> u64 { 60 }
fn default_max_topics() -> usize { 3 }
fn default_max_posts() -> u32 { 5 }
fn default_score_cutoff() -> f64 { 0.3 }
fn default_avg_order_value() -> f64 { 25.0 }
fn default_social_account() -> String { "promopilot-main".into() }

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            cycle_interval_mins: default_cycle_interval(),
            link_check_interval_mins: default_link_check_interval(),
            max_topics_per_firing: default_max_topics(),
            max_posts_per_day: default_max_posts(),
            rule_score_cutoff: default_score_cutoff(),
            avg_order_value: default_avg_order_value(),
            affiliate_sources: vec![],
            social_account: default_social_account(),
        }
    }
}

/// Autonomous decision layer configuration.
///
/// Thresholds gate independent actions; min/max bounds fence the
/// self-tuning loop so it can never run away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Minutes between autonomous cycles (starting value; self-tuned).
    #[serde(default = "default_autonomy_interval")]
    pub cycle_interval_mins: u64,
    /// Revenue proxy below this → create more content.
    #[serde(default = "default_content_threshold")]
    pub content_threshold: f64,
    /// Content quality proxy below this → optimize existing content.
    #[serde(default = "default_optimize_threshold")]
    pub optimize_threshold: f64,
    /// Engagement proxy above this → scale up per-cycle limits.
    #[serde(default = "default_scale_threshold")]
    pub scale_threshold: f64,
    /// System health proxy below this → pause for maintenance.
    #[serde(default = "default_health_floor")]
    pub health_floor: f64,
    #[serde(default = "default_min_actions")]
    pub min_actions_per_cycle: u32,
    #[serde(default = "default_max_actions")]
    pub max_actions_per_cycle: u32,
    #[serde(default = "default_min_interval")]
    pub min_cycle_interval_mins: u64,
    #[serde(default = "default_max_interval")]
    pub max_cycle_interval_mins: u64,
}

fn default_autonomy_interval() -> u64 { 60 }
fn default_content_threshold() -> f64 { 50.0 }
fn default_optimize_threshold() -> f64 { 40.0 }
fn default_scale_threshold() -> f64 { 75.0 }
fn default_health_floor() -> f64 { 30.0 }
fn default_min_actions() -> u32 { 1 }
fn default_max_actions() -> u32 { 10 }
fn default_min_interval() -> u64 { 15 }
fn default_max_interval() -> u64 { 240 }

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cycle_interval_mins: default_autonomy_interval(),
            content_threshold: default_content_threshold(),
            optimize_threshold: default_optimize_threshold(),
            scale_threshold: default_scale_threshold(),
            health_floor: default_health_floor(),
            min_actions_per_cycle: default_min_actions(),
            max_actions_per_cycle: default_max_actions(),
            min_cycle_interval_mins: default_min_interval(),
            max_cycle_interval_mins: default_max_interval(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "~/.promopilot/promopilot.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}
