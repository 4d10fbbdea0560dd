//! # PromoPilot — Marketing Automation Core
//!
//! Runs the full orchestrator: durable task scheduler, automation cycle
//! controller, and (optionally) the autonomous decision layer.
//!
//! Usage:
//!   promopilot                         # Start with defaults (~/.promopilot)
//!   promopilot --config my.toml        # Custom config file
//!   promopilot --autonomy              # Enable the autonomous layer
//!   promopilot --once                  # One cycle + one tick, print status, exit

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use promopilot_automation::{
    AutomationController, AutonomousEngine, MetricsProvider, OrchestratorHandle, RuleDb,
    SystemMetrics, register_default_executors, spawn_autonomous, spawn_controller,
};
use promopilot_core::config::PromoPilotConfig;
use promopilot_providers::stub::{StubContentGenerator, StubLinkScraper, StubSocialPoster};
use promopilot_scheduler::{ExecutorRegistry, SchedulerDb, SchedulerEngine, spawn_scheduler};
use tokio::sync::{Mutex, watch};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "promopilot",
    version,
    about = "🚀 PromoPilot — self-driving marketing automation core"
)]
struct Cli {
    /// Config file path (default: ~/.promopilot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path override
    #[arg(long)]
    db_path: Option<String>,

    /// Enable the autonomous decision layer
    #[arg(long)]
    autonomy: bool,

    /// Run one automation cycle and one scheduler tick, print status, exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Metrics sampled from nowhere in particular — stands in for live
/// platform analytics until a real telemetry source is wired up.
struct SimulatedMetrics;

#[async_trait::async_trait]
impl MetricsProvider for SimulatedMetrics {
    async fn sample(&self) -> SystemMetrics {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        SystemMetrics {
            content_velocity: rng.gen_range(20.0..90.0),
            engagement: rng.gen_range(20.0..90.0),
            revenue_trend: rng.gen_range(-0.3..0.3),
            health: rng.gen_range(40.0..100.0),
        }
    }
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => PromoPilotConfig::load_from(Path::new(&expand_path(path)))?,
        None => PromoPilotConfig::load()?,
    };
    if cli.autonomy {
        config.autonomy.enabled = true;
    }

    let db_path = expand_path(cli.db_path.as_deref().unwrap_or(&config.storage.db_path));

    // Wire the executor registry against the providers
    let mut registry = ExecutorRegistry::new();
    register_default_executors(
        &mut registry,
        Arc::new(StubContentGenerator::new()),
        Arc::new(StubLinkScraper::new()),
        Arc::new(StubSocialPoster::new()),
    );

    // Build the engines (scheduler and rules share one database file)
    let scheduler = Arc::new(Mutex::new(SchedulerEngine::new(
        SchedulerDb::open(Path::new(&db_path))?,
        Arc::new(registry),
        config.scheduler.clone(),
    )));

    let rule_db = RuleDb::open(Path::new(&db_path))?;
    let controller = Arc::new(Mutex::new(AutomationController::new(
        rule_db,
        scheduler.clone(),
        config.automation.clone(),
    )));
    controller.lock().await.ensure_seed_rules()?;

    let autonomous = if config.autonomy.enabled {
        Some(Arc::new(Mutex::new(AutonomousEngine::new(
            Arc::new(SimulatedMetrics),
            scheduler.clone(),
            RuleDb::open(Path::new(&db_path))?,
            config.autonomy.clone(),
        ))))
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = OrchestratorHandle::new(
        scheduler.clone(),
        controller.clone(),
        autonomous.clone(),
        shutdown_tx,
    );

    println!("🚀 PromoPilot v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database:   {db_path}");
    println!("   ⏰ Tick:       every {}s", config.scheduler.poll_interval_secs);
    println!("   🔄 Cycle:      every {}m", config.automation.cycle_interval_mins);
    println!(
        "   🧠 Autonomy:   {}",
        if config.autonomy.enabled { "enabled" } else { "disabled" }
    );
    println!();

    if cli.once {
        controller.lock().await.run_cycle().await;
        scheduler.lock().await.tick().await;
        if let Some(engine) = &autonomous {
            engine.lock().await.run_cycle().await;
        }
        let status = handle.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    // Spawn the loops
    let mut joins = Vec::new();
    joins.push(tokio::spawn(spawn_scheduler(
        scheduler.clone(),
        config.scheduler.poll_interval_secs,
        shutdown_rx.clone(),
    )));
    joins.push(tokio::spawn(spawn_controller(
        controller.clone(),
        config.automation.cycle_interval_mins,
        shutdown_rx.clone(),
    )));
    if let Some(engine) = &autonomous {
        joins.push(tokio::spawn(spawn_autonomous(engine.clone(), shutdown_rx.clone())));
    }

    // Graceful shutdown on Ctrl-C
    tokio::signal::ctrl_c().await?;
    println!();
    handle.shutdown();
    for join in joins {
        join.await.ok();
    }

    println!("👋 PromoPilot stopped");
    Ok(())
}
