//! `foreman` — plan and drive task specifications against a simulated
//! worker pool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use foreman_audit::AuditLog;
use foreman_core::SystemClock;
use foreman_orchestrator::{
    BotHealth, HistoryRecommender, MaintenanceScheduler, MaintenanceWindow, Orchestrator,
    TaskGraph, TaskSpec,
};
use foreman_store::FileTaskStore;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "foreman", about = "Foreman — worker-pool scheduling and backpressure")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "foreman.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a task specification and print its execution plan
    Plan {
        /// Path to the task specification (JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Run a task specification against the simulated worker pool
    Run {
        /// Path to the task specification (JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
}

#[derive(Deserialize)]
struct ForemanConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    log_dir: PathBuf,
    #[serde(default = "default_bots")]
    bots: Vec<BotConfig>,
    #[serde(default)]
    maintenance: Vec<MaintenanceWindow>,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            bots: default_bots(),
            maintenance: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
struct BotConfig {
    id: String,
    #[serde(default = "default_success_rate")]
    success_rate: f64,
    #[serde(default)]
    cpu_fraction: f64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/tasks")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./data/logs")
}

fn default_success_rate() -> f64 {
    0.9
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        BotConfig {
            id: "worker-1".to_string(),
            success_rate: 0.95,
            cpu_fraction: 0.2,
        },
        BotConfig {
            id: "worker-2".to_string(),
            success_rate: 0.85,
            cpu_fraction: 0.1,
        },
    ]
}

fn load_config(path: &PathBuf) -> anyhow::Result<ForemanConfig> {
    if !path.exists() {
        info!(path = %path.display(), "no config file; using defaults");
        return Ok(ForemanConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn load_spec(path: &PathBuf) -> anyhow::Result<TaskSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading spec {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing spec {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Plan { spec } => plan(&load_spec(&spec)?),
        Commands::Run { spec } => run(&config, &load_spec(&spec)?).await,
    }
}

/// Print the execution order and parallel groups for a specification.
fn plan(spec: &TaskSpec) -> anyhow::Result<()> {
    let graph = TaskGraph::build(spec)?;
    println!("spec:  {} ({})", graph.title(), graph.spec_id());
    println!("tasks: {}", graph.len());
    println!("\nexecution order:");
    for (index, id) in graph.execution_order().iter().enumerate() {
        println!("  {:>3}. {id}", index + 1);
    }
    println!("\nparallel groups:");
    for (depth, group) in graph.get_parallel_groups().iter().enumerate() {
        println!("  depth {depth}: {}", group.join(", "));
    }
    Ok(())
}

/// Drive the specification to completion against the configured worker pool,
/// simulating completion callbacks.
async fn run(config: &ForemanConfig, spec: &TaskSpec) -> anyhow::Result<()> {
    let clock = Arc::new(SystemClock);
    let store = Arc::new(FileTaskStore::new(config.data_dir.clone()).await?);
    let orchestrator = Orchestrator::new(
        clock.clone(),
        Arc::new(HistoryRecommender::new()),
        store,
        Arc::new(AuditLog::new(config.log_dir.clone())),
    );

    for bot in &config.bots {
        orchestrator
            .register_bot(
                bot.id.clone(),
                BotHealth {
                    success_rate: bot.success_rate,
                    cpu_fraction: bot.cpu_fraction,
                },
            )
            .await;
    }
    let maintenance = if config.maintenance.is_empty() {
        None
    } else {
        Some(MaintenanceScheduler::new(
            config.maintenance.clone(),
            clock,
        )?)
    };

    orchestrator.load_spec(spec).await?;
    info!(spec = %spec.spec_id, tasks = spec.tasks.len(), bots = config.bots.len(), "run starting");

    while !orchestrator.is_done().await {
        if let Some(scheduler) = &maintenance {
            scheduler.apply(orchestrator.degradation()).await;
        }
        // The simulated host is healthy; real deployments feed probe data
        // from their resource monitor here.
        orchestrator.probe_resources(40.0, 30.0).await?;

        let assignments = match orchestrator.tick().await {
            Ok(assignments) => assignments,
            Err(e) => {
                warn!(error = %e, "run aborted");
                break;
            }
        };
        for assignment in &assignments {
            println!(
                "assign {} -> {}{}",
                assignment.task_id,
                assignment.bot_id,
                if assignment.fallback { " (fallback)" } else { "" }
            );
            orchestrator
                .complete_task(&assignment.task_id, &assignment.bot_id, true)
                .await?;
            println!("done   {}", assignment.task_id);
        }
        if assignments.is_empty() {
            break;
        }
    }

    let progress = orchestrator.progress().await?;
    println!(
        "\nfinished: {}/{} complete, {} blocked",
        progress.complete, progress.total, progress.blocked
    );
    println!(
        "queue status: {}",
        serde_json::to_string_pretty(&orchestrator.analytics().get_queue_status().await)?
    );
    println!(
        "degradation: {}",
        serde_json::to_string_pretty(&orchestrator.degradation().status().await)?
    );
    let bottlenecks = orchestrator.analytics().identify_bottlenecks().await;
    if !bottlenecks.is_empty() {
        println!("bottlenecks: {}", serde_json::to_string_pretty(&bottlenecks)?);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply() {
        let config: ForemanConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data/tasks"));
        assert_eq!(config.bots.len(), 2);
        assert!(config.maintenance.is_empty());
    }

    #[test]
    fn config_parses_bots_and_windows() {
        let raw = r#"
            data_dir = "/var/lib/foreman/tasks"

            [[bots]]
            id = "gpu-1"
            success_rate = 0.97
            cpu_fraction = 0.4

            [[maintenance]]
            name = "nightly"
            cron_expression = "0 0 3 * * * *"
            duration_minutes = 45
        "#;
        let config: ForemanConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/foreman/tasks"));
        assert_eq!(config.bots.len(), 1);
        assert_eq!(config.bots[0].id, "gpu-1");
        assert_eq!(config.maintenance.len(), 1);
        assert_eq!(config.maintenance[0].duration_minutes, 45);
        assert!(config.maintenance[0].enabled);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config(&PathBuf::from("/nonexistent/foreman.toml")).unwrap();
        assert_eq!(config.bots.len(), 2);
    }

    #[test]
    fn spec_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "spec_id": "s1",
                "title": "Spec",
                "tasks": [{"task_id": "a", "title": "A", "intent": "build"}]
            })
            .to_string(),
        )
        .unwrap();
        let spec = load_spec(&path).unwrap();
        assert_eq!(spec.tasks.len(), 1);
    }
}
