//! Sales analysis task pipeline.
//!
//! Batch driver: reads a JSON array of task submissions, runs each through
//! the worker pool against Source A (JSON) and Source B (CSV), and prints
//! one JSON task report per line on stdout.
//!
//! Usage: `sales-ingest <submissions.json>`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};

use clickhouse_client::{check_connection, init_schema, ClickHouseClient, ClickHouseConfig, ClickHouseTaskStore};
use engine_core::{MemoryTaskStore, TaskId, TaskStore, TaskSubmission};
use sources::SourcesConfig;
use task_queue::{InMemoryQueue, QueueConfig, TaskQueue};
use telemetry::{health, init_tracing_from_env, metrics};
use worker::{MergeEngine, TaskProcessor, TaskService, WorkerConfig, WorkerPool};

/// Which [`TaskStore`] implementation to run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreBackend {
    #[default]
    Memory,
    ClickHouse,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "clickhouse" => Ok(Self::ClickHouse),
            other => bail!("unknown store backend {:?} (expected memory or clickhouse)", other),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreConfig {
    #[serde(default)]
    backend: StoreBackend,
    #[serde(default)]
    clickhouse: ClickHouseConfig,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    sources: SourcesConfig,
    #[serde(default)]
    worker: WorkerConfig,
    #[serde(default)]
    store: StoreConfig,
    /// How long the driver waits for each task to finish
    #[serde(default = "default_wait_timeout_secs")]
    wait_timeout_secs: u64,
}

fn default_wait_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            worker: WorkerConfig::default(),
            store: StoreConfig::default(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let Some(submissions_path) = std::env::args().nth(1) else {
        bail!("usage: sales-ingest <submissions.json>");
    };

    info!("Starting sales-ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        source_a = %config.sources.source_a_path.display(),
        source_b = %config.sources.source_b_path.display(),
        store = ?config.store.backend,
        workers = config.worker.workers,
        "Loaded configuration"
    );

    let submissions = read_submissions(Path::new(&submissions_path)).await?;

    let store = build_store(&config.store).await?;
    let (source_a, source_b) = sources::from_config(&config.sources);
    let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryQueue::new(&QueueConfig {
        capacity: config.worker.queue_capacity,
    }));

    let engine = Arc::new(MergeEngine::new(source_a, source_b));
    let processor = TaskProcessor::new(store.clone(), engine)
        .with_simulated_latency(config.worker.simulated_latency());
    let pool = WorkerPool::new(config.worker.clone(), queue.clone(), processor);
    let service = TaskService::new(store, queue.clone());

    service
        .recover()
        .await
        .context("Failed to recover stored tasks")?;
    pool.start();

    let wait_timeout = Duration::from_secs(config.wait_timeout_secs);
    let outcome = tokio::select! {
        result = run_batch(&service, submissions, wait_timeout) => result,
        _ = shutdown_signal() => {
            warn!("Stopping before all tasks finished");
            Ok(())
        }
    };

    info!("Shutting down...");
    pool.shutdown().await;
    queue.close();

    let snapshot = metrics().snapshot();
    info!(
        submitted = snapshot.tasks_submitted,
        completed = snapshot.tasks_completed,
        failed = snapshot.tasks_failed,
        health = ?health().report().status,
        "Shutdown complete"
    );
    outcome
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. SALES__WORKER__WORKERS=4
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SALES")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Flat `SALES_*` overrides for the settings most often changed per run.
///
/// The config crate's nested parsing doesn't work reliably with underscored
/// field names.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(path) = var("SALES_SOURCE_A_PATH") {
        config.sources.source_a_path = path.into();
    }
    if let Some(path) = var("SALES_SOURCE_B_PATH") {
        config.sources.source_b_path = path.into();
    }
    if let Some(backend) = var("SALES_STORE_BACKEND") {
        config.store.backend = backend.parse()?;
    }
    if let Some(url) = var("SALES_CLICKHOUSE_URL") {
        config.store.clickhouse.url = url;
    }
    if let Some(database) = var("SALES_CLICKHOUSE_DATABASE") {
        config.store.clickhouse.database = database;
    }
    if let Some(username) = var("SALES_CLICKHOUSE_USERNAME") {
        config.store.clickhouse.username = Some(username);
    }
    if let Some(password) = var("SALES_CLICKHOUSE_PASSWORD") {
        config.store.clickhouse.password = Some(password);
    }
    Ok(())
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn TaskStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryTaskStore::new())),
        StoreBackend::ClickHouse => {
            let client = ClickHouseClient::new(config.clickhouse.clone());
            let version = check_connection(&client).await?;
            init_schema(&client)
                .await
                .context("Failed to initialize ClickHouse schema")?;
            info!(%version, database = %client.database(), "Using ClickHouse task store");
            Ok(Arc::new(ClickHouseTaskStore::new(client)))
        }
    }
}

async fn read_submissions(path: &Path) -> Result<Vec<TaskSubmission>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a JSON array of task submissions", path.display()))
}

/// Submits everything up front, then reports each task once it is terminal.
async fn run_batch(
    service: &TaskService,
    submissions: Vec<TaskSubmission>,
    wait_timeout: Duration,
) -> Result<()> {
    let mut submitted: Vec<TaskId> = Vec::with_capacity(submissions.len());
    for (index, submission) in submissions.into_iter().enumerate() {
        match service.submit(submission).await {
            Ok(task) => submitted.push(task.id),
            Err(e) if e.is_submission_error() => {
                println!(
                    "{}",
                    serde_json::json!({ "submission": index, "error": e.to_string() })
                );
            }
            Err(e) => return Err(e).context("Failed to store submitted task"),
        }
    }

    for id in submitted {
        if let Err(e) = service.wait_for_terminal(id, wait_timeout).await {
            error!(task_id = %id, error = %e, "Task did not finish");
        }
        let report = service
            .get_task(id)
            .await?
            .with_context(|| format!("task {} disappeared from the store", id))?;
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
