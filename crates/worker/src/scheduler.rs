//! Worker pool: `workers` independent loops over one shared queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use task_queue::TaskQueue;
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::processor::TaskProcessor;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker loops
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Delay applied to every task after it enters `in_progress`
    #[serde(default)]
    pub simulated_latency_ms: u64,
    /// Queue capacity; unbounded when absent
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Interval between metrics log lines; zero disables them
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,
}

fn default_workers() -> usize {
    1
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            simulated_latency_ms: 0,
            queue_capacity: None,
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_secs)
    }
}

/// Pool of worker loops sharing one queue and one in-flight registry.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<dyn TaskQueue>,
    processor: Arc<TaskProcessor>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, queue: Arc<dyn TaskQueue>, processor: TaskProcessor) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            queue,
            processor: Arc::new(processor),
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn processor(&self) -> &Arc<TaskProcessor> {
        &self.processor
    }

    pub fn is_running(&self) -> bool {
        !self.handles.lock().is_empty()
    }

    /// Spawns the worker loops and the metrics logger. Calling it on a
    /// running pool does nothing.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            warn!("Worker pool already running");
            return;
        }
        self.shutdown.send_replace(false);

        let workers = self.config.workers.max(1);
        for worker in 0..workers {
            handles.push(tokio::spawn(run_loop(
                worker,
                Arc::clone(&self.queue),
                Arc::clone(&self.processor),
                self.shutdown.subscribe(),
            )));
        }

        let log_interval = self.config.metrics_log_interval();
        if !log_interval.is_zero() {
            handles.push(tokio::spawn(run_metrics_log(
                log_interval,
                self.shutdown.subscribe(),
            )));
        }

        info!(workers, "Worker pool started");
    }

    /// Stops the loops from taking new ids and waits for each to finish
    /// its current task.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker loop ended abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn run_loop(
    worker: usize,
    queue: Arc<dyn TaskQueue>,
    processor: Arc<TaskProcessor>,
    mut shutdown: watch::Receiver<bool>,
) {
    metrics().active_workers.inc();
    debug!(worker, "Worker loop started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let next = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            id = queue.dequeue() => id,
        };
        let Some(id) = next else {
            debug!(worker, "Queue closed and drained");
            break;
        };

        match processor.process(id).await {
            Ok(outcome) => debug!(worker, task_id = %id, ?outcome, "Handled task"),
            Err(e) => error!(worker, task_id = %id, error = %e, "Task processing error"),
        }
    }

    metrics().active_workers.dec();
    debug!(worker, "Worker loop stopped");
}

async fn run_metrics_log(every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let s = metrics().snapshot();
                info!(
                    submitted = s.tasks_submitted,
                    completed = s.tasks_completed,
                    failed = s.tasks_failed,
                    dropped = s.tasks_dropped,
                    records_accepted = s.records_accepted,
                    records_malformed = s.records_malformed,
                    queue_depth = s.queue_depth,
                    in_flight = s.in_flight_tasks,
                    task_latency_p95_ms = s.task_latency.p95_ms,
                    "Pipeline metrics"
                );
            }
        }
    }
}
