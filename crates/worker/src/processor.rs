//! Per-task processing: the pending → in_progress → completed/failed
//! state machine.

use engine_core::{Error, Result, Task, TaskId, TaskStatus, TaskStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tracing::{debug, error, info, warn};

use crate::merge::MergeEngine;

/// Pool-wide set of task ids currently being processed.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    ids: Mutex<HashSet<TaskId>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id`, or returns `None` if another loop already holds it.
    /// The claim is released when the guard drops.
    pub fn try_claim(self: &Arc<Self>, id: TaskId) -> Option<InFlightGuard> {
        if !self.ids.lock().insert(id) {
            return None;
        }
        metrics().in_flight_tasks.inc();
        Some(InFlightGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.ids.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Claim on one in-flight task id.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    id: TaskId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.ids.lock().remove(&self.id);
        metrics().in_flight_tasks.dec();
    }
}

/// Why a dequeued id was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyClaimed,
    NotFound,
    NotPending(TaskStatus),
}

/// Result of handling one dequeued id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed { records: usize },
    Failed { reason: String },
    Skipped(SkipReason),
}

/// Runs one task at a time through the merge engine and records the result.
pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
    engine: Arc<MergeEngine>,
    in_flight: Arc<InFlightRegistry>,
    simulated_latency: Duration,
}

impl TaskProcessor {
    pub fn new(store: Arc<dyn TaskStore>, engine: Arc<MergeEngine>) -> Self {
        Self {
            store,
            engine,
            in_flight: Arc::new(InFlightRegistry::new()),
            simulated_latency: Duration::ZERO,
        }
    }

    /// Delay applied after a task enters `in_progress`.
    pub fn with_simulated_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = latency;
        self
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    /// Handles one dequeued id.
    ///
    /// Task failures are recorded on the task and returned as
    /// [`ProcessOutcome::Failed`]; `Err` means the store itself could not
    /// be read or written.
    pub async fn process(&self, id: TaskId) -> Result<ProcessOutcome> {
        let Some(_claim) = self.in_flight.try_claim(id) else {
            debug!(task_id = %id, "Task already in flight, skipping");
            return Ok(ProcessOutcome::Skipped(SkipReason::AlreadyClaimed));
        };

        let task = match track_store(self.store.load_task(id).await)? {
            Some(task) => task,
            None => {
                let err = Error::TaskNotFound(id);
                warn!(task_id = %id, code = err.error_code(), "Dropping unknown task id");
                metrics().tasks_dropped.inc();
                return Ok(ProcessOutcome::Skipped(SkipReason::NotFound));
            }
        };

        if !task.status.can_transition_to(TaskStatus::InProgress) {
            debug!(task_id = %id, status = %task.status, "Task already processed, skipping");
            metrics().tasks_dropped.inc();
            return Ok(ProcessOutcome::Skipped(SkipReason::NotPending(task.status)));
        }

        self.write_status(id, TaskStatus::InProgress).await?;
        metrics().tasks_started.inc();
        info!(task_id = %id, name = %task.name, "Task in progress");

        let started = Instant::now();
        let outcome = match self.run_isolated(task).await {
            Ok(records) => {
                self.write_status(id, TaskStatus::Completed).await?;
                metrics().tasks_completed.inc();
                info!(task_id = %id, records, elapsed_ms = %started.elapsed().as_millis(), "Task completed");
                ProcessOutcome::Completed { records }
            }
            Err(reason) => {
                track_store(
                    self.store
                        .update_task_status(id, TaskStatus::Failed, Some(reason.clone()))
                        .await,
                )?;
                metrics().tasks_failed.inc();
                warn!(task_id = %id, reason = %reason, "Task failed");
                ProcessOutcome::Failed { reason }
            }
        };
        metrics()
            .task_latency_ms
            .observe_duration(started.elapsed());

        Ok(outcome)
    }

    /// Writes a forward status. If the store rejects it, the task is marked
    /// `failed` with the store error so it never stays pending or in progress
    /// after its id has left the queue.
    async fn write_status(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        let result = track_store(self.store.update_task_status(id, status, None).await);
        if let Err(err) = &result {
            match self
                .store
                .update_task_status(id, TaskStatus::Failed, Some(err.to_string()))
                .await
            {
                Ok(()) => {
                    metrics().tasks_failed.inc();
                    warn!(task_id = %id, target_status = %status, code = err.error_code(), error = %err, "Status write failed, task marked failed");
                }
                Err(e) => {
                    error!(task_id = %id, target_status = %status, error = %e, "Could not mark task failed");
                }
            }
        }
        result
    }

    /// Runs latency, merge and persist on a separate tokio task. A panic
    /// there comes back as a failure reason.
    async fn run_isolated(&self, task: Task) -> std::result::Result<usize, String> {
        let handle = tokio::spawn(merge_and_persist(
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            task,
            self.simulated_latency,
        ));

        match handle.await {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(e)) => Err(e.to_string()),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Task processing panicked");
                Err(format!("processing panicked: {}", message))
            }
            Err(join_err) => Err(format!("processing aborted: {}", join_err)),
        }
    }
}

async fn merge_and_persist(
    store: Arc<dyn TaskStore>,
    engine: Arc<MergeEngine>,
    task: Task,
    latency: Duration,
) -> Result<usize> {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    let outcome = engine.process(&task).await?;
    if outcome.records.is_empty() {
        return Ok(0);
    }

    let started = Instant::now();
    let written = track_store(store.append_sales_records(task.id, &outcome.records).await)?;
    metrics()
        .persist_latency_ms
        .observe_duration(started.elapsed());
    debug!(task_id = %task.id, written, "Persisted sales records");

    Ok(written)
}

/// Feeds store call results into the store health component.
fn track_store<T>(result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => health().store.record_success(),
        Err(Error::TaskNotFound(_)) => {}
        Err(e) => {
            metrics().store_errors.inc();
            health().store.record_failure(e.to_string());
            error!(error = %e, "Store operation failed");
        }
    }
    result
}
