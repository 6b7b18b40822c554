//! Submission and query boundary.

use engine_core::{Error, Result, Task, TaskId, TaskReport, TaskStatus, TaskStore, TaskSubmission};
use std::sync::Arc;
use std::time::Duration;
use task_queue::TaskQueue;
use telemetry::metrics;
use tracing::{error, info, warn};

/// Failure reason recorded for tasks found `in_progress` at startup.
pub const INTERRUPTED_REASON: &str = "interrupted before completion";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What [`TaskService::recover`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub interrupted: usize,
}

/// Creates tasks, hands their ids to the queue and answers status queries.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Validates the submission, stores it as `pending` and enqueues it.
    ///
    /// If the queue refuses the id the stored task is marked `failed` with
    /// the queue error as reason, and that error is returned.
    pub async fn submit(&self, submission: TaskSubmission) -> Result<Task> {
        let (name, filters) = submission.into_parts().inspect_err(|e| {
            metrics().tasks_rejected.inc();
            warn!(error = %e, "Rejected submission");
        })?;

        let task = Task::new(name, filters);
        self.store.create_task(&task).await?;
        metrics().tasks_submitted.inc();

        if let Err(e) = self.queue.enqueue(task.id) {
            metrics().tasks_rejected.inc();
            warn!(task_id = %task.id, error = %e, "Could not enqueue task");
            self.fail(task.id, e.to_string()).await;
            return Err(e);
        }

        info!(task_id = %task.id, name = %task.name, "Task submitted");
        Ok(task)
    }

    /// Task with its persisted records, or `None` for an unknown id.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskReport>> {
        let Some(task) = self.store.load_task(id).await? else {
            return Ok(None);
        };
        let records = self.store.list_records(id).await?;
        Ok(Some(TaskReport { task, records }))
    }

    /// All tasks, oldest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks().await
    }

    /// Re-enqueues stored `pending` tasks and fails stored `in_progress`
    /// ones. Run before the worker pool starts.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for task in self.store.list_tasks().await? {
            match task.status {
                TaskStatus::Pending => match self.queue.enqueue(task.id) {
                    Ok(()) => report.requeued += 1,
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "Could not requeue pending task");
                        self.fail(task.id, e.to_string()).await;
                    }
                },
                TaskStatus::InProgress => {
                    self.store
                        .update_task_status(task.id, TaskStatus::Failed, Some(INTERRUPTED_REASON.into()))
                        .await?;
                    metrics().tasks_failed.inc();
                    warn!(task_id = %task.id, "Task was interrupted, marked failed");
                    report.interrupted += 1;
                }
                TaskStatus::Completed | TaskStatus::Failed => {}
            }
        }

        if report != RecoveryReport::default() {
            info!(
                requeued = report.requeued,
                interrupted = report.interrupted,
                "Recovered stored tasks"
            );
        }
        Ok(report)
    }

    /// Polls the store until the task is `completed` or `failed`.
    pub async fn wait_for_terminal(&self, id: TaskId, timeout: Duration) -> Result<Task> {
        tokio::time::timeout(timeout, self.poll_until_terminal(id))
            .await
            .map_err(|_| {
                Error::internal(format!(
                    "task {} not finished after {}ms",
                    id,
                    timeout.as_millis()
                ))
            })?
    }

    async fn poll_until_terminal(&self, id: TaskId) -> Result<Task> {
        loop {
            match self.store.load_task(id).await? {
                Some(task) if task.status.is_terminal() => return Ok(task),
                Some(_) => tokio::time::sleep(POLL_INTERVAL).await,
                None => return Err(Error::TaskNotFound(id)),
            }
        }
    }

    async fn fail(&self, id: TaskId, reason: String) {
        match self
            .store
            .update_task_status(id, TaskStatus::Failed, Some(reason))
            .await
        {
            Ok(()) => metrics().tasks_failed.inc(),
            Err(e) => error!(task_id = %id, error = %e, "Could not mark task failed"),
        }
    }
}
