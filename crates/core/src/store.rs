//! Persistence boundary for tasks and their result sets.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{DbErrorCode, Error, Result};
use crate::record::{NormalizedRecord, SalesRecord};
use crate::task::{Task, TaskId, TaskStatus};

/// Durable task and record storage.
///
/// Each call is treated as atomic and durable on its own; nothing spans
/// multiple calls.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a newly created task.
    async fn create_task(&self, task: &Task) -> Result<()>;

    /// Loads a task by id.
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Sets a task's status. `error` is stored alongside a `failed` status.
    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()>;

    /// Appends records to a task's result set, returning how many were written.
    async fn append_sales_records(&self, id: TaskId, records: &[NormalizedRecord])
        -> Result<usize>;

    /// Appends a single record.
    async fn append_sales_record(&self, id: TaskId, record: &NormalizedRecord) -> Result<()> {
        self.append_sales_records(id, std::slice::from_ref(record))
            .await
            .map(|_| ())
    }

    /// Lists a task's records in insertion order.
    async fn list_records(&self, id: TaskId) -> Result<Vec<SalesRecord>>;

    /// Lists all tasks, oldest first.
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Lists tasks currently in `status`, oldest first.
    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let tasks = self.list_tasks().await?;
        Ok(tasks.into_iter().filter(|t| t.status == status).collect())
    }
}

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<TaskId, Task>,
    /// Creation order
    order: Vec<TaskId>,
    records: HashMap<TaskId, Vec<SalesRecord>>,
}

/// In-process store, the default backend.
#[derive(Default)]
pub struct MemoryTaskStore {
    state: RwLock<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub fn task_count(&self) -> usize {
        self.state.read().tasks.len()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_task(&self, task: &Task) -> Result<()> {
        let mut state = self.state.write();
        if state.tasks.contains_key(&task.id) {
            return Err(Error::database(
                DbErrorCode::StoreFailed,
                format!("task {} already exists", task.id),
            ));
        }
        state.order.push(task.id);
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.state.read().tasks.get(&id).cloned())
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let task = state.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
        task.status = status;
        task.error = error;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn append_sales_records(
        &self,
        id: TaskId,
        records: &[NormalizedRecord],
    ) -> Result<usize> {
        let mut state = self.state.write();
        if !state.tasks.contains_key(&id) {
            return Err(Error::TaskNotFound(id));
        }
        let stored = state.records.entry(id).or_default();
        let start = stored.len() as u32;
        stored.extend(records.iter().enumerate().map(|(i, record)| SalesRecord {
            task_id: id,
            seq: start + i as u32,
            record: record.clone(),
        }));
        Ok(records.len())
    }

    async fn list_records(&self, id: TaskId) -> Result<Vec<SalesRecord>> {
        Ok(self
            .state
            .read()
            .records
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let state = self.state.read();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }
}
