//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{
    DbErrorCode, Error, MemoryTaskStore, NormalizedRecord, Result, SalesRecord, SourceTag, Task,
    TaskId, TaskStatus, TaskStore,
};
use parking_lot::Mutex;
use sources::{DataSource, SourceBatch};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// How a [`MockSource`] answers one `load` call.
#[derive(Debug, Clone)]
pub enum LoadBehavior {
    Rows(Vec<NormalizedRecord>),
    Unavailable(String),
    Panic(String),
}

/// Data source whose answers are scripted per call.
///
/// Scripted behaviors are consumed in order; once they run out every call
/// gets the fallback.
#[derive(Clone)]
pub struct MockSource {
    tag: SourceTag,
    script: Arc<Mutex<VecDeque<LoadBehavior>>>,
    fallback: Arc<Mutex<LoadBehavior>>,
    loads: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(tag: SourceTag, rows: Vec<NormalizedRecord>) -> Self {
        Self {
            tag,
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(LoadBehavior::Rows(rows))),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty(tag: SourceTag) -> Self {
        Self::new(tag, Vec::new())
    }

    /// Queues a one-off behavior for the next unscripted call.
    pub fn then(&self, behavior: LoadBehavior) -> &Self {
        self.script.lock().push_back(behavior);
        self
    }

    /// Replaces the fallback behavior.
    pub fn set_fallback(&self, behavior: LoadBehavior) {
        *self.fallback.lock() = behavior;
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn DataSource> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    fn describe(&self) -> String {
        format!("mock:{}", self.tag)
    }

    async fn load(&self) -> Result<SourceBatch> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        match behavior {
            LoadBehavior::Rows(rows) => {
                let mut batch = SourceBatch::new(self.tag);
                batch.records = rows;
                Ok(batch)
            }
            LoadBehavior::Unavailable(reason) => Err(Error::source_unavailable(self.tag, reason)),
            LoadBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

/// Memory store that records every status write in order.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryTaskStore,
    transitions: Mutex<Vec<(TaskId, TaskStatus)>>,
    fail_appends: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All status writes, oldest first.
    pub fn transitions(&self) -> Vec<(TaskId, TaskStatus)> {
        self.transitions.lock().clone()
    }

    /// Status writes for one task.
    pub fn transitions_for(&self, id: TaskId) -> Vec<TaskStatus> {
        self.transitions
            .lock()
            .iter()
            .filter(|(t, _)| *t == id)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Ids in the order they entered `in_progress`.
    pub fn start_order(&self) -> Vec<TaskId> {
        self.transitions
            .lock()
            .iter()
            .filter(|(_, s)| *s == TaskStatus::InProgress)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Makes `append_sales_records` fail.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskStore for RecordingStore {
    async fn create_task(&self, task: &Task) -> Result<()> {
        self.inner.create_task(task).await
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.inner.load_task(id).await
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.inner.update_task_status(id, status, error).await?;
        self.transitions.lock().push((id, status));
        Ok(())
    }

    async fn append_sales_records(
        &self,
        id: TaskId,
        records: &[NormalizedRecord],
    ) -> Result<usize> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Error::database(
                DbErrorCode::StoreFailed,
                "mock store rejected insert",
            ));
        }
        self.inner.append_sales_records(id, records).await
    }

    async fn list_records(&self, id: TaskId) -> Result<Vec<SalesRecord>> {
        self.inner.list_records(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.inner.list_tasks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::record;

    #[tokio::test]
    async fn test_mock_source_script_then_fallback() {
        let source = MockSource::new(SourceTag::A, vec![record("Acme", "2020-01-01", 1.0, SourceTag::A)]);
        source.then(LoadBehavior::Unavailable("offline".into()));

        assert!(source.load().await.is_err());
        assert_eq!(source.load().await.unwrap().records.len(), 1);
        assert_eq!(source.load_count(), 2);
    }

    #[tokio::test]
    async fn test_recording_store_tracks_transitions() {
        let store = RecordingStore::new();
        let task = Task::new("t", engine_core::FilterCriteria::years(2020, 2020));
        store.create_task(&task).await.unwrap();
        store
            .update_task_status(task.id, TaskStatus::InProgress, None)
            .await
            .unwrap();
        store
            .update_task_status(task.id, TaskStatus::Completed, None)
            .await
            .unwrap();

        assert_eq!(
            store.transitions_for(task.id),
            vec![TaskStatus::InProgress, TaskStatus::Completed]
        );
        assert_eq!(store.start_order(), vec![task.id]);

        store.set_fail_appends(true);
        assert!(store.append_sales_records(task.id, &[]).await.is_err());
    }
}
