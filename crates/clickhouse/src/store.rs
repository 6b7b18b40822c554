//! `TaskStore` backed by ClickHouse.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use engine_core::{
    DbErrorCode, Error, NormalizedRecord, Result, SalesRecord, SourceTag, Task, TaskId,
    TaskStatus, TaskStore,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::client::ClickHouseClient;

const TASK_COLUMNS: &str =
    "task_id, name, status, filters, error, created_at_ms, updated_at_ms, version";

const RECORD_COLUMNS: &str =
    "task_id, seq, company, model, sale_date, price, location, customer_type, source";

/// One version of a task.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TaskRow {
    pub task_id: String,
    pub name: String,
    pub status: String,
    pub filters: String,
    pub error: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub version: u64,
}

impl TaskRow {
    pub fn from_task(task: &Task, version: u64) -> Result<Self> {
        Ok(Self {
            task_id: task.id.to_string(),
            name: task.name.clone(),
            status: task.status.as_str().to_string(),
            filters: serde_json::to_string(&task.filters)?,
            error: task.error.clone(),
            created_at_ms: task.created_at.timestamp_millis(),
            updated_at_ms: task.updated_at.timestamp_millis(),
            version,
        })
    }

    pub fn into_task(self) -> Result<Task> {
        Ok(Task {
            id: self.task_id.parse()?,
            name: self.name,
            status: self.status.parse()?,
            filters: serde_json::from_str(&self.filters)?,
            created_at: from_millis(self.created_at_ms)?,
            updated_at: from_millis(self.updated_at_ms)?,
            error: self.error,
        })
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct SalesRecordRow {
    pub task_id: String,
    pub seq: u32,
    pub company: String,
    pub model: String,
    pub sale_date: String,
    pub price: f64,
    pub location: String,
    pub customer_type: String,
    pub source: String,
}

impl SalesRecordRow {
    fn new(task_id: TaskId, seq: u32, record: &NormalizedRecord) -> Self {
        Self {
            task_id: task_id.to_string(),
            seq,
            company: record.company.clone(),
            model: record.model.clone(),
            sale_date: record.sale_date.clone(),
            price: record.price,
            location: record.location.clone(),
            customer_type: record.customer_type.clone(),
            source: record.source.as_str().to_string(),
        }
    }

    fn into_sales_record(self) -> Result<SalesRecord> {
        Ok(SalesRecord {
            task_id: self.task_id.parse()?,
            seq: self.seq,
            record: NormalizedRecord {
                company: self.company,
                model: self.model,
                sale_date: self.sale_date,
                price: self.price,
                location: self.location,
                customer_type: self.customer_type,
                source: self.source.parse::<SourceTag>()?,
            },
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        Error::database(DbErrorCode::QueryFailed, format!("timestamp out of range: {}", ms))
    })
}

fn store_failed(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::StoreFailed, format!("Insert error: {}", e))
}

fn query_failed(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::QueryFailed, format!("Query error: {}", e))
}

/// Task store on the `tasks` and `sales_records` tables.
///
/// Run [`crate::init_schema`] before first use.
#[derive(Clone)]
pub struct ClickHouseTaskStore {
    client: ClickHouseClient,
}

impl ClickHouseTaskStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    async fn latest_row(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let sql = format!(
            "SELECT {} FROM {} FINAL WHERE task_id = ? LIMIT 1",
            TASK_COLUMNS,
            self.client.tasks_table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(id.to_string())
            .fetch_optional::<TaskRow>()
            .await
            .map_err(query_failed)
    }

    async fn insert_task_row(&self, row: &TaskRow) -> Result<()> {
        let mut insert = self
            .client
            .inner()
            .insert(&self.client.tasks_table())
            .map_err(store_failed)?;
        insert.write(row).await.map_err(store_failed)?;
        insert.end().await.map_err(store_failed)
    }

    async fn record_count(&self, id: TaskId) -> Result<u64> {
        let sql = format!(
            "SELECT count() FROM {} WHERE task_id = ?",
            self.client.records_table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(id.to_string())
            .fetch_one::<u64>()
            .await
            .map_err(query_failed)
    }
}

#[async_trait]
impl TaskStore for ClickHouseTaskStore {
    async fn create_task(&self, task: &Task) -> Result<()> {
        if self.latest_row(task.id).await?.is_some() {
            return Err(Error::database(
                DbErrorCode::StoreFailed,
                format!("task {} already exists", task.id),
            ));
        }
        self.insert_task_row(&TaskRow::from_task(task, 1)?).await
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.latest_row(id).await?.map(TaskRow::into_task).transpose()
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        let current = self.latest_row(id).await?.ok_or(Error::TaskNotFound(id))?;
        let version = current.version + 1;

        let mut task = current.into_task()?;
        task.status = status;
        task.error = error;
        task.updated_at = Utc::now();

        self.insert_task_row(&TaskRow::from_task(&task, version)?).await
    }

    async fn append_sales_records(
        &self,
        id: TaskId,
        records: &[NormalizedRecord],
    ) -> Result<usize> {
        if self.latest_row(id).await?.is_none() {
            return Err(Error::TaskNotFound(id));
        }
        if records.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let first_seq = self.record_count(id).await? as u32;

        let mut insert = self
            .client
            .inner()
            .insert(&self.client.records_table())
            .map_err(store_failed)?;
        for (i, record) in records.iter().enumerate() {
            let row = SalesRecordRow::new(id, first_seq + i as u32, record);
            insert.write(&row).await.map_err(store_failed)?;
        }
        insert.end().await.map_err(store_failed)?;

        debug!(
            task_id = %id,
            count = records.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Inserted sales records"
        );
        Ok(records.len())
    }

    async fn list_records(&self, id: TaskId) -> Result<Vec<SalesRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE task_id = ? ORDER BY seq",
            RECORD_COLUMNS,
            self.client.records_table()
        );
        let rows = self
            .client
            .inner()
            .query(&sql)
            .bind(id.to_string())
            .fetch_all::<SalesRecordRow>()
            .await
            .map_err(query_failed)?;

        rows.into_iter()
            .map(SalesRecordRow::into_sales_record)
            .collect()
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM {} FINAL ORDER BY created_at_ms, task_id",
            TASK_COLUMNS,
            self.client.tasks_table()
        );
        let rows = self
            .client
            .inner()
            .query(&sql)
            .fetch_all::<TaskRow>()
            .await
            .map_err(query_failed)?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM {} FINAL WHERE status = ? ORDER BY created_at_ms, task_id",
            TASK_COLUMNS,
            self.client.tasks_table()
        );
        let rows = self
            .client
            .inner()
            .query(&sql)
            .bind(status.as_str())
            .fetch_all::<TaskRow>()
            .await
            .map_err(query_failed)?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }
}
