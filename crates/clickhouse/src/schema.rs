//! ClickHouse table schemas.
//!
//! - `tasks`: one row per status change, collapsed by `ReplacingMergeTree`
//!   on `version`; readers use `FINAL`
//! - `sales_records`: append-only, ordered by `(task_id, seq)`

use crate::client::ClickHouseClient;
use engine_core::{DbErrorCode, Error, Result};
use tracing::debug;

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// Task rows. `filters` holds the criteria as JSON.
pub fn create_tasks_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {}.tasks (
    task_id String,
    name String,
    status LowCardinality(String),
    filters String,
    error Nullable(String),
    created_at_ms Int64,
    updated_at_ms Int64,
    version UInt64
)
ENGINE = ReplacingMergeTree(version)
ORDER BY task_id
"#,
        database
    )
}

pub fn create_sales_records_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {}.sales_records (
    task_id String,
    seq UInt32,
    company String,
    model String,
    sale_date String,
    price Float64,
    location String,
    customer_type LowCardinality(String),
    source LowCardinality(String)
)
ENGINE = MergeTree()
ORDER BY (task_id, seq)
"#,
        database
    )
}

pub fn all_statements(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_tasks_table(database),
        create_sales_records_table(database),
    ]
}

/// Creates the database and both tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for sql in all_statements(client.database()) {
        client.inner().query(&sql).execute().await.map_err(|e| {
            Error::database(DbErrorCode::StoreFailed, format!("schema init failed: {}", e))
        })?;
    }

    debug!(database = %client.database(), "ClickHouse schema initialized");
    Ok(())
}
