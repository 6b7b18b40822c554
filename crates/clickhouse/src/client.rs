//! Connection handle shared by the schema setup and the task store.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use tracing::info;

/// Table holding one row per task version.
pub const TASKS_TABLE: &str = "tasks";
/// Table holding the persisted result sets.
pub const SALES_RECORDS_TABLE: &str = "sales_records";

/// HTTP client for the configured server.
///
/// No default database is set on the inner client: `init_schema` has to be
/// able to create it, so every statement names `database.table` explicitly.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    pub fn new(config: ClickHouseConfig) -> Self {
        let mut inner = Client::default().with_url(&config.url);
        if let Some(user) = config.username.as_deref() {
            inner = inner.with_user(user);
        }
        if let Some(password) = config.password.as_deref() {
            inner = inner.with_password(password);
        }

        info!(
            url = %config.url,
            database = %config.database,
            authenticated = config.username.is_some(),
            "ClickHouse task store client ready"
        );

        Self { inner, config }
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Qualified name of the tasks table.
    pub fn tasks_table(&self) -> String {
        format!("{}.{}", self.config.database, TASKS_TABLE)
    }

    /// Qualified name of the sales records table.
    pub fn records_table(&self) -> String {
        format!("{}.{}", self.config.database, SALES_RECORDS_TABLE)
    }
}
