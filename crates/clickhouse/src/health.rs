//! Startup connectivity check for the ClickHouse store.

use crate::client::ClickHouseClient;
use engine_core::{DbErrorCode, Error, Result};
use telemetry::health;
use tracing::{debug, error};

/// Asks the server for its version and records the outcome on the `store`
/// health component.
pub async fn check_connection(client: &ClickHouseClient) -> Result<String> {
    let version = client
        .inner()
        .query("SELECT version()")
        .fetch_one::<String>()
        .await;

    match version {
        Ok(version) => {
            debug!(url = %client.config().url, %version, "ClickHouse reachable");
            health().store.record_success();
            Ok(version)
        }
        Err(e) => {
            error!(url = %client.config().url, error = %e, "ClickHouse connection check failed");
            health().store.record_failure(format!("clickhouse: {}", e));
            Err(Error::database(
                DbErrorCode::QueryFailed,
                format!("ClickHouse at {} is unreachable: {}", client.config().url, e),
            ))
        }
    }
}
