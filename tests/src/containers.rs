//! ClickHouse server for the store tests.
//!
//! `SALES_TEST_CLICKHOUSE_URL` (with optional `SALES_TEST_CLICKHOUSE_USER` /
//! `SALES_TEST_CLICKHOUSE_PASSWORD`) points the tests at an existing server;
//! otherwise a container is started.

use clickhouse_client::ClickHouseConfig;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const IMAGE: &str = "clickhouse/clickhouse-server";
const TAG: &str = "24.3";
const HTTP_PORT: u16 = 8123;
const READY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClickHouseServer {
    /// Dropping the handle stops the container
    _container: Option<ContainerAsync<GenericImage>>,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ClickHouseServer {
    pub async fn start() -> Self {
        let external = std::env::var("SALES_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let server = match external {
            Some(url) => Self {
                _container: None,
                url,
                username: std::env::var("SALES_TEST_CLICKHOUSE_USER").ok(),
                password: std::env::var("SALES_TEST_CLICKHOUSE_PASSWORD").ok(),
            },
            None => {
                let container = GenericImage::new(IMAGE, TAG)
                    .with_wait_for(WaitFor::seconds(5))
                    .with_exposed_port(HTTP_PORT.tcp())
                    .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
                    .with_env_var("CLICKHOUSE_USER", "default")
                    .with_env_var("CLICKHOUSE_PASSWORD", "")
                    .start()
                    .await
                    .expect("Failed to start ClickHouse container");
                let port = container
                    .get_host_port_ipv4(HTTP_PORT)
                    .await
                    .expect("ClickHouse HTTP port not mapped");
                Self {
                    _container: Some(container),
                    url: format!("http://127.0.0.1:{}", port),
                    username: Some("default".to_string()),
                    password: None,
                }
            }
        };

        server.wait_until_ready().await;
        server
    }

    /// Store config for `database` on this server.
    pub fn config(&self, database: &str) -> ClickHouseConfig {
        let mut config = ClickHouseConfig::default()
            .with_url(self.url.clone())
            .with_database(database);
        config.username = self.username.clone();
        config.password = self.password.clone();
        config
    }

    /// Polls the `/ping` endpoint until the server answers.
    async fn wait_until_ready(&self) {
        let client = reqwest::Client::new();
        let ping = format!("{}/ping", self.url);
        let deadline = tokio::time::Instant::now() + READY_TIMEOUT;

        while tokio::time::Instant::now() < deadline {
            let ready = client
                .get(&ping)
                .send()
                .await
                .is_ok_and(|resp| resp.status().is_success());
            if ready {
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        panic!("ClickHouse at {} not ready after {:?}", self.url, READY_TIMEOUT);
    }
}
