//! Testcontainer setup for ClickHouse.
//!
//! Set `ANALYTICS_TEST_CLICKHOUSE_URL` to use an existing server instead of
//! starting a container.

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use uuid::Uuid;

/// Running ClickHouse (container or external) with a fresh database.
pub struct TestClickHouse {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub config: ClickHouseConfig,
}

impl TestClickHouse {
    pub async fn start() -> Self {
        // Each run gets its own database so tests never see each other's rows
        let database = format!("analytics_test_{}", Uuid::new_v4().simple());

        if let Some(url) = std::env::var("ANALYTICS_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self {
                container: None,
                config: ClickHouseConfig {
                    url,
                    database,
                    username: std::env::var("ANALYTICS_TEST_CLICKHOUSE_USER").ok(),
                    password: std::env::var("ANALYTICS_TEST_CLICKHOUSE_PASSWORD").ok(),
                    ..ClickHouseConfig::default()
                },
            };
        }

        let (container, url) = start_clickhouse().await;
        Self {
            container: Some(container),
            config: ClickHouseConfig {
                url,
                database,
                username: Some("default".to_string()),
                password: None,
                ..ClickHouseConfig::default()
            },
        }
    }

    /// Store over a freshly created schema.
    pub async fn store(&self) -> ClickHouseStore {
        let client =
            ClickHouseClient::new(self.config.clone()).expect("Failed to create ClickHouse client");
        clickhouse_client::schema::init_schema(&client)
            .await
            .expect("Failed to initialize schema");
        ClickHouseStore::new(client)
    }
}

/// Start ClickHouse container, return container and HTTP URL.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_http(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
