//! Testcontainer setup for ClickHouse and MongoDB.
//!
//! Redpanda is replaced by the in-memory queue in [`crate::mocks`].
//! Set `FIELD_PIPELINE_TEST_CLICKHOUSE_URL` / `FIELD_PIPELINE_TEST_MONGO_URI`
//! to run against already-running servers instead.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

/// A ClickHouse server, either started here or provided externally.
pub struct ClickHouseContainer {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
}

impl ClickHouseContainer {
    pub async fn start() -> Self {
        if let Some(url) = env_override("FIELD_PIPELINE_TEST_CLICKHOUSE_URL") {
            return Self {
                container: None,
                url,
            };
        }

        // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 allows the passwordless default user
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

        Self {
            container: Some(container),
            url,
        }
    }
}

/// A MongoDB server, either started here or provided externally.
pub struct MongoContainer {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub uri: String,
}

impl MongoContainer {
    pub async fn start() -> Self {
        if let Some(uri) = env_override("FIELD_PIPELINE_TEST_MONGO_URI") {
            return Self {
                container: None,
                uri,
            };
        }

        let image = GenericImage::new("mongo", "7.0")
            .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
            .with_exposed_port(27017.tcp());

        let container = image.start().await.expect("Failed to start MongoDB");

        let port = container.get_host_port_ipv4(27017).await.unwrap();
        let uri = format!("mongodb://127.0.0.1:{}", port);

        Self {
            container: Some(container),
            uri,
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
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
