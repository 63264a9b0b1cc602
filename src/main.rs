//! Field telemetry pipeline.
//!
//! Consumes sensor readings from Redpanda and, for each one:
//! - validates and enriches it
//! - stores it in ClickHouse and MongoDB
//! - raises threshold alerts
//! - dead-letters anything that cannot be processed

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::{error, info};

use clickhouse_client::ClickHouseConfig;
use mongo_client::MongoConfig;
use pipeline_core::RetryPolicy;
use redpanda::RedpandaConfig;
use telemetry::{health, init_tracing_from_env, log_metrics, metrics};
use worker::{
    ConnectionManager, Enricher, Pipeline, PipelineConfig, RandomWeather, ReadingProcessor,
    ServiceConnector, StorageFanout,
};

/// Retry policies, one per concern.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RetryConfig {
    #[serde(default = "RetryPolicy::connect")]
    connect: RetryPolicy,
    #[serde(default = "RetryPolicy::store_write")]
    structured_store: RetryPolicy,
    #[serde(default = "RetryPolicy::store_write")]
    document_store: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connect: RetryPolicy::connect(),
            structured_store: RetryPolicy::store_write(),
            document_store: RetryPolicy::store_write(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    redpanda: RedpandaConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    mongo: MongoConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    retry: RetryConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires explicit crypto provider selection before any TLS use
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting field pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        brokers = %config.redpanda.broker_string(),
        topic = %config.redpanda.topic,
        dead_letter_topic = %config.redpanda.dead_letter_topic,
        clickhouse = %config.clickhouse.url,
        mongo_database = %config.mongo.database,
        "Loaded configuration"
    );

    let connector = ServiceConnector::new(
        config.redpanda.clone(),
        config.clickhouse.clone(),
        config.mongo.clone(),
    );
    let mut connections = ConnectionManager::new(Box::new(connector), config.retry.connect);
    connections
        .connect()
        .await
        .context("Failed to establish backend connections")?;

    let report = health().report();
    info!(status = ?report.status, "Backends ready");

    let processor = ReadingProcessor::new(
        Enricher::new(Arc::new(RandomWeather)),
        StorageFanout::new(config.retry.structured_store, config.retry.document_store),
    );
    let mut pipeline = Pipeline::new(connections, processor, config.pipeline.clone());

    tokio::select! {
        result = pipeline.run() => {
            if let Err(e) = result {
                error!(error = %e, "Pipeline terminated");
                return Err(e).context("Pipeline failed");
            }
        }
        _ = shutdown_signal() => {}
    }

    info!("Shutting down...");
    log_metrics(&metrics().snapshot());
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("FIELD_PIPELINE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(brokers) = std::env::var("FIELD_PIPELINE_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(username) = std::env::var("FIELD_PIPELINE_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("FIELD_PIPELINE_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }
    if let Ok(topic) = std::env::var("FIELD_PIPELINE_REDPANDA_TOPIC") {
        config.redpanda.topic = topic;
    }
    if let Ok(topic) = std::env::var("FIELD_PIPELINE_REDPANDA_DEAD_LETTER_TOPIC") {
        config.redpanda.dead_letter_topic = topic;
    }

    if let Ok(url) = std::env::var("FIELD_PIPELINE_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("FIELD_PIPELINE_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("FIELD_PIPELINE_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("FIELD_PIPELINE_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    if let Ok(uri) = std::env::var("FIELD_PIPELINE_MONGO_URI") {
        config.mongo.uri = uri;
    }
    if let Ok(database) = std::env::var("FIELD_PIPELINE_MONGO_DATABASE") {
        config.mongo.database = database;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
