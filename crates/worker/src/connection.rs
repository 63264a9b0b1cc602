//! Backend connection lifecycle.
//!
//! The [`ConnectionManager`] is the only owner of backend handles. Each
//! establishment builds a fresh [`Backends`] set; a broken set is dropped,
//! never repaired.

use crate::retry::retry;
use async_trait::async_trait;
use clickhouse_client::health::{check_connection, init_schema};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use mongo_client::{MongoConfig, MongoStore};
use pipeline_core::{
    DocumentStore, Error, OffsetStore, ReadingQueue, Result, RetryPolicy, StructuredStore,
};
use redpanda::{QueueCursor, RedpandaConfig, RedpandaQueue};
use std::sync::Arc;
use telemetry::{health, metrics, ComponentHealth};
use tracing::{error, info, warn};

/// One live handle per backend.
pub struct Backends {
    pub queue: Box<dyn ReadingQueue>,
    pub structured: Box<dyn StructuredStore>,
    pub documents: Box<dyn DocumentStore>,
}

/// Builds a complete set of backend handles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Backends>;
}

/// Connects to ClickHouse, Redpanda and MongoDB.
///
/// ClickHouse comes first: it also holds the saved consumer offsets the
/// queue resumes from.
pub struct ServiceConnector {
    redpanda: RedpandaConfig,
    clickhouse: ClickHouseConfig,
    mongo: MongoConfig,
    cursor: Arc<QueueCursor>,
}

impl ServiceConnector {
    pub fn new(redpanda: RedpandaConfig, clickhouse: ClickHouseConfig, mongo: MongoConfig) -> Self {
        Self {
            redpanda,
            clickhouse,
            mongo,
            cursor: Arc::new(QueueCursor::new()),
        }
    }

    async fn connect_structured(&self) -> Result<ClickHouseClient> {
        let client = ClickHouseClient::new(self.clickhouse.clone());
        check_connection(&client).await?;
        init_schema(&client).await?;
        Ok(client)
    }

    async fn connect_documents(&self) -> Result<MongoStore> {
        let store = MongoStore::connect(self.mongo.clone()).await?;
        store.ensure_indexes().await;
        Ok(store)
    }
}

#[async_trait]
impl Connector for ServiceConnector {
    async fn connect(&self) -> Result<Backends> {
        let registry = health();

        let structured = self.connect_structured().await;
        record(&registry.structured_store, &structured);
        let structured = structured?;

        let offsets: Arc<dyn OffsetStore> = Arc::new(structured.clone());
        let queue =
            RedpandaQueue::connect(self.redpanda.clone(), self.cursor.clone(), Some(offsets))
                .await;
        record(&registry.queue, &queue);
        let queue = queue?;

        let documents = self.connect_documents().await;
        record(&registry.document_store, &documents);
        let documents = documents?;

        Ok(Backends {
            queue: Box::new(queue),
            structured: Box::new(structured),
            documents: Box::new(documents),
        })
    }
}

fn record<T>(component: &ComponentHealth, result: &Result<T>) {
    match result {
        Ok(_) => component.set_healthy(),
        Err(e) => component.set_unhealthy(e.to_string()),
    }
}

/// Owns the backend handles and (re-)establishes them under a retry policy.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    policy: RetryPolicy,
    backends: Option<Backends>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn Connector>, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            backends: None,
        }
    }

    /// Establishes every backend at startup.
    ///
    /// Running out of attempts is a startup failure the caller must not
    /// continue past.
    pub async fn connect(&mut self) -> Result<()> {
        match self.establish().await {
            Ok(backends) => {
                self.backends = Some(backends);
                info!("All backends connected");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to backends");
                Err(Error::startup(e.to_string()))
            }
        }
    }

    /// Discards the current handles and establishes new ones.
    ///
    /// On failure no handles are held; the caller may try again later.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.backends = None;

        match self.establish().await {
            Ok(backends) => {
                self.backends = Some(backends);
                metrics().reconnects.inc();
                info!(ready = health().is_ready(), "Backends reconnected");
                Ok(())
            }
            Err(e) => {
                metrics().reconnect_failures.inc();
                warn!(error = %e, "Reconnect failed");
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<Backends> {
        let connector = self.connector.as_ref();
        retry(&self.policy, "connect", || connector.connect()).await
    }

    /// Live handles, if the last establishment succeeded.
    pub fn backends_mut(&mut self) -> Option<&mut Backends> {
        self.backends.as_mut()
    }

    pub fn is_connected(&self) -> bool {
        self.backends.is_some()
    }
}
