//! MongoDB client wrapper.

use crate::config::MongoConfig;
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use pipeline_core::{Alert, Backend, DocumentStore, EnrichedReading, Error, Result};
use tracing::{debug, info, warn};

/// Connected document store.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    readings: Collection<EnrichedReading>,
    alerts: Collection<Alert>,
    config: MongoConfig,
}

impl MongoStore {
    /// Connects and verifies the server with a `ping`.
    ///
    /// An unparseable connection string is a configuration error. Failures
    /// while resolving it (SRV lookups for `mongodb+srv://`) are
    /// connectivity failures like any other.
    pub async fn connect(config: MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| map_parse_error(&config.uri, e))?;
        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.app_name = Some("field-pipeline".to_string());

        let client = Client::with_options(options)
            .map_err(|e| Error::config(format!("Invalid MongoDB options: {}", e)))?;

        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| map_error("Ping failed", e))?;

        let readings = database.collection::<EnrichedReading>(&config.readings_collection);
        let alerts = database.collection::<Alert>(&config.alerts_collection);

        info!(
            database = %config.database,
            readings = %config.readings_collection,
            alerts = %config.alerts_collection,
            "Connected to MongoDB"
        );

        Ok(Self {
            database,
            readings,
            alerts,
            config,
        })
    }

    /// Creates the lookup indexes used by the query workload.
    ///
    /// Failures are logged and otherwise ignored; writes work without them.
    pub async fn ensure_indexes(&self) {
        let reading_indexes = [doc! { "sensor_id": 1 }, doc! { "timestamp": -1 }];
        for keys in reading_indexes {
            let model = IndexModel::builder().keys(keys.clone()).build();
            if let Err(e) = self.readings.create_index(model).await {
                warn!(
                    collection = %self.config.readings_collection,
                    keys = %keys,
                    error = %e,
                    "Failed to create index"
                );
            }
        }

        let alert_indexes = [doc! { "alert_type": 1 }, doc! { "timestamp": -1 }];
        for keys in alert_indexes {
            let model = IndexModel::builder().keys(keys.clone()).build();
            if let Err(e) = self.alerts.create_index(model).await {
                warn!(
                    collection = %self.config.alerts_collection,
                    keys = %keys,
                    error = %e,
                    "Failed to create index"
                );
            }
        }

        debug!(database = %self.config.database, "MongoDB indexes ensured");
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Number of documents in the readings collection for a sensor.
    pub async fn count_readings(&self, sensor_id: &str) -> Result<u64> {
        self.readings
            .count_documents(doc! { "sensor_id": sensor_id })
            .await
            .map_err(|e| map_error("Count failed", e))
    }

    /// Number of alerts raised for a sensor.
    pub async fn count_alerts(&self, sensor_id: &str) -> Result<u64> {
        self.alerts
            .count_documents(doc! { "sensor_id": sensor_id })
            .await
            .map_err(|e| map_error("Count failed", e))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()> {
        self.readings
            .insert_one(reading)
            .await
            .map_err(|e| map_error("Failed to insert reading", e))?;

        debug!(sensor_id = %reading.sensor_id(), "Inserted reading into MongoDB");
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts
            .insert_one(alert)
            .await
            .map_err(|e| map_error("Failed to insert alert", e))?;

        debug!(
            sensor_id = %alert.sensor_id,
            alert_type = alert.alert_type.as_str(),
            "Inserted alert into MongoDB"
        );
        Ok(())
    }
}

/// Whether a driver error kind means the server is unreachable.
fn is_connectivity(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
    )
}

/// Only a malformed connection string is a configuration error.
fn map_parse_error(uri: &str, e: mongodb::error::Error) -> Error {
    match e.kind.as_ref() {
        ErrorKind::InvalidArgument { .. } => {
            Error::config(format!("Invalid MongoDB URI {}: {}", redact(uri), e))
        }
        _ => map_error("Failed to resolve MongoDB URI", e),
    }
}

/// Connection string with any credentials removed, for log lines.
fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &uri[..scheme_end], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

fn map_error(context: &str, e: mongodb::error::Error) -> Error {
    if is_connectivity(e.kind.as_ref()) {
        Error::connection(Backend::DocumentStore, format!("{}: {}", context, e))
    } else {
        Error::store(Backend::DocumentStore, format!("{}: {}", context, e))
    }
}
