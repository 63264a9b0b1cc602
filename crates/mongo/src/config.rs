//! MongoDB configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MongoDB client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string
    pub uri: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection enriched readings are written to
    #[serde(default = "default_readings_collection")]
    pub readings_collection: String,
    /// Collection alerts are written to
    #[serde(default = "default_alerts_collection")]
    pub alerts_collection: String,
    /// How long to wait for a reachable server before failing an operation
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

fn default_database() -> String {
    "iot_agriculture".to_string()
}

fn default_readings_collection() -> String {
    "sensor_logs".to_string()
}

fn default_alerts_collection() -> String {
    "alerts".to_string()
}

fn default_server_selection_timeout_ms() -> u64 {
    5000
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: default_database(),
            readings_collection: default_readings_collection(),
            alerts_collection: default_alerts_collection(),
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
        }
    }
}

impl MongoConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}
