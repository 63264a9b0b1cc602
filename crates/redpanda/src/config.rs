//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Where a fresh consumer starts reading the input topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    /// Everything still retained in the topic
    #[default]
    Earliest,
    /// Only readings produced after startup
    Latest,
}

/// Redpanda queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// SASL username (for cloud authentication)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (for cloud authentication)
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Topic readings are consumed from
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Topic failed payloads are written to
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    /// Partition read from and written to
    #[serde(default)]
    pub partition: i32,
    /// Upper bound on bytes per fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    /// Initial position when no offset was ever saved
    #[serde(default)]
    pub start_offset: StartOffset,
}

fn default_topic() -> String {
    "sensor_data".to_string()
}

fn default_dead_letter_topic() -> String {
    "failed_sensor_data".to_string()
}

fn default_fetch_max_bytes() -> i32 {
    1024 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            sasl_username: None,
            sasl_password: None,
            topic: default_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            partition: 0,
            fetch_max_bytes: default_fetch_max_bytes(),
            start_offset: StartOffset::default(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// SASL credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
