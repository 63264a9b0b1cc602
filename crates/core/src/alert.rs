//! Threshold alerts derived from enriched readings.
//!
//! | sensor_type | condition               | alert_type       | severity |
//! |-------------|-------------------------|------------------|----------|
//! | temperature | value > 35              | high_temperature | high     |
//! | temperature | value < 5               | low_temperature  | high     |
//! | humidity    | value < 30              | low_humidity     | medium   |
//! | ph          | value < 6.0 or > 8.0    | ph_out_of_range  | high     |
//!
//! All comparisons are strict. High humidity is deliberately not a rule
//! here, even though the ingestion API flags it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::{EnrichedReading, SensorType};

pub const HIGH_TEMPERATURE_THRESHOLD: f64 = 35.0;
pub const LOW_TEMPERATURE_THRESHOLD: f64 = 5.0;
pub const LOW_HUMIDITY_THRESHOLD: f64 = 30.0;
pub const PH_MIN: f64 = 6.0;
pub const PH_MAX: f64 = 8.0;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

/// Kind of threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighTemperature,
    LowTemperature,
    LowHumidity,
    PhOutOfRange,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighTemperature => "high_temperature",
            Self::LowTemperature => "low_temperature",
            Self::LowHumidity => "low_humidity",
            Self::PhOutOfRange => "ph_out_of_range",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::HighTemperature | Self::LowTemperature | Self::PhOutOfRange => Severity::High,
            Self::LowHumidity => Severity::Medium,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated alert. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub sensor_id: String,
    pub value: f64,
    pub severity: Severity,
    /// When the alert was generated, not when the reading was taken
    pub timestamp: DateTime<Utc>,
}

/// Which rule (if any) a sensor type and value trip.
pub fn breached_rule(sensor_type: SensorType, value: f64) -> Option<AlertType> {
    match sensor_type {
        SensorType::Temperature if value > HIGH_TEMPERATURE_THRESHOLD => {
            Some(AlertType::HighTemperature)
        }
        SensorType::Temperature if value < LOW_TEMPERATURE_THRESHOLD => {
            Some(AlertType::LowTemperature)
        }
        SensorType::Humidity if value < LOW_HUMIDITY_THRESHOLD => Some(AlertType::LowHumidity),
        SensorType::Ph if value < PH_MIN || value > PH_MAX => Some(AlertType::PhOutOfRange),
        _ => None,
    }
}

/// Maps an enriched reading to zero or more alerts stamped `generated_at`.
pub fn evaluate_alerts(reading: &EnrichedReading, generated_at: DateTime<Utc>) -> Vec<Alert> {
    breached_rule(reading.sensor_type(), reading.value())
        .map(|alert_type| Alert {
            alert_type,
            sensor_id: reading.sensor_id().to_string(),
            value: reading.value(),
            severity: alert_type.severity(),
            timestamp: generated_at,
        })
        .into_iter()
        .collect()
}
