//! Telemetry reading types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Kind of measurement a sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Ph,
}

impl SensorType {
    /// All accepted sensor types, in the order they are reported in errors.
    pub const ALL: [SensorType; 3] = [Self::Temperature, Self::Humidity, Self::Ph];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Ph => "ph",
        }
    }

    /// Parses the wire name of a sensor type.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-reported signal quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Quality {
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a quality label, falling back to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "good" => Self::Good,
            "fair" => Self::Fair,
            "poor" => Self::Poor,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for Quality {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// A validated telemetry sample from one sensor.
///
/// Only produced by [`crate::validation::validate_reading`]; never mutated
/// after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Reading {
    #[validate(length(min = 1, max = 50))]
    pub sensor_id: String,
    pub sensor_type: SensorType,
    #[validate(length(max = 50))]
    pub location: String,
    pub value: f64,
    /// Original ISO-8601 text as sent by the device
    pub timestamp: String,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub battery_level: f64,
}

/// Weather context attached during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 3] = [Self::Sunny, Self::Cloudy, Self::Rainy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
        }
    }
}

/// Processing status of an enriched reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Processed,
}

/// A reading after enrichment, ready for persistence.
///
/// Serializes flat: the reading's fields sit alongside the enrichment
/// fields, which is the shape the document store receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub processed_at: DateTime<Utc>,
    pub status: ReadingStatus,
    pub weather_condition: WeatherCondition,
}

impl EnrichedReading {
    pub fn sensor_id(&self) -> &str {
        &self.reading.sensor_id
    }

    pub fn sensor_type(&self) -> SensorType {
        self.reading.sensor_type
    }

    pub fn value(&self) -> f64 {
        self.reading.value
    }
}
