//! Reading validation.
//!
//! Rules run in a fixed order and the first violation wins:
//! 1. every required field is present
//! 2. `value` is numeric
//! 3. `sensor_type` is a known type
//! 4. `timestamp` parses as a date-time
//!
//! Text constraints on `sensor_id` and `location` are checked only after
//! those four pass.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::reading::{Quality, Reading, SensorType};

/// Fields every reading must carry, in check order.
pub const REQUIRED_FIELDS: [&str; 5] = ["sensor_id", "sensor_type", "location", "value", "timestamp"];

/// The first rule a raw reading broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Value must be a number")]
    NonNumericValue,

    #[error("Invalid sensor type '{0}'. Must be one of: temperature, humidity, ph")]
    UnknownSensorType(String),

    #[error("Invalid timestamp format: {0}")]
    InvalidTimestamp(String),

    #[error("Field {0} must be a string")]
    NotText(&'static str),

    #[error("Field constraint violated: {0}")]
    Constraint(String),
}

impl ValidationFailure {
    /// Field the failure is about, when there is exactly one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField(f) | Self::NotText(f) => Some(f),
            Self::NonNumericValue => Some("value"),
            Self::UnknownSensorType(_) => Some("sensor_type"),
            Self::InvalidTimestamp(_) => Some("timestamp"),
            Self::Constraint(_) => None,
        }
    }
}

/// Validates a parsed payload and builds the typed reading from it.
///
/// Deterministic and side-effect free; a failure here is permanent.
pub fn validate_reading(data: &Value) -> Result<Reading, ValidationFailure> {
    for field in REQUIRED_FIELDS {
        if data.get(field).is_none() {
            return Err(ValidationFailure::MissingField(field));
        }
    }

    let value = data["value"]
        .as_f64()
        .ok_or(ValidationFailure::NonNumericValue)?;

    let sensor_type = match &data["sensor_type"] {
        Value::String(s) => {
            SensorType::parse(s).ok_or_else(|| ValidationFailure::UnknownSensorType(s.clone()))?
        }
        other => return Err(ValidationFailure::UnknownSensorType(other.to_string())),
    };

    let timestamp = match &data["timestamp"] {
        Value::String(s) if parse_timestamp(s) => s.clone(),
        Value::String(s) => return Err(ValidationFailure::InvalidTimestamp(s.clone())),
        other => return Err(ValidationFailure::InvalidTimestamp(other.to_string())),
    };

    let sensor_id = text_field(data, "sensor_id")?;
    let location = text_field(data, "location")?;

    let quality = data
        .get("quality")
        .and_then(Value::as_str)
        .map(Quality::parse)
        .unwrap_or_default();

    let battery_level = data
        .get("battery_level")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let reading = Reading {
        sensor_id,
        sensor_type,
        location,
        value,
        timestamp,
        quality,
        battery_level,
    };

    reading
        .validate()
        .map_err(|e| ValidationFailure::Constraint(e.to_string()))?;

    Ok(reading)
}

fn text_field(data: &Value, field: &'static str) -> Result<String, ValidationFailure> {
    data[field]
        .as_str()
        .map(str::to_owned)
        .ok_or(ValidationFailure::NotText(field))
}

/// Accepts the ISO-8601 forms devices are known to send.
///
/// RFC 3339 (with offset or `Z`), a naive date-time read as UTC, or a bare
/// date.
pub fn parse_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
