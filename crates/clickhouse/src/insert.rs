//! Reading inserts for ClickHouse.

use crate::client::{map_error, ClickHouseClient};
use crate::schema::READINGS_TABLE;
use async_trait::async_trait;
use clickhouse::Row;
use pipeline_core::{EnrichedReading, Result, StructuredStore};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Flattened reading row for ClickHouse insertion.
#[derive(Debug, Clone, Row, Serialize)]
pub struct ReadingRow {
    pub id: String,
    pub sensor_id: String,
    pub sensor_type: String,
    pub location: String,
    pub value: f64,
    pub timestamp: String,
    pub quality: String,
    pub battery_level: f64,
}

impl From<&EnrichedReading> for ReadingRow {
    fn from(enriched: &EnrichedReading) -> Self {
        let reading = &enriched.reading;
        Self {
            id: Uuid::new_v4().to_string(),
            sensor_id: reading.sensor_id.clone(),
            sensor_type: reading.sensor_type.as_str().to_string(),
            location: reading.location.clone(),
            value: reading.value,
            timestamp: reading.timestamp.clone(),
            quality: reading.quality.as_str().to_string(),
            battery_level: reading.battery_level,
        }
    }
}

impl ClickHouseClient {
    /// Inserts a single reading row.
    pub async fn insert_row(&self, row: &ReadingRow) -> Result<()> {
        let mut insert = self
            .inner()
            .insert(READINGS_TABLE)
            .map_err(|e| map_error("Failed to start insert", e))?;

        insert
            .write(row)
            .await
            .map_err(|e| map_error("Failed to write row", e))?;

        insert
            .end()
            .await
            .map_err(|e| map_error("Failed to finish insert", e))?;

        debug!(id = %row.id, sensor_id = %row.sensor_id, "Inserted reading into ClickHouse");
        Ok(())
    }
}

#[async_trait]
impl StructuredStore for ClickHouseClient {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()> {
        self.insert_row(&ReadingRow::from(reading)).await
    }
}
