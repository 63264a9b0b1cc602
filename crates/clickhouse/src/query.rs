//! Query functions for reading data back (used in tests and admin).

use crate::client::{map_error, ClickHouseClient};
use crate::schema::READINGS_TABLE;
use clickhouse::Row;
use pipeline_core::Result;
use serde::Deserialize;

/// Query result for reading verification.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct StoredReading {
    pub id: String,
    pub sensor_id: String,
    pub sensor_type: String,
    pub location: String,
    pub value: f64,
    pub timestamp: String,
    pub quality: String,
    pub battery_level: f64,
}

/// Count readings stored for a sensor.
pub async fn count_readings(client: &ClickHouseClient, sensor_id: &str) -> Result<u64> {
    let sql = format!(
        "SELECT count() FROM {} WHERE sensor_id = ?",
        client.table(READINGS_TABLE)
    );
    let count: u64 = client
        .inner()
        .query(&sql)
        .bind(sensor_id)
        .fetch_one()
        .await
        .map_err(|e| map_error("Query error", e))?;
    Ok(count)
}

/// Fetch readings for a sensor, newest first.
pub async fn query_readings(
    client: &ClickHouseClient,
    sensor_id: &str,
    limit: u32,
) -> Result<Vec<StoredReading>> {
    let sql = format!(
        "SELECT id, sensor_id, sensor_type, location, value, timestamp, quality, battery_level \
         FROM {} WHERE sensor_id = ? ORDER BY created_at DESC LIMIT ?",
        client.table(READINGS_TABLE)
    );
    let rows: Vec<StoredReading> = client
        .inner()
        .query(&sql)
        .bind(sensor_id)
        .bind(limit)
        .fetch_all()
        .await
        .map_err(|e| map_error("Query error", e))?;
    Ok(rows)
}
