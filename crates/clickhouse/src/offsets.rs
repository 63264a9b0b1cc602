//! Consumer offsets saved in ClickHouse.

use crate::client::{map_error, ClickHouseClient};
use crate::schema::OFFSETS_TABLE;
use async_trait::async_trait;
use clickhouse::Row;
use pipeline_core::{OffsetStore, Result};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Row, Serialize)]
struct OffsetRow {
    topic: String,
    partition_id: i32,
    next_offset: i64,
}

impl ClickHouseClient {
    /// Unmerged parts may still hold older rows, so take the highest.
    fn latest_offset_sql(&self) -> String {
        format!(
            "SELECT next_offset FROM {} WHERE topic = ? AND partition_id = ? \
             ORDER BY next_offset DESC LIMIT 1",
            self.table(OFFSETS_TABLE)
        )
    }
}

#[async_trait]
impl OffsetStore for ClickHouseClient {
    async fn load_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        let sql = self.latest_offset_sql();
        self.inner()
            .query(&sql)
            .bind(topic)
            .bind(partition)
            .fetch_optional::<i64>()
            .await
            .map_err(|e| map_error("Failed to load offset", e))
    }

    async fn save_offset(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()> {
        let row = OffsetRow {
            topic: topic.to_string(),
            partition_id: partition,
            next_offset,
        };

        let mut insert = self
            .inner()
            .insert(OFFSETS_TABLE)
            .map_err(|e| map_error("Failed to start offset insert", e))?;
        insert
            .write(&row)
            .await
            .map_err(|e| map_error("Failed to write offset", e))?;
        insert
            .end()
            .await
            .map_err(|e| map_error("Failed to finish offset insert", e))?;

        debug!(topic = topic, partition = partition, next_offset = next_offset, "Saved offset");
        Ok(())
    }
}
