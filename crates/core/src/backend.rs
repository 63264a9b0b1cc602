//! Capabilities the pipeline needs from its backends.
//!
//! Adapters live in the `redpanda`, `clickhouse-client` and `mongo-client`
//! crates; in-memory doubles live in the integration test crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::alert::Alert;
use crate::error::Result;
use crate::reading::EnrichedReading;

/// Inbound reading queue plus its dead-letter sink.
#[async_trait]
pub trait ReadingQueue: Send {
    /// Waits up to `timeout` for the next raw payload.
    ///
    /// `Ok(None)` means the wait elapsed with nothing to do.
    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Appends a raw payload, unchanged, to the dead-letter queue.
    async fn dead_letter(&mut self, payload: &[u8]) -> Result<()>;

    /// Marks every payload popped so far as finished, so a restart resumes
    /// after them.
    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Schema'd, indexed store used by the query workload.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()>;
}

/// Schema-less store for full-fidelity readings and alerts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()>;

    async fn insert_alert(&self, alert: &Alert) -> Result<()>;
}

/// Durable record of how far a queue partition has been consumed.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// The next offset to read, if one was ever saved.
    async fn load_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>>;

    async fn save_offset(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()>;
}
