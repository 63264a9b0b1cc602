//! Storage fan-out: structured store first, then the document store.

use crate::retry::retry;
use pipeline_core::{DocumentStore, EnrichedReading, Result, RetryPolicy, StructuredStore};
use telemetry::metrics;
use tracing::{debug, error};

/// Persists enriched readings to both stores, each under its own policy.
///
/// The document write only happens after the structured write succeeded.
/// A failed document write leaves the structured row in place.
#[derive(Debug, Clone, Default)]
pub struct StorageFanout {
    structured_policy: RetryPolicy,
    document_policy: RetryPolicy,
}

impl StorageFanout {
    pub fn new(structured_policy: RetryPolicy, document_policy: RetryPolicy) -> Self {
        Self {
            structured_policy,
            document_policy,
        }
    }

    pub async fn persist(
        &self,
        structured: &dyn StructuredStore,
        documents: &dyn DocumentStore,
        reading: &EnrichedReading,
    ) -> Result<()> {
        let m = metrics();

        let written = retry(&self.structured_policy, "structured_store.insert", || {
            structured.insert_reading(reading)
        })
        .await;
        if let Err(e) = written {
            m.structured_write_errors.inc();
            error!(
                sensor_id = %reading.sensor_id(),
                error = %e,
                "Structured store write failed"
            );
            return Err(e);
        }
        m.structured_writes.inc();

        let written = retry(&self.document_policy, "document_store.insert", || {
            documents.insert_reading(reading)
        })
        .await;
        if let Err(e) = written {
            m.document_write_errors.inc();
            error!(
                sensor_id = %reading.sensor_id(),
                error = %e,
                "Document store write failed; reading exists in structured store only"
            );
            return Err(e);
        }
        m.document_writes.inc();

        debug!(sensor_id = %reading.sensor_id(), "Reading persisted to both stores");
        Ok(())
    }
}
