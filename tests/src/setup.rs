//! Common test setup functions.

use pipeline_core::{RetryPolicy, WeatherCondition};
use std::sync::Arc;
use worker::{
    ConnectionManager, Enricher, FixedWeather, Pipeline, PipelineConfig, ReadingProcessor,
    StorageFanout,
};

use crate::mocks::{MemoryDocumentStore, MemoryQueue, MemoryStructuredStore, MockConnector};

/// Attempts per store write and per connection establishment in tests.
pub const TEST_ATTEMPTS: u32 = 3;

/// Driver timings with every wait removed.
pub fn instant_config() -> PipelineConfig {
    PipelineConfig {
        poll_timeout_ms: 0,
        reconnect_delay_ms: 0,
        stats_interval_secs: 3600,
    }
}

/// Connection manager over `connector` with a no-wait retry policy.
pub fn connection_manager(connector: &MockConnector) -> ConnectionManager {
    ConnectionManager::new(
        Box::new(connector.clone()),
        RetryPolicy::immediate(TEST_ATTEMPTS),
    )
}

/// Processing stages with sunny weather and no-wait store retries.
pub fn processor() -> ReadingProcessor {
    ReadingProcessor::new(
        Enricher::new(Arc::new(FixedWeather(WeatherCondition::Sunny))),
        StorageFanout::new(
            RetryPolicy::immediate(TEST_ATTEMPTS),
            RetryPolicy::immediate(TEST_ATTEMPTS),
        ),
    )
}

/// Pipeline wired to in-memory backends.
///
/// Retries never sleep and the weather is always sunny, so every run is
/// deterministic.
pub struct TestContext {
    pub connector: MockConnector,
    pub pipeline: Pipeline,
}

impl TestContext {
    /// Create a context with connections already established.
    pub async fn new() -> Self {
        let connector = MockConnector::new();
        let mut connections = connection_manager(&connector);
        connections
            .connect()
            .await
            .expect("mock connector connects");

        Self {
            pipeline: Pipeline::new(connections, processor(), instant_config()),
            connector,
        }
    }

    pub fn queue(&self) -> &MemoryQueue {
        &self.connector.queue
    }

    pub fn structured(&self) -> &MemoryStructuredStore {
        &self.connector.structured
    }

    pub fn documents(&self) -> &MemoryDocumentStore {
        &self.connector.documents
    }
}
