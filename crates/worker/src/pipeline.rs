//! Pipeline driver.
//!
//! A single sequential loop: pop one payload, run it through validation,
//! enrichment, storage and alerting, then pop the next. Failed payloads go
//! to the dead-letter queue verbatim. The queue position is committed once a
//! payload is stored or dead-lettered.
//!
//! States:
//! - `Running`: polling the queue
//! - `Reconnecting`: a connectivity fault was seen; wait, then rebuild
//!   every backend handle
//! - `Fatal`: reconnecting cannot be attempted; the loop stops

use crate::alerts::AlertSink;
use crate::connection::ConnectionManager;
use crate::enrichment::Enricher;
use crate::storage::StorageFanout;
use chrono::Utc;
use pipeline_core::{
    evaluate_alerts, validate_reading, Backend, DocumentStore, Error, ReadingQueue, Result,
    StructuredStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use telemetry::{health, log_metrics, metrics};
use tracing::{debug, error, info, warn};

/// Longest payload prefix included in log lines.
const LOG_SNIPPET_CHARS: usize = 100;

/// Driver timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Longest single wait on the queue
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Pause before rebuilding connections after a fault
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// How often to log a metrics snapshot
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Reconnecting,
    Fatal,
}

/// What a single [`Pipeline::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing arrived within the poll timeout
    Idle,
    /// Reading stored in both stores; `alerts` alerts were generated
    Processed { alerts: usize },
    /// Payload sent to the dead-letter queue; `code` names the cause
    DeadLettered { code: &'static str },
    /// A connectivity fault moved the driver to `Reconnecting`
    ConnectionLost,
    Reconnected,
    ReconnectFailed,
    /// The driver is in `Fatal` and will not make progress
    Halted,
}

/// Validation, enrichment, storage and alerting for one payload.
pub struct ReadingProcessor {
    enricher: Enricher,
    fanout: StorageFanout,
    alert_sink: AlertSink,
}

impl ReadingProcessor {
    pub fn new(enricher: Enricher, fanout: StorageFanout) -> Self {
        Self {
            enricher,
            fanout,
            alert_sink: AlertSink::new(),
        }
    }

    /// Processes one raw payload. Returns the number of alerts generated.
    pub async fn process(
        &self,
        payload: &[u8],
        structured: &dyn StructuredStore,
        documents: &dyn DocumentStore,
    ) -> Result<usize> {
        let data: Value =
            serde_json::from_slice(payload).map_err(|e| Error::malformed(e.to_string()))?;
        let reading = validate_reading(&data)?;

        let enriched = self.enricher.enrich(reading);
        self.fanout.persist(structured, documents, &enriched).await?;

        let alerts = evaluate_alerts(&enriched, Utc::now());
        self.alert_sink.write(documents, &alerts).await;

        info!(
            sensor_id = %enriched.sensor_id(),
            sensor_type = enriched.sensor_type().as_str(),
            value = enriched.value(),
            alerts = alerts.len(),
            "Processed reading"
        );

        Ok(alerts.len())
    }
}

/// The consumer loop as an explicit state machine.
pub struct Pipeline {
    connections: ConnectionManager,
    processor: ReadingProcessor,
    config: PipelineConfig,
    state: PipelineState,
    fatal: Option<Error>,
    last_stats: Instant,
}

impl Pipeline {
    /// Creates a driver over already-established connections.
    ///
    /// If `connections` holds no handles the first step reconnects.
    pub fn new(
        connections: ConnectionManager,
        processor: ReadingProcessor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            connections,
            processor,
            config,
            state: PipelineState::Running,
            fatal: None,
            last_stats: Instant::now(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Runs until the driver reaches `Fatal`, returning the cause.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            poll_timeout_ms = self.config.poll_timeout_ms,
            reconnect_delay_ms = self.config.reconnect_delay_ms,
            "Pipeline starting"
        );

        loop {
            if self.step().await == StepOutcome::Halted {
                let cause = self
                    .fatal
                    .take()
                    .unwrap_or_else(|| Error::internal("Pipeline halted"));
                error!(error = %cause, code = cause.code(), "Pipeline stopped");
                return Err(cause);
            }

            if self.last_stats.elapsed() >= self.config.stats_interval() {
                log_metrics(&metrics().snapshot());
                self.last_stats = Instant::now();
            }
        }
    }

    /// Performs one unit of work for the current state.
    pub async fn step(&mut self) -> StepOutcome {
        match self.state {
            PipelineState::Running => self.poll_once().await,
            PipelineState::Reconnecting => self.try_reconnect().await,
            PipelineState::Fatal => StepOutcome::Halted,
        }
    }

    async fn poll_once(&mut self) -> StepOutcome {
        let Some(backends) = self.connections.backends_mut() else {
            self.state = PipelineState::Reconnecting;
            return StepOutcome::ConnectionLost;
        };

        let payload = match backends.queue.pop(self.config.poll_timeout()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return StepOutcome::Idle,
            Err(e) if e.is_connection() => {
                self.on_connection_fault(&e);
                return StepOutcome::ConnectionLost;
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "Queue error");
                tokio::time::sleep(self.config.reconnect_delay()).await;
                return StepOutcome::Idle;
            }
        };

        metrics().readings_consumed.inc();
        let started = Instant::now();

        let result = self
            .processor
            .process(&payload, backends.structured.as_ref(), backends.documents.as_ref())
            .await;

        metrics()
            .processing_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        let (outcome, fault) = match result {
            Ok(alerts) => {
                metrics().readings_processed.inc();
                let fault = commit(backends.queue.as_mut()).await.err();
                (StepOutcome::Processed { alerts }, fault)
            }
            Err(e) => {
                record_failure(&e, &payload);
                let fault = match dead_letter(backends.queue.as_mut(), &payload).await {
                    Ok(()) => commit(backends.queue.as_mut()).await.err(),
                    Err(dl) => Some(dl),
                };
                let code = e.code();
                let fault = if e.is_connection() { Some(e) } else { fault };
                (StepOutcome::DeadLettered { code }, fault)
            }
        };

        if let Some(e) = fault.filter(Error::is_connection) {
            self.on_connection_fault(&e);
        }
        outcome
    }

    async fn try_reconnect(&mut self) -> StepOutcome {
        tokio::time::sleep(self.config.reconnect_delay()).await;

        match self.connections.reconnect().await {
            Ok(()) => {
                self.state = PipelineState::Running;
                StepOutcome::Reconnected
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Reconnect cannot be attempted");
                self.state = PipelineState::Fatal;
                self.fatal = Some(e);
                StepOutcome::Halted
            }
            Err(_) => StepOutcome::ReconnectFailed,
        }
    }

    fn on_connection_fault(&mut self, e: &Error) {
        metrics().connection_faults.inc();
        let registry = health();
        match e.failed_backend() {
            Some(Backend::Queue) => registry.queue.set_unhealthy(e.to_string()),
            Some(Backend::StructuredStore) => registry.structured_store.set_unhealthy(e.to_string()),
            Some(Backend::DocumentStore) => registry.document_store.set_unhealthy(e.to_string()),
            None => {}
        }

        warn!(
            backend = e.failed_backend().map(|b| b.as_str()).unwrap_or("unknown"),
            error = %e,
            delay_ms = self.config.reconnect_delay_ms,
            "Connection lost, reconnecting"
        );
        self.state = PipelineState::Reconnecting;
    }
}

fn record_failure(e: &Error, payload: &[u8]) {
    let m = metrics();
    let data = snippet(payload);

    match e {
        Error::Malformed(_) => {
            m.malformed_payloads.inc();
            warn!(code = e.code(), error = %e, data = %data, "Malformed payload");
        }
        Error::Validation(failure) => {
            m.validation_failures.inc();
            warn!(
                code = e.code(),
                reason = %failure,
                data = %data,
                "Invalid sensor data"
            );
        }
        _ => {
            m.processing_failures.inc();
            error!(code = e.code(), error = %e, data = %data, "Failed to process reading");
        }
    }
}

/// Pushes the raw payload to the dead-letter queue.
async fn dead_letter(queue: &mut dyn ReadingQueue, payload: &[u8]) -> Result<()> {
    match queue.dead_letter(payload).await {
        Ok(()) => {
            metrics().readings_dead_lettered.inc();
            debug!(bytes = payload.len(), "Payload dead-lettered");
            Ok(())
        }
        Err(e) => {
            metrics().dead_letter_errors.inc();
            error!(error = %e, data = %snippet(payload), "Failed to dead-letter payload");
            Err(e)
        }
    }
}

/// Saves the consumer position after a reading is finished with.
async fn commit(queue: &mut dyn ReadingQueue) -> Result<()> {
    queue.commit().await.map_err(|e| {
        metrics().commit_errors.inc();
        error!(error = %e, code = e.code(), "Failed to commit offset");
        e
    })
}

/// First characters of a payload for log lines.
fn snippet(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .chars()
        .take(LOG_SNIPPET_CHARS)
        .collect()
}
