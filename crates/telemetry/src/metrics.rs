//! In-process pipeline metrics.
//!
//! Lock-free counters updated on the hot path; the driver logs a snapshot
//! periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Queue
    pub readings_consumed: Counter,
    pub readings_processed: Counter,
    pub readings_dead_lettered: Counter,
    pub dead_letter_errors: Counter,
    pub commit_errors: Counter,

    // Rejections
    pub malformed_payloads: Counter,
    pub validation_failures: Counter,
    pub processing_failures: Counter,

    // Stores
    pub structured_writes: Counter,
    pub structured_write_errors: Counter,
    pub document_writes: Counter,
    pub document_write_errors: Counter,
    pub retries: Counter,

    // Alerts
    pub alerts_generated: Counter,
    pub alert_write_errors: Counter,

    // Connectivity
    pub connection_faults: Counter,
    pub reconnects: Counter,
    pub reconnect_failures: Counter,

    // Latency
    pub processing_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub readings_consumed: u64,
    pub readings_processed: u64,
    pub readings_dead_lettered: u64,
    pub dead_letter_errors: u64,
    pub commit_errors: u64,
    pub malformed_payloads: u64,
    pub validation_failures: u64,
    pub processing_failures: u64,
    pub structured_writes: u64,
    pub structured_write_errors: u64,
    pub document_writes: u64,
    pub document_write_errors: u64,
    pub retries: u64,
    pub alerts_generated: u64,
    pub alert_write_errors: u64,
    pub connection_faults: u64,
    pub reconnects: u64,
    pub reconnect_failures: u64,
    pub processing_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            readings_consumed: self.readings_consumed.get(),
            readings_processed: self.readings_processed.get(),
            readings_dead_lettered: self.readings_dead_lettered.get(),
            dead_letter_errors: self.dead_letter_errors.get(),
            commit_errors: self.commit_errors.get(),
            malformed_payloads: self.malformed_payloads.get(),
            validation_failures: self.validation_failures.get(),
            processing_failures: self.processing_failures.get(),
            structured_writes: self.structured_writes.get(),
            structured_write_errors: self.structured_write_errors.get(),
            document_writes: self.document_writes.get(),
            document_write_errors: self.document_write_errors.get(),
            retries: self.retries.get(),
            alerts_generated: self.alerts_generated.get(),
            alert_write_errors: self.alert_write_errors.get(),
            connection_faults: self.connection_faults.get(),
            reconnects: self.reconnects.get(),
            reconnect_failures: self.reconnect_failures.get(),
            processing_latency_mean_ms: self.processing_latency_ms.mean(),
        }
    }
}

/// Logs a metrics snapshot as one structured line.
pub fn log_metrics(snapshot: &MetricsSnapshot) {
    tracing::info!(
        consumed = snapshot.readings_consumed,
        processed = snapshot.readings_processed,
        dead_lettered = snapshot.readings_dead_lettered,
        malformed = snapshot.malformed_payloads,
        invalid = snapshot.validation_failures,
        structured_errors = snapshot.structured_write_errors,
        document_errors = snapshot.document_write_errors,
        alerts = snapshot.alerts_generated,
        reconnects = snapshot.reconnects,
        latency_mean_ms = snapshot.processing_latency_mean_ms,
        "Pipeline metrics"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
