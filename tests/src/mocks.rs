//! In-memory backends for testing.
//!
//! Each mock is a cheap handle over shared state: the connector hands a
//! clone to the pipeline while the test keeps another to inspect what was
//! written and to inject failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline_core::{
    Alert, Backend, DocumentStore, EnrichedReading, Error, ReadingQueue, Result, StructuredStore,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use worker::{Backends, Connector};

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Operation fails but the connection is fine
    Transient,
    /// Connection to the backend is gone
    Connection,
    /// Backend is misconfigured; only meaningful for connectors
    Config,
}

impl Fault {
    fn into_error(self, backend: Backend) -> Error {
        match self {
            Fault::Transient => Error::store(backend, "injected failure"),
            Fault::Connection => Error::connection(backend, "injected connection loss"),
            Fault::Config => Error::config("injected configuration error"),
        }
    }
}

/// Failure schedule for one operation.
#[derive(Debug, Default)]
pub struct FaultPlan {
    fault: Option<Fault>,
    /// `None` fails forever
    remaining: Option<u32>,
}

impl FaultPlan {
    pub fn fail_always(&mut self, fault: Fault) {
        self.fault = Some(fault);
        self.remaining = None;
    }

    pub fn fail_times(&mut self, times: u32, fault: Fault) {
        self.fault = Some(fault);
        self.remaining = Some(times);
    }

    pub fn heal(&mut self) {
        self.fault = None;
        self.remaining = None;
    }

    /// Consumes one scheduled failure, if any.
    fn check(&mut self, backend: Backend) -> Result<()> {
        let Some(fault) = self.fault else {
            return Ok(());
        };

        match self.remaining {
            Some(0) => {
                self.heal();
                Ok(())
            }
            Some(n) => {
                self.remaining = Some(n - 1);
                Err(fault.into_error(backend))
            }
            None => Err(fault.into_error(backend)),
        }
    }
}

#[derive(Default)]
struct QueueState {
    inbound: VecDeque<Vec<u8>>,
    dead_letters: Vec<Vec<u8>>,
    commits: u32,
    pop_faults: FaultPlan,
    dead_letter_faults: FaultPlan,
    commit_faults: FaultPlan,
}

/// Mock queue with a dead-letter list.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw payload to the inbound list.
    pub fn push(&self, payload: impl Into<Vec<u8>>) {
        self.state.lock().inbound.push_back(payload.into());
    }

    pub fn pending(&self) -> usize {
        self.state.lock().inbound.len()
    }

    pub fn dead_letters(&self) -> Vec<Vec<u8>> {
        self.state.lock().dead_letters.clone()
    }

    /// Successful commits so far.
    pub fn commits(&self) -> u32 {
        self.state.lock().commits
    }

    pub fn fail_pops(&self, times: u32, fault: Fault) {
        self.state.lock().pop_faults.fail_times(times, fault);
    }

    pub fn fail_dead_letters(&self, fault: Fault) {
        self.state.lock().dead_letter_faults.fail_always(fault);
    }

    pub fn fail_commits(&self, fault: Fault) {
        self.state.lock().commit_faults.fail_always(fault);
    }
}

#[async_trait]
impl ReadingQueue for MemoryQueue {
    async fn pop(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        state.pop_faults.check(Backend::Queue)?;
        Ok(state.inbound.pop_front())
    }

    async fn dead_letter(&mut self, payload: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.dead_letter_faults.check(Backend::Queue)?;
        state.dead_letters.push(payload.to_vec());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.commit_faults.check(Backend::Queue)?;
        state.commits += 1;
        Ok(())
    }
}

#[derive(Default)]
struct StructuredState {
    rows: Vec<EnrichedReading>,
    attempts: u32,
    faults: FaultPlan,
}

/// Mock structured store recording every insert attempt.
#[derive(Clone, Default)]
pub struct MemoryStructuredStore {
    state: Arc<Mutex<StructuredState>>,
}

impl MemoryStructuredStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<EnrichedReading> {
        self.state.lock().rows.clone()
    }

    /// Insert calls made, successful or not.
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    pub fn fail_always(&self, fault: Fault) {
        self.state.lock().faults.fail_always(fault);
    }

    pub fn fail_times(&self, times: u32, fault: Fault) {
        self.state.lock().faults.fail_times(times, fault);
    }

    pub fn heal(&self) {
        self.state.lock().faults.heal();
    }
}

#[async_trait]
impl StructuredStore for MemoryStructuredStore {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()> {
        let mut state = self.state.lock();
        state.attempts += 1;
        state.faults.check(Backend::StructuredStore)?;
        state.rows.push(reading.clone());
        Ok(())
    }
}

#[derive(Default)]
struct DocumentState {
    readings: Vec<EnrichedReading>,
    alerts: Vec<Alert>,
    reading_attempts: u32,
    reading_faults: FaultPlan,
    alert_faults: FaultPlan,
}

/// Mock document store with separate reading and alert collections.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<DocumentState>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<EnrichedReading> {
        self.state.lock().readings.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().alerts.clone()
    }

    pub fn reading_attempts(&self) -> u32 {
        self.state.lock().reading_attempts
    }

    pub fn fail_readings(&self, fault: Fault) {
        self.state.lock().reading_faults.fail_always(fault);
    }

    pub fn fail_alerts(&self, fault: Fault) {
        self.state.lock().alert_faults.fail_always(fault);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_reading(&self, reading: &EnrichedReading) -> Result<()> {
        let mut state = self.state.lock();
        state.reading_attempts += 1;
        state.reading_faults.check(Backend::DocumentStore)?;
        state.readings.push(reading.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut state = self.state.lock();
        state.alert_faults.check(Backend::DocumentStore)?;
        state.alerts.push(alert.clone());
        Ok(())
    }
}

/// Connector handing out the shared in-memory backends.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub queue: MemoryQueue,
    pub structured: MemoryStructuredStore,
    pub documents: MemoryDocumentStore,
    connects: Arc<AtomicU32>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establishment attempts made, successful or not.
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_always(&self, fault: Fault) {
        self.faults.lock().fail_always(fault);
    }

    pub fn fail_times(&self, times: u32, fault: Fault) {
        self.faults.lock().fail_times(times, fault);
    }

    pub fn heal(&self) {
        self.faults.lock().heal();
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Backends> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.faults.lock().check(Backend::Queue)?;

        Ok(Backends {
            queue: Box::new(self.queue.clone()),
            structured: Box::new(self.structured.clone()),
            documents: Box::new(self.documents.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_plan_counts_down() {
        let mut plan = FaultPlan::default();
        plan.fail_times(2, Fault::Transient);

        assert!(plan.check(Backend::StructuredStore).is_err());
        assert!(plan.check(Backend::StructuredStore).is_err());
        assert!(plan.check(Backend::StructuredStore).is_ok());
        assert!(plan.check(Backend::StructuredStore).is_ok());
    }

    #[test]
    fn test_connection_fault_classification() {
        let mut plan = FaultPlan::default();
        plan.fail_always(Fault::Connection);

        let err = plan.check(Backend::DocumentStore).unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.failed_backend(), Some(Backend::DocumentStore));
    }

    #[tokio::test]
    async fn test_queue_fifo() {
        let mut queue = MemoryQueue::new();
        queue.push("a");
        queue.push("b");

        let timeout = Duration::from_millis(1);
        assert_eq!(queue.pop(timeout).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(queue.pop(timeout).await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(queue.pop(timeout).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_counts_commits() {
        let mut queue = MemoryQueue::new();
        queue.commit().await.unwrap();
        assert_eq!(queue.commits(), 1);

        queue.fail_commits(Fault::Connection);
        assert!(queue.commit().await.unwrap_err().is_connection());
        assert_eq!(queue.commits(), 1);
    }
}
