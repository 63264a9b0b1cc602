//! Reading queue backed by Redpanda topics.
//!
//! Uses rskafka with:
//! - Manual offset tracking held outside the connection, so a reconnect
//!   resumes after the last record handed out
//! - Committed offsets saved to an [`OffsetStore`], so a restart resumes
//!   after the last finished reading
//! - Bounded-wait fetches (`max_wait_ms` = pop timeout)
//! - A second partition client for the dead-letter topic

use async_trait::async_trait;
use chrono::Utc;
use pipeline_core::{Backend, Error, OffsetStore, ReadingQueue, Result};
use rskafka::client::{
    error::{Error as ClientError, ProtocolError},
    partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling},
    Client, ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::RecordAndOffset;
use rskafka::record::Record;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{RedpandaConfig, StartOffset};
use crate::health::missing_topics;

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Builds a broker client, with TLS and SASL when credentials are set.
pub async fn connect_client(config: &RedpandaConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new(config.brokers.clone());

    if let Some((username, password)) = config.credentials() {
        builder = builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.to_string(),
                password.to_string(),
            )));
    }

    builder
        .build()
        .await
        .map_err(|e| {
            Error::connection(Backend::Queue, format!("Failed to connect to Redpanda: {}", e))
        })
}

/// Next offset to read, shared by every queue built from one connector.
///
/// Lives outside [`RedpandaQueue`] so a discarded connection does not take
/// the consumer position with it.
#[derive(Debug)]
pub struct QueueCursor(AtomicI64);

impl QueueCursor {
    const UNSET: i64 = -1;

    pub fn new() -> Self {
        Self(AtomicI64::new(Self::UNSET))
    }

    /// The next offset to read, if anything has been read yet.
    pub fn get(&self) -> Option<i64> {
        match self.0.load(Ordering::SeqCst) {
            Self::UNSET => None,
            offset => Some(offset),
        }
    }

    pub fn set(&self, offset: i64) {
        self.0.store(offset, Ordering::SeqCst);
    }
}

impl Default for QueueCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetched records waiting to be handed out.
///
/// Handing a record out moves the shared cursor past it, so dropping the
/// buffer with its connection never skips or repeats a payload.
pub struct FetchBuffer {
    cursor: Arc<QueueCursor>,
    records: VecDeque<(i64, Option<Vec<u8>>)>,
}

impl FetchBuffer {
    pub fn new(cursor: Arc<QueueCursor>) -> Self {
        Self {
            cursor,
            records: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Buffers a fetched batch that was requested from `requested`.
    ///
    /// Fetches may start before the requested offset when it sits mid-batch;
    /// those records were already handed out and are dropped. Returns how
    /// many records were kept.
    pub fn extend(
        &mut self,
        requested: i64,
        batch: impl IntoIterator<Item = (i64, Option<Vec<u8>>)>,
    ) -> usize {
        let before = self.records.len();
        self.records
            .extend(batch.into_iter().filter(|(offset, _)| *offset >= requested));
        self.records.len() - before
    }

    /// Hands out the next payload, skipping records without a value.
    pub fn next_payload(&mut self) -> Option<Vec<u8>> {
        while let Some((offset, value)) = self.records.pop_front() {
            self.cursor.set(offset + 1);
            match value {
                Some(payload) => return Some(payload),
                None => warn!(offset = offset, "Skipping record without a value"),
            }
        }
        None
    }

    /// Drops anything buffered and moves the cursor to `offset`.
    pub fn reposition(&mut self, offset: i64) {
        self.records.clear();
        self.cursor.set(offset);
    }
}

fn into_entry(record: RecordAndOffset) -> (i64, Option<Vec<u8>>) {
    (record.offset, record.record.value)
}

/// One live connection to the input and dead-letter topics.
pub struct RedpandaQueue {
    config: RedpandaConfig,
    input: PartitionClient,
    dead_letter: PartitionClient,
    cursor: Arc<QueueCursor>,
    buffer: FetchBuffer,
    offsets: Option<Arc<dyn OffsetStore>>,
    /// Last offset written to `offsets`
    committed: Option<i64>,
}

impl RedpandaQueue {
    /// Connects to both topics and positions the consumer.
    ///
    /// An unset cursor resumes from the offset saved in `offsets`; with
    /// nothing saved it starts at `config.start_offset`.
    pub async fn connect(
        config: RedpandaConfig,
        cursor: Arc<QueueCursor>,
        offsets: Option<Arc<dyn OffsetStore>>,
    ) -> Result<Self> {
        let client = connect_client(&config).await?;

        let topics = [config.topic.as_str(), config.dead_letter_topic.as_str()];
        let missing = missing_topics(&client, &topics).await?;
        if !missing.is_empty() {
            return Err(Error::queue(format!("Missing topics: {}", missing.join(", "))));
        }

        let input = partition_client(&client, &config.topic, config.partition).await?;
        let dead_letter =
            partition_client(&client, &config.dead_letter_topic, config.partition).await?;

        let mut committed = None;
        if cursor.get().is_none() {
            let saved = match &offsets {
                Some(store) => store.load_offset(&config.topic, config.partition).await?,
                None => None,
            };
            let offset = match saved {
                Some(offset) => {
                    committed = Some(offset);
                    offset
                }
                None => {
                    let at = match config.start_offset {
                        StartOffset::Earliest => OffsetAt::Earliest,
                        StartOffset::Latest => OffsetAt::Latest,
                    };
                    get_offset(&input, at).await?
                }
            };
            cursor.set(offset);
        }

        info!(
            topic = %config.topic,
            dead_letter_topic = %config.dead_letter_topic,
            partition = config.partition,
            offset = cursor.get().unwrap_or_default(),
            resumed = committed.is_some(),
            "Reading queue connected"
        );

        Ok(Self {
            config,
            input,
            dead_letter,
            buffer: FetchBuffer::new(cursor.clone()),
            cursor,
            offsets,
            committed,
        })
    }

    /// Fetches the next batch into the buffer; returns how many arrived.
    async fn fill(&mut self, timeout: Duration) -> Result<usize> {
        let Some(offset) = self.cursor.get() else {
            return Err(Error::internal("Queue cursor not positioned"));
        };

        let max_wait_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        let fetched = self
            .input
            .fetch_records(offset, 1..self.config.fetch_max_bytes, max_wait_ms)
            .await;

        let (records, high_watermark) = match fetched {
            Ok(fetched) => fetched,
            Err(ClientError::ServerError {
                protocol_error: ProtocolError::OffsetOutOfRange,
                ..
            }) => {
                // Retention removed everything up to and past the cursor
                let earliest = get_offset(&self.input, OffsetAt::Earliest).await?;
                warn!(
                    topic = %self.config.topic,
                    requested = offset,
                    earliest = earliest,
                    "Offset out of range, skipping to earliest retained record"
                );
                self.buffer.reposition(earliest);
                return Ok(0);
            }
            Err(e) => return Err(map_fetch_error(e)),
        };

        let count = self
            .buffer
            .extend(offset, records.into_iter().map(into_entry));

        if count > 0 {
            debug!(
                fetched = count,
                offset_start = offset,
                high_watermark = high_watermark,
                "Fetched records from Redpanda"
            );
        }

        Ok(count)
    }
}

/// Broker-reported errors will not go away by reconnecting.
fn map_fetch_error(e: ClientError) -> Error {
    match e {
        ClientError::ServerError { .. } => {
            Error::queue(format!("Broker rejected fetch: {}", e))
        }
        e => Error::connection(Backend::Queue, format!("Failed to fetch records: {}", e)),
    }
}

async fn get_offset(input: &PartitionClient, at: OffsetAt) -> Result<i64> {
    input
        .get_offset(at)
        .await
        .map_err(|e| Error::connection(Backend::Queue, format!("Failed to get offset: {}", e)))
}

async fn partition_client(client: &Client, topic: &str, partition: i32) -> Result<PartitionClient> {
    client
        .partition_client(topic.to_string(), partition, UnknownTopicHandling::Error)
        .await
        .map_err(|e| {
            Error::connection(
                Backend::Queue,
                format!("Failed to get partition client for {}: {}", topic, e),
            )
        })
}

#[async_trait]
impl ReadingQueue for RedpandaQueue {
    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if self.buffer.is_empty() {
            self.fill(timeout).await?;
        }

        Ok(self.buffer.next_payload())
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(store) = &self.offsets else {
            return Ok(());
        };
        let Some(offset) = self.cursor.get() else {
            return Ok(());
        };
        if self.committed == Some(offset) {
            return Ok(());
        }

        store
            .save_offset(&self.config.topic, self.config.partition, offset)
            .await?;
        self.committed = Some(offset);
        Ok(())
    }

    async fn dead_letter(&mut self, payload: &[u8]) -> Result<()> {
        let record = Record {
            key: None,
            value: Some(payload.to_vec()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        self.dead_letter
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(|e| {
                Error::connection(Backend::Queue, format!("Failed to produce dead letter: {}", e))
            })?;

        debug!(
            topic = %self.config.dead_letter_topic,
            bytes = payload.len(),
            "Dead-lettered payload"
        );

        Ok(())
    }
}
