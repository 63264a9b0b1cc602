//! Unified error types for the telemetry pipeline.
//!
//! Error codes are stable and appear in log lines so operators can group
//! dead-lettered payloads by cause:
//! - PARSE_001: payload is not structured data
//! - VALID_001: payload violates a reading rule
//! - CONN_001: backend connectivity lost
//! - STORE_001 / QUEUE_001: transient backend failures
//! - RETRY_001: local retry policy exhausted
//! - START_001: startup connection establishment exhausted

use thiserror::Error;

use crate::validation::ValidationFailure;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Backend a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Queue,
    StructuredStore,
    DocumentStore,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::StructuredStore => "structured_store",
            Self::DocumentStore => "document_store",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload did not parse as structured data.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Payload parsed but broke a reading rule.
    #[error("invalid sensor data: {0}")]
    Validation(#[from] ValidationFailure),

    /// Connectivity to a backend was lost or never established.
    #[error("{backend} connection lost: {message}")]
    Connection { backend: Backend, message: String },

    /// A store operation failed in a way worth retrying.
    #[error("{backend} operation failed: {message}")]
    Store { backend: Backend, message: String },

    /// A queue operation failed without losing the connection.
    #[error("queue operation failed: {0}")]
    Queue(String),

    /// A retry policy ran out of attempts.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Backends could not be established at process start.
    #[error("startup failed: {0}")]
    Startup(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn connection(backend: Backend, msg: impl Into<String>) -> Self {
        Self::Connection {
            backend,
            message: msg.into(),
        }
    }

    pub fn store(backend: Backend, msg: impl Into<String>) -> Self {
        Self::Store {
            backend,
            message: msg.into(),
        }
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means a backend connection is gone.
    ///
    /// Looks through `RetryExhausted` so a store write that exhausted its
    /// retries on connectivity failures still triggers a reconnect.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::RetryExhausted { source, .. } => source.is_connection(),
            _ => false,
        }
    }

    /// The backend whose connection failed, if any.
    pub fn failed_backend(&self) -> Option<Backend> {
        match self {
            Self::Connection { backend, .. } => Some(*backend),
            Self::RetryExhausted { source, .. } => source.failed_backend(),
            _ => None,
        }
    }

    /// Failures that retrying can never fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::Validation(_) | Self::Serialization(_)
        )
    }

    /// Failures that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup(_) | Self::Config(_))
    }

    /// Stable error code for log grouping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) | Self::Serialization(_) => "PARSE_001",
            Self::Validation(_) => "VALID_001",
            Self::Connection { .. } => "CONN_001",
            Self::Store { .. } => "STORE_001",
            Self::Queue(_) => "QUEUE_001",
            Self::RetryExhausted { .. } => "RETRY_001",
            Self::Startup(_) => "START_001",
            Self::Config(_) => "CONFIG_001",
            Self::Internal(_) => "INTERNAL_001",
        }
    }
}
