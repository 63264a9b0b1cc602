//! Processing stages and the driver loop.
//!
//! - Enrichment (weather annotation, processing timestamp)
//! - Storage fan-out (ClickHouse then MongoDB, each retried)
//! - Alert sink (best-effort MongoDB writes)
//! - Connection manager (establish / re-establish backends)
//! - Pipeline driver (Redpanda → stores, dead-lettering failures)

pub mod alerts;
pub mod connection;
pub mod enrichment;
pub mod pipeline;
pub mod retry;
pub mod storage;

pub use alerts::AlertSink;
pub use connection::*;
pub use enrichment::*;
pub use pipeline::*;
pub use retry::retry;
pub use storage::StorageFanout;
