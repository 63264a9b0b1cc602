//! Internal telemetry for the field telemetry pipeline.
//!
//! Metrics and backend health live in process and are surfaced through
//! structured log lines.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
