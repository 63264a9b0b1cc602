//! Redpanda reading queue and dead-letter queue for the field telemetry pipeline.

pub mod config;
pub mod health;
pub mod queue;

pub use config::*;
pub use queue::*;
