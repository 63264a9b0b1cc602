//! ClickHouse structured store for sensor readings.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod offsets;
pub mod query;
pub mod schema;

pub use client::*;
pub use config::*;
pub use insert::ReadingRow;
pub use query::*;
