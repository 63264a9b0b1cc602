//! MongoDB document store for enriched readings and alerts.

pub mod client;
pub mod config;

pub use client::*;
pub use config::*;
