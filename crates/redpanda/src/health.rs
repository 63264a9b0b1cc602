//! Redpanda topic checks.

use pipeline_core::{Backend, Error, Result};
use rskafka::client::Client;
use std::collections::HashSet;
use tracing::debug;

/// Returns the subset of `topics` the cluster does not know about.
pub async fn missing_topics(client: &Client, topics: &[&str]) -> Result<Vec<String>> {
    let existing = client.list_topics().await.map_err(|e| {
        Error::connection(Backend::Queue, format!("Failed to list topics: {}", e))
    })?;

    let existing: HashSet<_> = existing.iter().map(|t| t.name.as_str()).collect();
    debug!(topics = existing.len(), "Listed Redpanda topics");

    Ok(topics
        .iter()
        .filter(|t| !existing.contains(*t))
        .map(|t| t.to_string())
        .collect())
}
