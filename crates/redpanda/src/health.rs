//! Bus health checks.

use crate::config::BusConfig;
use crate::consumer::connect;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Topics from `topics` that the brokers do not know about. Everything is
/// reported missing when the brokers cannot be reached.
pub async fn missing_topics(config: &BusConfig, topics: &[String]) -> Vec<String> {
    let client = match connect(config).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, brokers = %config.broker_string(), "Bus unreachable during topic check");
            return topics.to_vec();
        }
    };

    let existing = match client.list_topics().await {
        Ok(existing) => existing,
        Err(e) => {
            warn!(error = %e, "Failed to list bus topics");
            return topics.to_vec();
        }
    };
    debug!(topics = existing.len(), "Bus metadata fetched");

    let known: HashSet<&str> = existing.iter().map(|t| t.name.as_str()).collect();
    topics
        .iter()
        .filter(|t| !known.contains(t.as_str()))
        .cloned()
        .collect()
}
