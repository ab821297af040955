//! Message bus configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::topics::{default_groups, TopicGroup};

/// Where a fresh subscription starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFrom {
    /// Replay everything retained on the topic
    #[default]
    Earliest,
    /// Only records produced after subscribing
    Latest,
}

/// Bus consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Whether ingestion runs at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// SASL username (enables TLS + SCRAM-SHA-256 together with the password)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Maximum messages handed to the router per fetch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long a fetch waits for records, in milliseconds
    #[serde(default = "default_fetch_wait_ms")]
    pub fetch_wait_ms: u64,
    /// Upper bound of bytes requested per fetch
    #[serde(default = "default_max_fetch_bytes")]
    pub max_fetch_bytes: i32,
    /// Deliveries per message, first one included, before it is dropped
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    /// Pause after a failed fetch, in milliseconds
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Partition read by every subscription
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub start_from: StartFrom,
    /// Topic groups to subscribe
    #[serde(default = "default_groups")]
    pub groups: Vec<TopicGroup>,
}

fn default_enabled() -> bool {
    true
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_batch_size() -> usize {
    10
}

fn default_fetch_wait_ms() -> u64 {
    2000
}

fn default_max_fetch_bytes() -> i32 {
    1024 * 1024
}

fn default_max_redeliveries() -> u32 {
    5
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            brokers: default_brokers(),
            sasl_username: None,
            sasl_password: None,
            batch_size: default_batch_size(),
            fetch_wait_ms: default_fetch_wait_ms(),
            max_fetch_bytes: default_max_fetch_bytes(),
            max_redeliveries: default_max_redeliveries(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            partition: 0,
            start_from: StartFrom::default(),
            groups: default_groups(),
        }
    }
}

impl BusConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Ingestion can run: enabled and at least one non-empty broker address.
    pub fn is_active(&self) -> bool {
        self.enabled && self.brokers.iter().any(|b| !b.trim().is_empty())
    }

    /// SASL credentials, if both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn fetch_wait(&self) -> Duration {
        Duration::from_millis(self.fetch_wait_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
