//! Pull subscriptions over Redpanda.
//!
//! Uses rskafka with:
//! - One partition client per topic group
//! - In-memory offsets with application-level redelivery ([`DeliveryTracker`])
//! - Subject filtering from the `subject` record header (record key as fallback)

use crate::config::{BusConfig, StartFrom};
use crate::delivery::{BusMessage, DeliveryTracker, NakOutcome};
use crate::topics::{SubjectPattern, TopicGroup};
use analytics_core::{Error, Result};
use async_trait::async_trait;
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    Client, ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::RecordAndOffset;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Record header carrying the event subject.
pub const SUBJECT_HEADER: &str = "subject";

/// A durable pull subscription for one topic group.
#[async_trait]
pub trait MessageSource: Send {
    fn group(&self) -> &TopicGroup;

    /// Up to `max` messages; redeliveries first. An empty result after
    /// `wait` is not an error.
    async fn fetch(&mut self, max: usize, wait: Duration) -> Result<Vec<BusMessage>>;

    async fn ack(&mut self, message: &BusMessage) -> Result<()>;

    /// Ask for redelivery. Reports whether the delivery budget is spent.
    async fn nak(&mut self, message: &BusMessage) -> Result<NakOutcome>;

    /// Drop the connection so the next fetch reconnects.
    async fn reset(&mut self);

    fn committed_offset(&self) -> i64;

    fn pending_redeliveries(&self) -> usize;
}

/// Opens subscriptions.
#[async_trait]
pub trait SubscriptionFactory: Send + Sync {
    async fn subscribe(
        &self,
        group: &TopicGroup,
        max_redeliveries: u32,
    ) -> Result<Box<dyn MessageSource>>;
}

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Build a connected client, with TLS and SASL when credentials are set.
pub async fn connect(config: &BusConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new(config.brokers.clone());

    if let Some((username, password)) = config.credentials() {
        builder = builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.to_string(),
                password.to_string(),
            )));
    }

    builder.build().await.map_err(|e| {
        Error::connection(format!(
            "failed to connect to {}: {}",
            config.broker_string(),
            e
        ))
    })
}

async fn open_partition(config: &BusConfig, topic: &str) -> Result<Arc<PartitionClient>> {
    let client = connect(config).await?;
    let partition = client
        .partition_client(topic.to_string(), config.partition, UnknownTopicHandling::Retry)
        .await
        .map_err(|e| {
            Error::connection(format!("failed to open partition client for {}: {}", topic, e))
        })?;
    Ok(Arc::new(partition))
}

/// Subject of a record: the `subject` header, else the key.
pub fn record_subject(record: &RecordAndOffset) -> Option<String> {
    record
        .record
        .headers
        .get(SUBJECT_HEADER)
        .or(record.record.key.as_ref())
        .and_then(|raw| String::from_utf8(raw.clone()).ok())
        .filter(|s| !s.is_empty())
}

/// Opens rskafka-backed subscriptions.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    config: BusConfig,
}

impl KafkaConnector {
    pub fn new(config: BusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

#[async_trait]
impl SubscriptionFactory for KafkaConnector {
    async fn subscribe(
        &self,
        group: &TopicGroup,
        max_redeliveries: u32,
    ) -> Result<Box<dyn MessageSource>> {
        let subscription = KafkaSubscription::open(self.config.clone(), group.clone(), max_redeliveries).await?;
        Ok(Box::new(subscription))
    }
}

/// Pull subscription on one topic partition.
pub struct KafkaSubscription {
    config: BusConfig,
    group: TopicGroup,
    pattern: SubjectPattern,
    partition: Option<Arc<PartitionClient>>,
    tracker: DeliveryTracker,
}

impl KafkaSubscription {
    pub async fn open(config: BusConfig, group: TopicGroup, max_redeliveries: u32) -> Result<Self> {
        let pattern = group.pattern()?;
        let partition = open_partition(&config, &group.topic).await?;

        let at = match config.start_from {
            StartFrom::Earliest => OffsetAt::Earliest,
            StartFrom::Latest => OffsetAt::Latest,
        };
        let start = partition.get_offset(at).await.map_err(|e| {
            Error::connection(format!("failed to resolve start offset for {}: {}", group.topic, e))
        })?;

        info!(
            group = %group.name,
            topic = %group.topic,
            pattern = %group.subject_pattern,
            offset = start,
            max_redeliveries,
            "Subscription opened"
        );

        Ok(Self {
            config,
            group,
            pattern,
            partition: Some(partition),
            tracker: DeliveryTracker::new(start, max_redeliveries),
        })
    }

    async fn ensure_connected(&mut self) -> Result<Arc<PartitionClient>> {
        if let Some(partition) = &self.partition {
            return Ok(partition.clone());
        }
        let partition = open_partition(&self.config, &self.group.topic).await?;
        info!(group = %self.group.name, "Subscription reconnected");
        self.partition = Some(partition.clone());
        Ok(partition)
    }
}

#[async_trait]
impl MessageSource for KafkaSubscription {
    fn group(&self) -> &TopicGroup {
        &self.group
    }

    async fn fetch(&mut self, max: usize, wait: Duration) -> Result<Vec<BusMessage>> {
        let redeliveries = self.tracker.take_redeliveries(max);
        if !redeliveries.is_empty() {
            return Ok(redeliveries);
        }

        let partition = self.ensure_connected().await?;
        let cursor = self.tracker.cursor();
        let wait_ms = i32::try_from(wait.as_millis()).unwrap_or(i32::MAX);

        let (records, high_watermark) = partition
            .fetch_records(cursor, 1..self.config.max_fetch_bytes, wait_ms)
            .await
            .map_err(|e| Error::connection(format!("fetch from {} failed: {}", self.group.topic, e)))?;

        let mut messages = Vec::with_capacity(max.min(records.len()));
        for record in records {
            if messages.len() >= max {
                break;
            }
            if record.offset < cursor {
                continue;
            }

            let subject = record_subject(&record);
            match subject {
                Some(subject) if self.pattern.matches(&subject) => {
                    let payload = record.record.value.unwrap_or_default();
                    messages.push(self.tracker.deliver(BusMessage::new(subject, payload, record.offset)));
                }
                other => {
                    debug!(
                        group = %self.group.name,
                        offset = record.offset,
                        subject = ?other,
                        "Skipping record outside subject pattern"
                    );
                    self.tracker.skip(record.offset);
                }
            }
        }

        if !messages.is_empty() {
            debug!(
                group = %self.group.name,
                count = messages.len(),
                cursor = self.tracker.cursor(),
                high_watermark,
                "Fetched messages"
            );
        }
        Ok(messages)
    }

    async fn ack(&mut self, message: &BusMessage) -> Result<()> {
        if !self.tracker.ack(message.offset) {
            warn!(group = %self.group.name, offset = message.offset, "Ack for unknown message");
        }
        Ok(())
    }

    async fn nak(&mut self, message: &BusMessage) -> Result<NakOutcome> {
        Ok(self.tracker.nak(message.offset))
    }

    async fn reset(&mut self) {
        self.partition = None;
        info!(group = %self.group.name, "Subscription connection reset");
    }

    fn committed_offset(&self) -> i64 {
        self.tracker.committed_offset()
    }

    fn pending_redeliveries(&self) -> usize {
        self.tracker.pending_redeliveries()
    }
}
