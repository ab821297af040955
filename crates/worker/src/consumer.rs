//! Per-topic-group consumer loop.
//!
//! Each subscription is driven by one [`TopicConsumer`]:
//! 1. Fetch up to `batch_size` messages (redeliveries first)
//! 2. Route each message through the [`EventRouter`]
//! 3. Ack, or nak for redelivery
//! 4. Repeat until cancelled
//!
//! Cancellation is only observed between batches, so a batch that has
//! started is always settled.

use crate::router::EventRouter;
use redpanda::{BusConfig, BusMessage, MessageSource, NakOutcome};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consumer loop settings.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub batch_size: usize,
    pub fetch_wait: Duration,
    /// Pause after a failed fetch before reconnecting
    pub reconnect_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from(&BusConfig::default())
    }
}

impl From<&BusConfig> for ConsumerSettings {
    fn from(config: &BusConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            fetch_wait: config.fetch_wait(),
            reconnect_backoff: config.reconnect_backoff(),
        }
    }
}

/// Progress counters shared between a running consumer and the supervisor.
#[derive(Debug, Default)]
pub struct WorkerProgress {
    processed: AtomicU64,
    committed_offset: AtomicI64,
    pending_redeliveries: AtomicU64,
}

impl WorkerProgress {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn committed_offset(&self) -> i64 {
        self.committed_offset.load(Ordering::Relaxed)
    }

    pub fn pending_redeliveries(&self) -> u64 {
        self.pending_redeliveries.load(Ordering::Relaxed)
    }

    fn record(&self, source: &dyn MessageSource) {
        self.committed_offset
            .store(source.committed_offset(), Ordering::Relaxed);
        self.pending_redeliveries
            .store(source.pending_redeliveries() as u64, Ordering::Relaxed);
    }
}

/// Drives one subscription.
pub struct TopicConsumer {
    source: Box<dyn MessageSource>,
    router: Arc<EventRouter>,
    settings: ConsumerSettings,
    progress: Arc<WorkerProgress>,
}

impl TopicConsumer {
    pub fn new(
        source: Box<dyn MessageSource>,
        router: Arc<EventRouter>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            source,
            router,
            settings,
            progress: Arc::new(WorkerProgress::default()),
        }
    }

    pub fn progress(&self) -> Arc<WorkerProgress> {
        self.progress.clone()
    }

    /// Main run loop - fetch, route, settle.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let group = self.source.group().name.clone();
        info!(
            group = %group,
            topic = %self.source.group().topic,
            batch_size = self.settings.batch_size,
            "Topic consumer starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let fetched = tokio::select! {
                _ = shutdown.cancelled() => break,
                fetched = self.source.fetch(self.settings.batch_size, self.settings.fetch_wait) => fetched,
            };

            match fetched {
                Ok(batch) => {
                    if !batch.is_empty() {
                        let count = batch.len();
                        self.process_batch(batch).await;
                        debug!(group = %group, count, "Processed batch");
                    }
                }
                Err(e) => {
                    error!(group = %group, error = %e, "Fetch failed");
                    metrics().fetch_errors.inc();

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.reconnect_backoff) => {}
                    }
                    self.source.reset().await;
                }
            }
        }

        info!(
            group = %group,
            processed = self.progress.processed(),
            committed_offset = self.source.committed_offset(),
            "Topic consumer stopped"
        );
    }

    async fn process_batch(&mut self, batch: Vec<BusMessage>) {
        for message in batch {
            self.process_message(&message).await;
            self.progress.processed.fetch_add(1, Ordering::Relaxed);
        }
        self.progress.record(&*self.source);
    }

    async fn process_message(&mut self, message: &BusMessage) {
        let m = metrics();
        m.messages_fetched.inc();
        if message.is_redelivery() {
            m.messages_redelivered.inc();
        }

        let disposition = self.router.route(&message.subject, &message.payload).await;
        debug!(
            subject = %message.subject,
            offset = message.offset,
            delivery = message.delivery_count,
            disposition = disposition.as_str(),
            "Message routed"
        );

        if disposition.should_ack() {
            match self.source.ack(message).await {
                Ok(()) => m.messages_acked.inc(),
                Err(e) => error!(offset = message.offset, error = %e, "Ack failed"),
            }
            return;
        }

        match self.source.nak(message).await {
            Ok(NakOutcome::Requeued) => m.messages_nacked.inc(),
            Ok(NakOutcome::Exhausted) => {
                m.messages_dropped_after_max_deliveries.inc();
                warn!(
                    subject = %message.subject,
                    offset = message.offset,
                    deliveries = message.delivery_count,
                    "Message dropped after reaching the delivery limit"
                );
            }
            Ok(NakOutcome::Unknown) => {
                warn!(offset = message.offset, "Nak for message that was not in flight");
            }
            Err(e) => error!(offset = message.offset, error = %e, "Nak failed"),
        }
    }
}
