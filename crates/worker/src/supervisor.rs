//! Ingestion supervisor.
//!
//! Owns one consumer task per topic group, all under a single root
//! cancellation token. Groups can be stopped and restarted individually;
//! shutdown cancels the root and waits for every consumer to settle its
//! current batch.

use crate::consumer::{ConsumerSettings, TopicConsumer, WorkerProgress};
use crate::router::EventRouter;
use analytics_core::{Error, Result};
use parking_lot::Mutex;
use redpanda::{BusConfig, SubscriptionFactory, TopicGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interval between metrics log lines; 0 disables them
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    /// Task ended without being stopped
    Finished,
}

/// Point-in-time view of one consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub group: String,
    pub topic: String,
    pub state: WorkerState,
    pub processed: u64,
    pub committed_offset: i64,
    pub pending_redeliveries: u64,
}

struct WorkerHandle {
    group: TopicGroup,
    token: CancellationToken,
    task: JoinHandle<()>,
    progress: Arc<WorkerProgress>,
}

impl WorkerHandle {
    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            group: self.group.name.clone(),
            topic: self.group.topic.clone(),
            state: if self.task.is_finished() {
                WorkerState::Finished
            } else {
                WorkerState::Running
            },
            processed: self.progress.processed(),
            committed_offset: self.progress.committed_offset(),
            pending_redeliveries: self.progress.pending_redeliveries(),
        }
    }

    async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(group = %self.group.name, error = %e, "Consumer task panicked");
        }
    }
}

/// Starts, stops and watches the per-group consumers.
pub struct IngestionSupervisor {
    factory: Arc<dyn SubscriptionFactory>,
    router: Arc<EventRouter>,
    bus: BusConfig,
    config: SupervisorConfig,
    root: CancellationToken,
    workers: Mutex<BTreeMap<String, WorkerHandle>>,
}

impl IngestionSupervisor {
    pub fn new(
        factory: Arc<dyn SubscriptionFactory>,
        router: Arc<EventRouter>,
        bus: BusConfig,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            factory,
            router,
            bus,
            config,
            root: CancellationToken::new(),
            workers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Token cancelled on [`shutdown`](Self::shutdown).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Subscribe every configured group. A group that cannot be subscribed
    /// is logged and skipped; returns how many consumers are running.
    pub async fn start_all(&self) -> usize {
        for group in self.bus.groups.clone() {
            if let Err(e) = self.start_group(group.clone()).await {
                warn!(group = %group.name, error = %e, "Failed to start consumer, skipping group");
            }
        }

        let running = self.running();
        if running == self.bus.groups.len() && running > 0 {
            health().bus.set_healthy();
        } else if running > 0 {
            health()
                .bus
                .set_unhealthy(format!("{} of {} groups subscribed", running, self.bus.groups.len()));
        } else {
            health().bus.set_unhealthy("no topic groups subscribed");
        }

        info!(running, configured = self.bus.groups.len(), "Ingestion consumers started");
        running
    }

    /// Subscribe one group and spawn its consumer. No-op if it is already
    /// running.
    pub async fn start_group(&self, group: TopicGroup) -> Result<()> {
        if self.root.is_cancelled() {
            return Err(Error::internal("supervisor is shut down"));
        }
        if self.is_running(&group.name) {
            return Ok(());
        }

        let source = self
            .factory
            .subscribe(&group, self.bus.max_redeliveries)
            .await?;
        let consumer = TopicConsumer::new(
            source,
            self.router.clone(),
            ConsumerSettings::from(&self.bus),
        );
        let progress = consumer.progress();
        let token = self.root.child_token();
        let task = tokio::spawn(consumer.run(token.clone()));

        let previous = self.workers.lock().insert(
            group.name.clone(),
            WorkerHandle {
                group,
                token,
                task,
                progress,
            },
        );
        if let Some(previous) = previous {
            previous.stop().await;
        }

        self.update_gauge();
        Ok(())
    }

    /// Cancel one group's consumer and wait for it to finish its batch.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let handle = self
            .workers
            .lock()
            .remove(name)
            .ok_or_else(|| Error::config(format!("unknown topic group: {}", name)))?;

        handle.stop().await;
        self.update_gauge();
        info!(group = name, "Consumer stopped");
        Ok(())
    }

    /// Stop (if running) and resubscribe a configured group.
    pub async fn restart(&self, name: &str) -> Result<()> {
        let group = self
            .bus
            .groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
            .ok_or_else(|| Error::config(format!("unknown topic group: {}", name)))?;

        let existing = self.workers.lock().remove(name);
        if let Some(handle) = existing {
            handle.stop().await;
        }

        self.start_group(group).await?;
        info!(group = name, "Consumer restarted");
        Ok(())
    }

    pub fn status(&self) -> Vec<WorkerStatus> {
        self.workers.lock().values().map(WorkerHandle::status).collect()
    }

    fn is_running(&self, name: &str) -> bool {
        self.workers
            .lock()
            .get(name)
            .is_some_and(|h| !h.task.is_finished())
    }

    fn running(&self) -> usize {
        self.workers
            .lock()
            .values()
            .filter(|h| !h.task.is_finished())
            .count()
    }

    fn update_gauge(&self) {
        metrics().active_subscriptions.set(self.running() as u64);
    }

    /// Log a metrics snapshot every `metrics_log_interval_secs` until
    /// shutdown. Returns `None` when disabled.
    pub fn spawn_metrics_logger(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.metrics_log_interval_secs == 0 {
            return None;
        }

        let supervisor = self.clone();
        let period = Duration::from_secs(self.config.metrics_log_interval_secs);
        Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = supervisor.root.cancelled() => break,
                    _ = ticker.tick() => supervisor.log_metrics(),
                }
            }
        }))
    }

    fn log_metrics(&self) {
        let s = metrics().snapshot();
        info!(
            fetched = s.messages_fetched,
            acked = s.messages_acked,
            nacked = s.messages_nacked,
            redelivered = s.messages_redelivered,
            dropped = s.messages_dropped_after_max_deliveries,
            applied = s.events_applied,
            ignored = s.events_ignored,
            decode_errors = s.decode_errors,
            persistence_errors = s.persistence_errors,
            fetch_errors = s.fetch_errors,
            queries = s.queries_served,
            query_errors = s.query_errors,
            write_latency_mean_ms = s.store_write_latency_mean_ms,
            query_latency_mean_ms = s.query_latency_mean_ms,
            active_subscriptions = s.active_subscriptions,
            "Pipeline metrics"
        );

        for status in self.status() {
            info!(
                group = %status.group,
                state = ?status.state,
                processed = status.processed,
                committed_offset = status.committed_offset,
                pending_redeliveries = status.pending_redeliveries,
                "Consumer progress"
            );
        }
    }

    /// Cancel everything and wait for all consumers to stop.
    pub async fn shutdown(&self) {
        info!("Shutting down ingestion consumers");
        self.root.cancel();

        let handles: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock();
            std::mem::take(&mut *workers).into_values().collect()
        };
        for handle in handles {
            handle.stop().await;
        }

        metrics().active_subscriptions.set(0);
        health().bus.set_unhealthy("consumers stopped");
        info!("Ingestion consumers stopped");
    }
}
