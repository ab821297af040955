//! In-memory pipeline metrics.
//!
//! Everything is a relaxed atomic; readers take a [`MetricsSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 30s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds. Values past the last bound land in
    /// the last bucket.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// `(upper bound ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Pipeline metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Bus consumer
    pub messages_fetched: Counter,
    pub messages_acked: Counter,
    pub messages_nacked: Counter,
    pub messages_redelivered: Counter,
    pub messages_dropped_after_max_deliveries: Counter,
    pub fetch_errors: Counter,

    // Routing and denormalization
    pub events_applied: Counter,
    pub events_ignored: Counter,
    pub decode_errors: Counter,
    pub persistence_errors: Counter,
    pub schedule_entries_applied: Counter,

    // Queries
    pub queries_served: Counter,
    pub query_errors: Counter,

    // Latency histograms
    pub store_write_latency_ms: Histogram,
    pub query_latency_ms: Histogram,

    // Gauges
    pub active_subscriptions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_fetched: u64,
    pub messages_acked: u64,
    pub messages_nacked: u64,
    pub messages_redelivered: u64,
    pub messages_dropped_after_max_deliveries: u64,
    pub fetch_errors: u64,
    pub events_applied: u64,
    pub events_ignored: u64,
    pub decode_errors: u64,
    pub persistence_errors: u64,
    pub schedule_entries_applied: u64,
    pub queries_served: u64,
    pub query_errors: u64,
    pub store_write_latency_mean_ms: f64,
    pub query_latency_mean_ms: f64,
    pub active_subscriptions: u64,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_fetched: self.messages_fetched.get(),
            messages_acked: self.messages_acked.get(),
            messages_nacked: self.messages_nacked.get(),
            messages_redelivered: self.messages_redelivered.get(),
            messages_dropped_after_max_deliveries: self
                .messages_dropped_after_max_deliveries
                .get(),
            fetch_errors: self.fetch_errors.get(),
            events_applied: self.events_applied.get(),
            events_ignored: self.events_ignored.get(),
            decode_errors: self.decode_errors.get(),
            persistence_errors: self.persistence_errors.get(),
            schedule_entries_applied: self.schedule_entries_applied.get(),
            queries_served: self.queries_served.get(),
            query_errors: self.query_errors.get(),
            store_write_latency_mean_ms: self.store_write_latency_ms.mean(),
            query_latency_mean_ms: self.query_latency_ms.mean(),
            active_subscriptions: self.active_subscriptions.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
