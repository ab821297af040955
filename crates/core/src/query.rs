//! Aggregate query engine.
//!
//! A thin, stateless layer over [`AnalyticsStore`] reads. Every call runs
//! under the configured timeout; dropping the returned future cancels the
//! underlying store request.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{
    DashboardSummary, DepartmentMetric, HeatmapCell, ScheduleMetric, SemesterFilter,
    UtilizationStat, WorkloadStat, ALL_SEMESTERS,
};
use crate::store::AnalyticsStore;

/// Query engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Per-query timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Read-only aggregate queries over the materialized store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn AnalyticsStore>,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn AnalyticsStore>, config: &QueryConfig) -> Self {
        Self {
            store,
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn AnalyticsStore> {
        &self.store
    }

    pub async fn workload_stats(&self, filter: SemesterFilter) -> Result<Vec<WorkloadStat>> {
        self.run("workload_stats", self.store.workload_stats(filter))
            .await
    }

    pub async fn utilization_stats(&self, filter: SemesterFilter) -> Result<Vec<UtilizationStat>> {
        self.run("utilization_stats", self.store.utilization_stats(filter))
            .await
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        self.run("dashboard_summary", self.store.dashboard_summary())
            .await
    }

    pub async fn department_metrics(&self) -> Result<Vec<DepartmentMetric>> {
        self.run("department_metrics", self.store.department_metrics())
            .await
    }

    pub async fn schedule_metrics(&self, filter: SemesterFilter) -> Result<Vec<ScheduleMetric>> {
        self.run("schedule_metrics", self.store.schedule_metrics(filter))
            .await
    }

    pub async fn schedule_heatmap(&self, filter: SemesterFilter) -> Result<Vec<HeatmapCell>> {
        self.run("schedule_heatmap", self.store.schedule_heatmap(filter))
            .await
    }

    /// Display label for a filter: the semester's name, or
    /// [`ALL_SEMESTERS`] when unfiltered or the semester is unknown.
    pub async fn semester_name(&self, filter: SemesterFilter) -> Result<String> {
        let Some(id) = filter.id() else {
            return Ok(ALL_SEMESTERS.to_string());
        };
        let name = self.run("semester_name", self.store.semester_name(id)).await?;
        Ok(name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| ALL_SEMESTERS.to_string()))
    }

    async fn run<T, F>(&self, query: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, fut).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        metrics().query_latency_ms.observe(elapsed_ms);

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::query(format!(
                "{} timed out after {}ms",
                query,
                self.timeout.as_millis()
            ))),
        };

        match &result {
            Ok(_) => {
                metrics().queries_served.inc();
                debug!(query, elapsed_ms, "Query completed");
            }
            Err(e) => {
                metrics().query_errors.inc();
                warn!(query, elapsed_ms, error = %e, "Query failed");
            }
        }
        result
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("backend", &self.store.backend())
            .field("timeout", &self.timeout)
            .finish()
    }
}
