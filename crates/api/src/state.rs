//! Application state shared across handlers.

use analytics_core::{AnalyticsStore, QueryConfig, QueryEngine};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Aggregate queries over the materialized store
    pub queries: QueryEngine,
}

impl AppState {
    pub fn new(queries: QueryEngine) -> Self {
        Self { queries }
    }

    /// State over `store` with the given query settings.
    pub fn from_store(store: Arc<dyn AnalyticsStore>, config: &QueryConfig) -> Self {
        Self::new(QueryEngine::new(store, config))
    }
}
