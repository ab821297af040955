//! API routes.

pub mod analytics;
pub mod health;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/workload", get(analytics::workload_handler))
        .route("/utilization", get(analytics::utilization_handler))
        .route("/dashboard", get(analytics::dashboard_handler))
        .route("/department-metrics", get(analytics::department_metrics_handler))
        .route("/schedule-metrics", get(analytics::schedule_metrics_handler))
        .route("/schedule-heatmap", get(analytics::schedule_heatmap_handler))
        .route("/semester-name", get(analytics::semester_name_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
