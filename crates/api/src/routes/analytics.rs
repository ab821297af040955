//! Aggregate query endpoints. Each handler maps one query engine call to
//! JSON; there is no logic here beyond parameter parsing.

use analytics_core::{
    DashboardSummary, DepartmentMetric, HeatmapCell, ScheduleMetric, UtilizationStat,
    WorkloadStat,
};
use axum::{extract::State, Json};
use tracing::debug;

use crate::extractors::SemesterParam;
use crate::response::{ApiError, SemesterNameResponse};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// GET /workload
pub async fn workload_handler(
    State(state): State<AppState>,
    SemesterParam(filter): SemesterParam,
) -> ApiResult<Vec<WorkloadStat>> {
    let rows = state.queries.workload_stats(filter).await?;
    debug!(rows = rows.len(), semester = ?filter.id(), "Served workload stats");
    Ok(Json(rows))
}

/// GET /utilization
pub async fn utilization_handler(
    State(state): State<AppState>,
    SemesterParam(filter): SemesterParam,
) -> ApiResult<Vec<UtilizationStat>> {
    Ok(Json(state.queries.utilization_stats(filter).await?))
}

/// GET /dashboard
pub async fn dashboard_handler(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    Ok(Json(state.queries.dashboard_summary().await?))
}

/// GET /department-metrics
pub async fn department_metrics_handler(
    State(state): State<AppState>,
) -> ApiResult<Vec<DepartmentMetric>> {
    Ok(Json(state.queries.department_metrics().await?))
}

/// GET /schedule-metrics
pub async fn schedule_metrics_handler(
    State(state): State<AppState>,
    SemesterParam(filter): SemesterParam,
) -> ApiResult<Vec<ScheduleMetric>> {
    Ok(Json(state.queries.schedule_metrics(filter).await?))
}

/// GET /schedule-heatmap
pub async fn schedule_heatmap_handler(
    State(state): State<AppState>,
    SemesterParam(filter): SemesterParam,
) -> ApiResult<Vec<HeatmapCell>> {
    Ok(Json(state.queries.schedule_heatmap(filter).await?))
}

/// GET /semester-name
pub async fn semester_name_handler(
    State(state): State<AppState>,
    SemesterParam(filter): SemesterParam,
) -> ApiResult<SemesterNameResponse> {
    let name = state.queries.semester_name(filter).await?;
    Ok(Json(SemesterNameResponse { name }))
}
