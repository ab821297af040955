//! Materialized store contract.
//!
//! Every write is a single natural-key upsert or delete that the backend
//! applies atomically. Callers never read before writing.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    DashboardSummary, DepartmentMetric, DimDepartment, DimSemester, DimSubject, DimTeacher,
    FactScheduleEntry, FactWorkload, HeatmapCell, ScheduleMetric, SemesterFilter,
    UtilizationStat, WorkloadStat,
};

/// Star-schema storage backing ingestion and aggregate queries.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;

    async fn upsert_teacher(&self, teacher: &DimTeacher) -> Result<()>;

    /// Absence of the row is not an error.
    async fn delete_teacher(&self, teacher_id: Uuid) -> Result<()>;

    async fn upsert_department(&self, department: &DimDepartment) -> Result<()>;

    async fn upsert_subject(&self, subject: &DimSubject) -> Result<()>;

    /// Absence of the row is not an error.
    async fn delete_subject(&self, subject_id: Uuid) -> Result<()>;

    async fn upsert_semester(&self, semester: &DimSemester) -> Result<()>;

    /// Conflict on `(teacher_id, semester_id, subject_id)` replaces the hours only.
    async fn upsert_workload(&self, workload: &FactWorkload) -> Result<()>;

    /// Conflict on `(schedule_id, day_of_week, period, room_id)` replaces
    /// `semester_id`, `teacher_id`, `subject_id` and `is_assigned` only.
    async fn upsert_schedule_entry(&self, entry: &FactScheduleEntry) -> Result<()>;

    /// Ordered by `total_hours` descending.
    async fn workload_stats(&self, filter: SemesterFilter) -> Result<Vec<WorkloadStat>>;

    /// Ordered by department name, unknown department last.
    async fn utilization_stats(&self, filter: SemesterFilter) -> Result<Vec<UtilizationStat>>;

    async fn dashboard_summary(&self) -> Result<DashboardSummary>;

    /// Ordered by department name.
    async fn department_metrics(&self) -> Result<Vec<DepartmentMetric>>;

    /// Ordered by semester name.
    async fn schedule_metrics(&self, filter: SemesterFilter) -> Result<Vec<ScheduleMetric>>;

    /// Ordered by `(day_of_week, period)`.
    async fn schedule_heatmap(&self, filter: SemesterFilter) -> Result<Vec<HeatmapCell>>;

    /// Display name of a semester, if the dimension row exists.
    async fn semester_name(&self, semester_id: Uuid) -> Result<Option<String>>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()>;
}
