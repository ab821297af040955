//! [`AnalyticsStore`] on ClickHouse.
//!
//! Every upsert is a single-row insert into a ReplacingMergeTree keyed by the
//! natural key; readers see one row per key through `FINAL`. Deletes are
//! lightweight `DELETE FROM` mutations.

use crate::client::ClickHouseClient;
use crate::rows::{
    DashboardRow, DepartmentMetricRow, DepartmentRow, HeatmapRow, ScheduleEntryRow,
    ScheduleMetricRow, SemesterNameRow, SemesterRow, SubjectRow, TeacherRow, UtilizationRow,
    WorkloadRow, WorkloadStatRow,
};
use crate::schema::table;
use analytics_core::{
    AnalyticsStore, DashboardSummary, DepartmentMetric, DimDepartment, DimSemester, DimSubject,
    DimTeacher, Error, FactScheduleEntry, FactWorkload, HeatmapCell, Result, ScheduleMetric,
    SemesterFilter, UtilizationStat, WorkloadStat, UNKNOWN_DEPARTMENT,
};
use async_trait::async_trait;
use clickhouse::query::Query;
use clickhouse::Row;
use serde::Serialize;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error};
use uuid::Uuid;

/// Star schema stored in ClickHouse.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: ClickHouseClient,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    async fn insert_one<R>(&self, table: &str, row: &R) -> Result<()>
    where
        R: Row + Serialize + Send + Sync,
    {
        let start = Instant::now();

        let result = async {
            let mut insert = self.client.inner().insert::<R>(table)?;
            insert.write(row).await?;
            insert.end().await
        }
        .await;

        metrics()
            .store_write_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        result.map_err(|e| {
            error!(table, error = %e, "ClickHouse insert failed");
            Error::persistence(format!("insert into {} failed: {}", table, e))
        })
    }

    async fn delete_by_id(&self, table: &str, key_column: &str, id: Uuid) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE {} = toUUID(?)", table, key_column);
        let start = Instant::now();

        let result = self
            .client
            .inner()
            .query(&sql)
            .bind(id.to_string())
            .execute()
            .await;

        metrics()
            .store_write_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        result.map_err(|e| {
            error!(table, %id, error = %e, "ClickHouse delete failed");
            Error::persistence(format!("delete from {} failed: {}", table, e))
        })
    }
}

/// `WHERE <column> = toUUID(?)` when filtered, nothing otherwise.
fn semester_clause(column: &str, filter: SemesterFilter) -> String {
    if filter.is_all() {
        String::new()
    } else {
        format!("WHERE {} = toUUID(?)", column)
    }
}

fn bind_semester(query: Query, filter: SemesterFilter) -> Query {
    match filter.id() {
        Some(id) => query.bind(id.to_string()),
        None => query,
    }
}

fn read_error(query: &str, e: clickhouse::error::Error) -> Error {
    error!(query, error = %e, "ClickHouse query failed");
    Error::query(format!("{} failed: {}", query, e))
}

#[async_trait]
impl AnalyticsStore for ClickHouseStore {
    fn backend(&self) -> &'static str {
        "clickhouse"
    }

    async fn upsert_teacher(&self, teacher: &DimTeacher) -> Result<()> {
        self.insert_one(table::DIM_TEACHER, &TeacherRow::from(teacher))
            .await
    }

    async fn delete_teacher(&self, teacher_id: Uuid) -> Result<()> {
        self.delete_by_id(table::DIM_TEACHER, "teacher_id", teacher_id)
            .await
    }

    async fn upsert_department(&self, department: &DimDepartment) -> Result<()> {
        self.insert_one(table::DIM_DEPARTMENT, &DepartmentRow::from(department))
            .await
    }

    async fn upsert_subject(&self, subject: &DimSubject) -> Result<()> {
        self.insert_one(table::DIM_SUBJECT, &SubjectRow::from(subject))
            .await
    }

    async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
        self.delete_by_id(table::DIM_SUBJECT, "subject_id", subject_id)
            .await
    }

    async fn upsert_semester(&self, semester: &DimSemester) -> Result<()> {
        let row = SemesterRow::try_from(semester)?;
        self.insert_one(table::DIM_SEMESTER, &row).await
    }

    async fn upsert_workload(&self, workload: &FactWorkload) -> Result<()> {
        self.insert_one(table::FACT_WORKLOAD, &WorkloadRow::from(workload))
            .await
    }

    async fn upsert_schedule_entry(&self, entry: &FactScheduleEntry) -> Result<()> {
        self.insert_one(table::FACT_SCHEDULE_ENTRY, &ScheduleEntryRow::from(entry))
            .await
    }

    async fn workload_stats(&self, filter: SemesterFilter) -> Result<Vec<WorkloadStat>> {
        let sql = format!(
            r#"
            SELECT
                w.teacher_id,
                t.full_name,
                t.department_id,
                t.department_name,
                w.semester_id,
                w.subject_id,
                s.code,
                w.hours_per_week,
                w.total_hours
            FROM fact_workload AS w FINAL
            LEFT JOIN (
                SELECT teacher_id, full_name, department_id, department_name
                FROM dim_teacher FINAL
            ) AS t ON w.teacher_id = t.teacher_id
            LEFT JOIN (
                SELECT subject_id, code FROM dim_subject FINAL
            ) AS s ON w.subject_id = s.subject_id
            {}
            ORDER BY w.total_hours DESC
            "#,
            semester_clause("w.semester_id", filter)
        );

        let rows: Vec<WorkloadStatRow> = bind_semester(self.client.inner().query(&sql), filter)
            .fetch_all()
            .await
            .map_err(|e| read_error("workload_stats", e))?;

        debug!(rows = rows.len(), "Fetched workload stats");
        Ok(rows.into_iter().map(WorkloadStat::from).collect())
    }

    async fn utilization_stats(&self, filter: SemesterFilter) -> Result<Vec<UtilizationStat>> {
        // `present` separates a missing teacher from a teacher with an empty
        // department name.
        let sql = format!(
            r#"
            SELECT
                t.department_id,
                if(t.present = 1, t.department_name, '{unknown}') AS department_label,
                e.semester_id,
                countIf(e.is_assigned) AS assigned_slots,
                count() AS total_slots
            FROM fact_schedule_entry AS e FINAL
            LEFT JOIN (
                SELECT teacher_id, department_id, department_name, toUInt8(1) AS present
                FROM dim_teacher FINAL
            ) AS t ON e.teacher_id = t.teacher_id
            {filter}
            GROUP BY t.present, t.department_id, t.department_name, e.semester_id
            ORDER BY t.present DESC, department_label, e.semester_id, t.department_id
            "#,
            unknown = UNKNOWN_DEPARTMENT,
            filter = semester_clause("e.semester_id", filter)
        );

        let rows: Vec<UtilizationRow> = bind_semester(self.client.inner().query(&sql), filter)
            .fetch_all()
            .await
            .map_err(|e| read_error("utilization_stats", e))?;

        Ok(rows.into_iter().map(UtilizationStat::from).collect())
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let row: DashboardRow = self
            .client
            .inner()
            .query(
                r#"
                SELECT
                    (SELECT count() FROM dim_teacher FINAL),
                    (SELECT count() FROM dim_department FINAL),
                    (SELECT count() FROM dim_subject FINAL),
                    (SELECT count() FROM dim_semester FINAL)
                "#,
            )
            .fetch_one()
            .await
            .map_err(|e| read_error("dashboard_summary", e))?;

        Ok(row.into())
    }

    async fn department_metrics(&self) -> Result<Vec<DepartmentMetric>> {
        let rows: Vec<DepartmentMetricRow> = self
            .client
            .inner()
            .query(
                r#"
                SELECT
                    d.department_id,
                    d.name,
                    tc.teacher_count,
                    sc.subject_count
                FROM dim_department AS d FINAL
                LEFT JOIN (
                    SELECT department_id, uniqExact(teacher_id) AS teacher_count
                    FROM dim_teacher FINAL
                    GROUP BY department_id
                ) AS tc ON d.department_id = tc.department_id
                LEFT JOIN (
                    SELECT department_id, uniqExact(subject_id) AS subject_count
                    FROM dim_subject FINAL
                    GROUP BY department_id
                ) AS sc ON d.department_id = sc.department_id
                ORDER BY d.name, d.department_id
                "#,
            )
            .fetch_all()
            .await
            .map_err(|e| read_error("department_metrics", e))?;

        Ok(rows.into_iter().map(DepartmentMetric::from).collect())
    }

    async fn schedule_metrics(&self, filter: SemesterFilter) -> Result<Vec<ScheduleMetric>> {
        let sql = format!(
            r#"
            SELECT
                e.semester_id,
                sm.name,
                countIf(e.is_assigned) AS assigned_slots,
                count() AS total_slots
            FROM fact_schedule_entry AS e FINAL
            LEFT JOIN (
                SELECT semester_id, name, toUInt8(1) AS present
                FROM dim_semester FINAL
            ) AS sm ON e.semester_id = sm.semester_id
            {}
            GROUP BY e.semester_id, sm.name, sm.present
            ORDER BY sm.present DESC, sm.name, e.semester_id
            "#,
            semester_clause("e.semester_id", filter)
        );

        let rows: Vec<ScheduleMetricRow> = bind_semester(self.client.inner().query(&sql), filter)
            .fetch_all()
            .await
            .map_err(|e| read_error("schedule_metrics", e))?;

        Ok(rows.into_iter().map(ScheduleMetric::from).collect())
    }

    async fn schedule_heatmap(&self, filter: SemesterFilter) -> Result<Vec<HeatmapCell>> {
        let sql = format!(
            r#"
            SELECT day_of_week, period, count() AS entry_count
            FROM fact_schedule_entry FINAL
            {}
            GROUP BY day_of_week, period
            ORDER BY day_of_week, period
            "#,
            semester_clause("semester_id", filter)
        );

        let rows: Vec<HeatmapRow> = bind_semester(self.client.inner().query(&sql), filter)
            .fetch_all()
            .await
            .map_err(|e| read_error("schedule_heatmap", e))?;

        Ok(rows.into_iter().map(HeatmapCell::from).collect())
    }

    async fn semester_name(&self, semester_id: Uuid) -> Result<Option<String>> {
        self.client
            .inner()
            .query("SELECT name FROM dim_semester FINAL WHERE semester_id = toUUID(?) LIMIT 1")
            .bind(semester_id.to_string())
            .fetch_optional::<SemesterNameRow>()
            .await
            .map(|row| row.map(|r| r.name))
            .map_err(|e| read_error("semester_name", e))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .inner()
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(|e| Error::connection(format!("ClickHouse unreachable: {}", e)))
    }
}
