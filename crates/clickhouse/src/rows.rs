//! RowBinary row types.
//!
//! Field order matches the column order of the corresponding table or
//! SELECT list. Timestamps travel as milliseconds since epoch, dates as
//! days since epoch (`Date32`).

use analytics_core::{
    DashboardSummary, DepartmentMetric, DimDepartment, DimSemester, DimSubject, DimTeacher,
    Error, FactScheduleEntry, FactWorkload, HeatmapCell, Result, ScheduleMetric,
    UtilizationStat, WorkloadStat,
};
use chrono::NaiveDate;
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01.
pub fn date_to_days(date: NaiveDate) -> Result<i32> {
    i32::try_from((date - epoch()).num_days())
        .map_err(|_| Error::persistence(format!("date {} out of range", date)))
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(days.into()))
}

// =============================================================================
// Table rows (insert)
// =============================================================================

#[derive(Debug, Clone, Row, Serialize)]
pub struct TeacherRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub teacher_id: Uuid,
    pub full_name: String,
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub department_name: String,
    pub specializations: Vec<String>,
    pub updated_at: i64,
}

impl From<&DimTeacher> for TeacherRow {
    fn from(t: &DimTeacher) -> Self {
        Self {
            teacher_id: t.teacher_id,
            full_name: t.full_name.clone(),
            department_id: t.department_id,
            department_name: t.department_name.clone(),
            specializations: t.specializations.clone(),
            updated_at: t.updated_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct DepartmentRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub name: String,
    pub code: String,
    pub updated_at: i64,
}

impl From<&DimDepartment> for DepartmentRow {
    fn from(d: &DimDepartment) -> Self {
        Self {
            department_id: d.department_id,
            name: d.name.clone(),
            code: d.code.clone(),
            updated_at: d.updated_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct SubjectRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub subject_id: Uuid,
    pub name: String,
    pub code: String,
    pub credits: i32,
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub updated_at: i64,
}

impl From<&DimSubject> for SubjectRow {
    fn from(s: &DimSubject) -> Self {
        Self {
            subject_id: s.subject_id,
            name: s.name.clone(),
            code: s.code.clone(),
            credits: s.credits,
            department_id: s.department_id,
            updated_at: s.updated_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct SemesterRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    pub name: String,
    pub year: i32,
    pub term: String,
    pub start_date: Option<i32>,
    pub end_date: Option<i32>,
    pub updated_at: i64,
}

impl TryFrom<&DimSemester> for SemesterRow {
    type Error = Error;

    fn try_from(s: &DimSemester) -> Result<Self> {
        Ok(Self {
            semester_id: s.semester_id,
            name: s.name.clone(),
            year: s.year,
            term: s.term.clone(),
            start_date: s.start_date.map(date_to_days).transpose()?,
            end_date: s.end_date.map(date_to_days).transpose()?,
            updated_at: s.updated_at.timestamp_millis(),
        })
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct WorkloadRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub teacher_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub subject_id: Uuid,
    pub hours_per_week: f64,
    pub total_hours: f64,
    pub created_at: i64,
}

impl From<&FactWorkload> for WorkloadRow {
    fn from(w: &FactWorkload) -> Self {
        Self {
            id: w.id,
            teacher_id: w.teacher_id,
            semester_id: w.semester_id,
            subject_id: w.subject_id,
            hours_per_week: w.hours_per_week,
            total_hours: w.total_hours,
            created_at: w.created_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct ScheduleEntryRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub schedule_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub teacher_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub subject_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub room_id: Uuid,
    pub day_of_week: i32,
    pub period: i32,
    pub is_assigned: bool,
    pub created_at: i64,
}

impl From<&FactScheduleEntry> for ScheduleEntryRow {
    fn from(e: &FactScheduleEntry) -> Self {
        Self {
            id: e.id,
            schedule_id: e.schedule_id,
            semester_id: e.semester_id,
            teacher_id: e.teacher_id,
            subject_id: e.subject_id,
            room_id: e.room_id,
            day_of_week: e.day_of_week,
            period: e.period,
            is_assigned: e.is_assigned,
            created_at: e.created_at.timestamp_millis(),
        }
    }
}

// =============================================================================
// Query rows (select)
// =============================================================================

#[derive(Debug, Clone, Row, Deserialize)]
pub struct WorkloadStatRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub teacher_id: Uuid,
    pub teacher_name: String,
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub department_name: String,
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    pub subject_id: Uuid,
    pub subject_code: String,
    pub hours_per_week: f64,
    pub total_hours: f64,
}

impl From<WorkloadStatRow> for WorkloadStat {
    fn from(r: WorkloadStatRow) -> Self {
        Self {
            teacher_id: r.teacher_id,
            teacher_name: r.teacher_name,
            department_id: r.department_id,
            department_name: r.department_name,
            semester_id: r.semester_id,
            subject_id: r.subject_id,
            subject_code: r.subject_code,
            hours_per_week: r.hours_per_week,
            total_hours: r.total_hours,
        }
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct UtilizationRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub department_label: String,
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    pub assigned_slots: u64,
    pub total_slots: u64,
}

impl From<UtilizationRow> for UtilizationStat {
    fn from(r: UtilizationRow) -> Self {
        UtilizationStat::new(
            r.department_id,
            r.department_label,
            r.semester_id,
            r.assigned_slots,
            r.total_slots,
        )
    }
}

#[derive(Debug, Clone, Copy, Row, Deserialize)]
pub struct DashboardRow {
    pub total_teachers: u64,
    pub total_departments: u64,
    pub total_subjects: u64,
    pub total_semesters: u64,
}

impl From<DashboardRow> for DashboardSummary {
    fn from(r: DashboardRow) -> Self {
        Self {
            total_teachers: r.total_teachers,
            total_departments: r.total_departments,
            total_subjects: r.total_subjects,
            total_semesters: r.total_semesters,
        }
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct DepartmentMetricRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub department_id: Uuid,
    pub department_name: String,
    pub teacher_count: u64,
    pub subject_count: u64,
}

impl From<DepartmentMetricRow> for DepartmentMetric {
    fn from(r: DepartmentMetricRow) -> Self {
        Self {
            department_id: r.department_id,
            department_name: r.department_name,
            teacher_count: r.teacher_count,
            subject_count: r.subject_count,
        }
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct ScheduleMetricRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub semester_id: Uuid,
    pub semester_name: String,
    pub assigned_slots: u64,
    pub total_slots: u64,
}

impl From<ScheduleMetricRow> for ScheduleMetric {
    fn from(r: ScheduleMetricRow) -> Self {
        ScheduleMetric::new(r.semester_id, r.semester_name, r.assigned_slots, r.total_slots)
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct SemesterNameRow {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Row, Deserialize)]
pub struct HeatmapRow {
    pub day_of_week: i32,
    pub period: i32,
    pub entry_count: u64,
}

impl From<HeatmapRow> for HeatmapCell {
    fn from(r: HeatmapRow) -> Self {
        Self {
            day_of_week: r.day_of_week,
            period: r.period,
            entry_count: r.entry_count,
        }
    }
}
