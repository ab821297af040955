//! Star-schema records and aggregate query results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used when a fact references a teacher whose department is unknown.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// Label used by report headers when no semester filter applies.
pub const ALL_SEMESTERS: &str = "All Semesters";

/// Namespace for deterministic fact row ids.
const FACT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x6a, 0x52, 0x8e, 0x0b, 0x4d, 0x71, 0x9a, 0x25, 0xc4, 0x77, 0x10, 0xe2, 0x5b, 0x93,
]);

// =============================================================================
// Dimensions
// =============================================================================

/// Teacher dimension row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimTeacher {
    pub teacher_id: Uuid,
    pub full_name: String,
    pub department_id: Uuid,
    pub department_name: String,
    pub specializations: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Department dimension row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimDepartment {
    pub department_id: Uuid,
    pub name: String,
    pub code: String,
    pub updated_at: DateTime<Utc>,
}

/// Subject dimension row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimSubject {
    pub subject_id: Uuid,
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub department_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Semester dimension row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimSemester {
    pub semester_id: Uuid,
    pub name: String,
    pub year: i32,
    pub term: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Facts
// =============================================================================

/// Natural key of a workload fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadKey {
    pub teacher_id: Uuid,
    pub semester_id: Uuid,
    pub subject_id: Uuid,
}

impl WorkloadKey {
    /// Deterministic row id for this key.
    pub fn fact_id(&self) -> Uuid {
        let mut name = Vec::with_capacity(3 * 16 + 1);
        name.push(b'w');
        name.extend_from_slice(self.teacher_id.as_bytes());
        name.extend_from_slice(self.semester_id.as_bytes());
        name.extend_from_slice(self.subject_id.as_bytes());
        Uuid::new_v5(&FACT_NAMESPACE, &name)
    }
}

/// Workload fact row, one per (teacher, semester, subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactWorkload {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub semester_id: Uuid,
    pub subject_id: Uuid,
    pub hours_per_week: f64,
    pub total_hours: f64,
    pub created_at: DateTime<Utc>,
}

impl FactWorkload {
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey {
            teacher_id: self.teacher_id,
            semester_id: self.semester_id,
            subject_id: self.subject_id,
        }
    }
}

/// Conflict key of a schedule entry: `(schedule_id, day_of_week, period, room_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleSlotKey {
    pub schedule_id: Uuid,
    pub day_of_week: i32,
    pub period: i32,
    pub room_id: Uuid,
}

impl ScheduleSlotKey {
    /// Deterministic row id for this key.
    pub fn fact_id(&self) -> Uuid {
        let mut name = Vec::with_capacity(2 * 16 + 8 + 1);
        name.push(b's');
        name.extend_from_slice(self.schedule_id.as_bytes());
        name.extend_from_slice(&self.day_of_week.to_be_bytes());
        name.extend_from_slice(&self.period.to_be_bytes());
        name.extend_from_slice(self.room_id.as_bytes());
        Uuid::new_v5(&FACT_NAMESPACE, &name)
    }
}

/// Schedule entry fact row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactScheduleEntry {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub semester_id: Uuid,
    pub teacher_id: Uuid,
    pub subject_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: i32,
    pub period: i32,
    pub is_assigned: bool,
    pub created_at: DateTime<Utc>,
}

impl FactScheduleEntry {
    pub fn key(&self) -> ScheduleSlotKey {
        ScheduleSlotKey {
            schedule_id: self.schedule_id,
            day_of_week: self.day_of_week,
            period: self.period,
            room_id: self.room_id,
        }
    }
}

// =============================================================================
// Filters and rates
// =============================================================================

/// Optional semester restriction for aggregate queries.
///
/// The nil UUID is the "all semesters" sentinel and never names a real
/// semester, so constructing a filter from it yields [`SemesterFilter::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SemesterFilter(Option<Uuid>);

impl SemesterFilter {
    pub const ALL: Self = Self(None);

    pub fn semester(id: Uuid) -> Self {
        if id.is_nil() {
            Self::ALL
        } else {
            Self(Some(id))
        }
    }

    /// Parse a raw query parameter; empty means unfiltered.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::ALL);
        }
        Uuid::parse_str(raw)
            .map(Self::semester)
            .map_err(|_| crate::Error::invalid_id("semester_id", raw))
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0
    }

    pub fn is_all(&self) -> bool {
        self.0.is_none()
    }

    pub fn matches(&self, semester_id: Uuid) -> bool {
        self.0.map_or(true, |id| id == semester_id)
    }
}

impl From<Uuid> for SemesterFilter {
    fn from(id: Uuid) -> Self {
        Self::semester(id)
    }
}

impl From<Option<Uuid>> for SemesterFilter {
    fn from(id: Option<Uuid>) -> Self {
        id.map_or(Self::ALL, Self::semester)
    }
}

/// Assigned-over-total percentage; zero when there are no slots.
pub fn slot_rate(assigned: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        assigned as f64 / total as f64 * 100.0
    }
}

// =============================================================================
// Query results
// =============================================================================

/// Workload per (teacher, semester, subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadStat {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub department_id: Uuid,
    pub department_name: String,
    pub semester_id: Uuid,
    pub subject_id: Uuid,
    pub subject_code: String,
    pub hours_per_week: f64,
    pub total_hours: f64,
}

/// Slot utilization per (department, semester).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationStat {
    pub department_id: Uuid,
    pub department_name: String,
    pub semester_id: Uuid,
    pub assigned_slots: u64,
    pub total_slots: u64,
    pub utilization_pct: f64,
}

impl UtilizationStat {
    pub fn new(
        department_id: Uuid,
        department_name: impl Into<String>,
        semester_id: Uuid,
        assigned_slots: u64,
        total_slots: u64,
    ) -> Self {
        Self {
            department_id,
            department_name: department_name.into(),
            semester_id,
            assigned_slots,
            total_slots,
            utilization_pct: slot_rate(assigned_slots, total_slots),
        }
    }
}

/// Dimension counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_teachers: u64,
    pub total_departments: u64,
    pub total_subjects: u64,
    pub total_semesters: u64,
}

/// Teacher and subject counts per department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentMetric {
    pub department_id: Uuid,
    pub department_name: String,
    pub teacher_count: u64,
    pub subject_count: u64,
}

/// Slot fill per semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetric {
    pub semester_id: Uuid,
    pub semester_name: String,
    pub assigned_slots: u64,
    pub total_slots: u64,
    pub fill_rate: f64,
}

impl ScheduleMetric {
    pub fn new(
        semester_id: Uuid,
        semester_name: impl Into<String>,
        assigned_slots: u64,
        total_slots: u64,
    ) -> Self {
        Self {
            semester_id,
            semester_name: semester_name.into(),
            assigned_slots,
            total_slots,
            fill_rate: slot_rate(assigned_slots, total_slots),
        }
    }
}

/// Entry count for one (day, period) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub day_of_week: i32,
    pub period: i32,
    pub entry_count: u64,
}
