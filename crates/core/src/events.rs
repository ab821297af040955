//! Upstream domain events consumed by the analytics pipeline.
//!
//! Each bus subject maps to exactly one [`EventKind`] through
//! [`DISPATCH_TABLE`]. Wire payloads carry identifiers as strings; decoding
//! turns them into typed events with parsed UUIDs and dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};

/// Subjects published by upstream services.
pub mod subject {
    pub const TEACHER_CREATED: &str = "hr.teacher.created";
    pub const TEACHER_UPDATED: &str = "hr.teacher.updated";
    pub const TEACHER_DELETED: &str = "hr.teacher.deleted";
    pub const DEPARTMENT_CREATED: &str = "hr.department.created";
    pub const DEPARTMENT_UPDATED: &str = "hr.department.updated";
    pub const SUBJECT_CREATED: &str = "subject.created";
    pub const SUBJECT_UPDATED: &str = "subject.updated";
    pub const SUBJECT_DELETED: &str = "subject.deleted";
    pub const SEMESTER_CREATED: &str = "timetable.semester.created";
    pub const SCHEDULE_GENERATED: &str = "timetable.schedule.generated";
}

/// Closed set of recognized event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TeacherUpserted,
    TeacherDeleted,
    DepartmentUpserted,
    SubjectUpserted,
    SubjectDeleted,
    SemesterCreated,
    ScheduleGenerated,
}

/// Subject → event kind. Subjects absent from this table are ignored.
pub const DISPATCH_TABLE: &[(&str, EventKind)] = &[
    (subject::TEACHER_CREATED, EventKind::TeacherUpserted),
    (subject::TEACHER_UPDATED, EventKind::TeacherUpserted),
    (subject::TEACHER_DELETED, EventKind::TeacherDeleted),
    (subject::DEPARTMENT_CREATED, EventKind::DepartmentUpserted),
    (subject::DEPARTMENT_UPDATED, EventKind::DepartmentUpserted),
    (subject::SUBJECT_CREATED, EventKind::SubjectUpserted),
    (subject::SUBJECT_UPDATED, EventKind::SubjectUpserted),
    (subject::SUBJECT_DELETED, EventKind::SubjectDeleted),
    (subject::SEMESTER_CREATED, EventKind::SemesterCreated),
    (subject::SCHEDULE_GENERATED, EventKind::ScheduleGenerated),
];

impl EventKind {
    /// Look up the kind for a bus subject.
    pub fn from_subject(subject: &str) -> Option<Self> {
        DISPATCH_TABLE
            .iter()
            .find(|(s, _)| *s == subject)
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeacherUpserted => "teacher_upserted",
            Self::TeacherDeleted => "teacher_deleted",
            Self::DepartmentUpserted => "department_upserted",
            Self::SubjectUpserted => "subject_upserted",
            Self::SubjectDeleted => "subject_deleted",
            Self::SemesterCreated => "semester_created",
            Self::ScheduleGenerated => "schedule_generated",
        }
    }

    /// Decode a raw payload into the typed event for this kind.
    pub fn decode(self, payload: &[u8]) -> Result<AnalyticsEvent> {
        let event = match self {
            Self::TeacherUpserted => {
                let wire: TeacherPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::TeacherUpserted(wire.try_into()?)
            }
            Self::TeacherDeleted => {
                let wire: TeacherDeletedPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::TeacherDeleted {
                    teacher_id: parse_key("teacher_id", &wire.teacher_id)?,
                }
            }
            Self::DepartmentUpserted => {
                let wire: DepartmentPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::DepartmentUpserted(wire.try_into()?)
            }
            Self::SubjectUpserted => {
                let wire: SubjectPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::SubjectUpserted(wire.try_into()?)
            }
            Self::SubjectDeleted => {
                let wire: SubjectDeletedPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::SubjectDeleted {
                    subject_id: parse_key("subject_id", &wire.subject_id)?,
                }
            }
            Self::SemesterCreated => {
                let wire: SemesterPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::SemesterCreated(wire.try_into()?)
            }
            Self::ScheduleGenerated => {
                let wire: ScheduleGeneratedPayload = serde_json::from_slice(payload)?;
                AnalyticsEvent::ScheduleGenerated(ScheduleGenerated {
                    entries: wire.entries,
                })
            }
        };
        Ok(event)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Typed events
// =============================================================================

/// A decoded upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    TeacherUpserted(TeacherChanged),
    TeacherDeleted { teacher_id: Uuid },
    DepartmentUpserted(DepartmentChanged),
    SubjectUpserted(SubjectChanged),
    SubjectDeleted { subject_id: Uuid },
    SemesterCreated(SemesterCreated),
    ScheduleGenerated(ScheduleGenerated),
}

impl AnalyticsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TeacherUpserted(_) => EventKind::TeacherUpserted,
            Self::TeacherDeleted { .. } => EventKind::TeacherDeleted,
            Self::DepartmentUpserted(_) => EventKind::DepartmentUpserted,
            Self::SubjectUpserted(_) => EventKind::SubjectUpserted,
            Self::SubjectDeleted { .. } => EventKind::SubjectDeleted,
            Self::SemesterCreated(_) => EventKind::SemesterCreated,
            Self::ScheduleGenerated(_) => EventKind::ScheduleGenerated,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherChanged {
    pub teacher_id: Uuid,
    pub full_name: String,
    pub department_id: Uuid,
    pub department_name: String,
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentChanged {
    pub department_id: Uuid,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectChanged {
    pub subject_id: Uuid,
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub department_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemesterCreated {
    pub semester_id: Uuid,
    pub name: String,
    pub year: i32,
    pub term: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A generated timetable. Entries stay raw so one bad entry cannot spoil
/// the rest of the batch; decode them one by one with [`ScheduleGenerated::entries`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleGenerated {
    pub entries: Vec<serde_json::Value>,
}

impl ScheduleGenerated {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode every entry independently.
    pub fn entries(&self) -> impl Iterator<Item = Result<ScheduleEntry>> + '_ {
        self.entries.iter().map(ScheduleEntry::decode)
    }
}

/// One decoded slot of a generated schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub schedule_id: Uuid,
    pub semester_id: Uuid,
    pub teacher_id: Uuid,
    pub subject_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: i32,
    pub period: i32,
    pub is_assigned: bool,
}

impl ScheduleEntry {
    pub fn decode(value: &serde_json::Value) -> Result<Self> {
        let wire = ScheduleEntryPayload::deserialize(value)?;
        wire.validate()
            .map_err(|e| Error::decode(format!("schedule entry: {}", e)))?;

        Ok(Self {
            schedule_id: parse_key("schedule_id", &wire.schedule_id)?,
            semester_id: parse_ref("semester_id", &wire.semester_id)?,
            teacher_id: parse_ref("teacher_id", &wire.teacher_id)?,
            subject_id: parse_ref("subject_id", &wire.subject_id)?,
            room_id: parse_ref("room_id", &wire.room_id)?,
            day_of_week: wire.day_of_week,
            period: wire.period,
            is_assigned: wire.is_assigned,
        })
    }
}

// =============================================================================
// Wire payloads
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherPayload {
    pub teacher_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub department_name: String,
    #[serde(default)]
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherDeletedPayload {
    pub teacher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentPayload {
    pub department_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubjectPayload {
    pub subject_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub credits: i32,
    #[serde(default)]
    pub department_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDeletedPayload {
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemesterPayload {
    pub semester_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleGeneratedPayload {
    #[serde(default)]
    pub entries: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleEntryPayload {
    pub schedule_id: String,
    #[serde(default)]
    pub semester_id: String,
    #[serde(default)]
    pub teacher_id: String,
    #[serde(default)]
    pub subject_id: String,
    #[serde(default)]
    pub room_id: String,
    #[validate(range(min = 0, max = 6))]
    pub day_of_week: i32,
    #[validate(range(min = 0))]
    pub period: i32,
    #[serde(default)]
    pub is_assigned: bool,
}

impl TryFrom<TeacherPayload> for TeacherChanged {
    type Error = Error;

    fn try_from(wire: TeacherPayload) -> Result<Self> {
        Ok(Self {
            teacher_id: parse_key("teacher_id", &wire.teacher_id)?,
            full_name: wire.full_name,
            department_id: parse_ref("department_id", &wire.department_id)?,
            department_name: wire.department_name,
            specializations: wire.specializations,
        })
    }
}

impl TryFrom<DepartmentPayload> for DepartmentChanged {
    type Error = Error;

    fn try_from(wire: DepartmentPayload) -> Result<Self> {
        Ok(Self {
            department_id: parse_key("department_id", &wire.department_id)?,
            name: wire.name,
            code: wire.code,
        })
    }
}

impl TryFrom<SubjectPayload> for SubjectChanged {
    type Error = Error;

    fn try_from(wire: SubjectPayload) -> Result<Self> {
        wire.validate()
            .map_err(|e| Error::decode(format!("subject: {}", e)))?;
        Ok(Self {
            subject_id: parse_key("subject_id", &wire.subject_id)?,
            name: wire.name,
            code: wire.code,
            credits: wire.credits,
            department_id: parse_ref("department_id", &wire.department_id)?,
        })
    }
}

impl TryFrom<SemesterPayload> for SemesterCreated {
    type Error = Error;

    fn try_from(wire: SemesterPayload) -> Result<Self> {
        Ok(Self {
            semester_id: parse_key("semester_id", &wire.semester_id)?,
            name: wire.name,
            year: wire.year,
            term: wire.term,
            start_date: parse_date("start_date", &wire.start_date)?,
            end_date: parse_date("end_date", &wire.end_date)?,
        })
    }
}

// =============================================================================
// Field parsing
// =============================================================================

/// Parse a natural key. Must be a valid, non-nil UUID.
pub fn parse_key(field: &'static str, raw: &str) -> Result<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(Error::invalid_id(field, raw)),
    }
}

/// Parse a reference to another entity. Empty means "no reference" and
/// maps to the nil sentinel; anything else must be a valid UUID.
pub fn parse_ref(field: &'static str, raw: &str) -> Result<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Uuid::nil());
    }
    Uuid::parse_str(raw).map_err(|_| Error::invalid_id(field, raw))
}

/// Parse a `YYYY-MM-DD` date. Empty means absent.
pub fn parse_date(field: &'static str, raw: &str) -> Result<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| Error::decode(format!("{}: {:?} is not YYYY-MM-DD ({})", field, raw, e)))
}
