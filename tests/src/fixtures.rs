//! Upstream event payload builders.
//!
//! Payloads are built as JSON exactly as upstream services publish them, with
//! identifiers as strings.

use serde_json::{json, Value};
use uuid::Uuid;

pub use analytics_core::events::subject;

pub fn teacher(teacher_id: Uuid, full_name: &str, department_id: Uuid, department_name: &str) -> Value {
    json!({
        "teacher_id": teacher_id.to_string(),
        "full_name": full_name,
        "department_id": department_id.to_string(),
        "department_name": department_name,
        "specializations": ["algorithms"]
    })
}

pub fn teacher_deleted(teacher_id: Uuid) -> Value {
    json!({ "teacher_id": teacher_id.to_string() })
}

pub fn department(department_id: Uuid, name: &str, code: &str) -> Value {
    json!({
        "department_id": department_id.to_string(),
        "name": name,
        "code": code
    })
}

pub fn subject_changed(subject_id: Uuid, name: &str, code: &str, department_id: Uuid) -> Value {
    json!({
        "subject_id": subject_id.to_string(),
        "name": name,
        "code": code,
        "credits": 4,
        "department_id": department_id.to_string()
    })
}

pub fn subject_deleted(subject_id: Uuid) -> Value {
    json!({ "subject_id": subject_id.to_string() })
}

pub fn semester(semester_id: Uuid, name: &str) -> Value {
    json!({
        "semester_id": semester_id.to_string(),
        "name": name,
        "year": 2025,
        "term": "fall",
        "start_date": "2025-09-01",
        "end_date": "2026-01-31"
    })
}

/// One slot of a generated schedule.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub schedule_id: Uuid,
    pub semester_id: Uuid,
    pub teacher_id: Uuid,
    pub subject_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: i32,
    pub period: i32,
    pub is_assigned: bool,
}

impl Slot {
    /// Slot in a fresh room of `schedule_id`.
    pub fn new(schedule_id: Uuid, semester_id: Uuid, teacher_id: Uuid, day_of_week: i32, period: i32) -> Self {
        Self {
            schedule_id,
            semester_id,
            teacher_id,
            subject_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            day_of_week,
            period,
            is_assigned: true,
        }
    }

    pub fn assigned(mut self, is_assigned: bool) -> Self {
        self.is_assigned = is_assigned;
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "schedule_id": self.schedule_id.to_string(),
            "semester_id": self.semester_id.to_string(),
            "teacher_id": self.teacher_id.to_string(),
            "subject_id": self.subject_id.to_string(),
            "room_id": self.room_id.to_string(),
            "day_of_week": self.day_of_week,
            "period": self.period,
            "is_assigned": self.is_assigned
        })
    }
}

pub fn schedule_generated(slots: &[Slot]) -> Value {
    json!({ "entries": slots.iter().map(Slot::to_json).collect::<Vec<_>>() })
}

/// `schedule_generated` with raw entries, for malformed-entry cases.
pub fn schedule_generated_raw(entries: Vec<Value>) -> Value {
    json!({ "entries": entries })
}
