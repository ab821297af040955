//! Denormalization engine.
//!
//! Turns typed upstream events into single-statement store mutations. Every
//! write is an unconditional upsert or delete on the row's natural key, so
//! applying the same event twice leaves the store unchanged. Rows are
//! stamped with processing time, not event time.

use analytics_core::events::{
    DepartmentChanged, ScheduleEntry, SemesterCreated, SubjectChanged, TeacherChanged,
};
use analytics_core::{
    AnalyticsStore, DimDepartment, DimSemester, DimSubject, DimTeacher, FactScheduleEntry,
    FactWorkload, Result, ScheduleSlotKey, WorkloadKey,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Source of processing timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Applies events to the materialized store.
#[derive(Clone)]
pub struct Denormalizer {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
}

impl Denormalizer {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn AnalyticsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn AnalyticsStore> {
        &self.store
    }

    pub async fn upsert_teacher(&self, event: &TeacherChanged) -> Result<()> {
        let row = DimTeacher {
            teacher_id: event.teacher_id,
            full_name: event.full_name.clone(),
            department_id: event.department_id,
            department_name: event.department_name.clone(),
            specializations: event.specializations.clone(),
            updated_at: self.clock.now(),
        };
        self.store.upsert_teacher(&row).await?;
        debug!(teacher_id = %row.teacher_id, "Teacher upserted");
        Ok(())
    }

    pub async fn delete_teacher(&self, teacher_id: Uuid) -> Result<()> {
        self.store.delete_teacher(teacher_id).await?;
        debug!(%teacher_id, "Teacher deleted");
        Ok(())
    }

    pub async fn upsert_department(&self, event: &DepartmentChanged) -> Result<()> {
        let row = DimDepartment {
            department_id: event.department_id,
            name: event.name.clone(),
            code: event.code.clone(),
            updated_at: self.clock.now(),
        };
        self.store.upsert_department(&row).await?;
        debug!(department_id = %row.department_id, "Department upserted");
        Ok(())
    }

    pub async fn upsert_subject(&self, event: &SubjectChanged) -> Result<()> {
        let row = DimSubject {
            subject_id: event.subject_id,
            name: event.name.clone(),
            code: event.code.clone(),
            credits: event.credits,
            department_id: event.department_id,
            updated_at: self.clock.now(),
        };
        self.store.upsert_subject(&row).await?;
        debug!(subject_id = %row.subject_id, "Subject upserted");
        Ok(())
    }

    pub async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
        self.store.delete_subject(subject_id).await?;
        debug!(%subject_id, "Subject deleted");
        Ok(())
    }

    pub async fn upsert_semester(&self, event: &SemesterCreated) -> Result<()> {
        let row = DimSemester {
            semester_id: event.semester_id,
            name: event.name.clone(),
            year: event.year,
            term: event.term.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            updated_at: self.clock.now(),
        };
        self.store.upsert_semester(&row).await?;
        debug!(semester_id = %row.semester_id, "Semester upserted");
        Ok(())
    }

    pub async fn upsert_schedule_entry(&self, entry: &ScheduleEntry) -> Result<()> {
        let key = ScheduleSlotKey {
            schedule_id: entry.schedule_id,
            day_of_week: entry.day_of_week,
            period: entry.period,
            room_id: entry.room_id,
        };
        let row = FactScheduleEntry {
            id: key.fact_id(),
            schedule_id: entry.schedule_id,
            semester_id: entry.semester_id,
            teacher_id: entry.teacher_id,
            subject_id: entry.subject_id,
            room_id: entry.room_id,
            day_of_week: entry.day_of_week,
            period: entry.period,
            is_assigned: entry.is_assigned,
            created_at: self.clock.now(),
        };
        self.store.upsert_schedule_entry(&row).await
    }

    /// No upstream subject carries workload yet; exposed for direct loaders.
    pub async fn upsert_workload(
        &self,
        key: WorkloadKey,
        hours_per_week: f64,
        total_hours: f64,
    ) -> Result<()> {
        let row = FactWorkload {
            id: key.fact_id(),
            teacher_id: key.teacher_id,
            semester_id: key.semester_id,
            subject_id: key.subject_id,
            hours_per_week,
            total_hours,
            created_at: self.clock.now(),
        };
        self.store.upsert_workload(&row).await?;
        debug!(teacher_id = %key.teacher_id, subject_id = %key.subject_id, "Workload upserted");
        Ok(())
    }
}
