//! In-process store with the same upsert/delete and query semantics as the
//! ClickHouse backend.
//!
//! Every operation takes the table lock once, which stands in for the
//! database's per-statement atomicity. Used for local runs without ClickHouse
//! and throughout the test suites.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    DashboardSummary, DepartmentMetric, DimDepartment, DimSemester, DimSubject, DimTeacher,
    FactScheduleEntry, FactWorkload, HeatmapCell, ScheduleMetric, ScheduleSlotKey,
    SemesterFilter, UtilizationStat, WorkloadKey, WorkloadStat, UNKNOWN_DEPARTMENT,
};
use crate::store::AnalyticsStore;

/// Full contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub teachers: BTreeMap<Uuid, DimTeacher>,
    pub departments: BTreeMap<Uuid, DimDepartment>,
    pub subjects: BTreeMap<Uuid, DimSubject>,
    pub semesters: BTreeMap<Uuid, DimSemester>,
    pub workload: BTreeMap<WorkloadKey, FactWorkload>,
    pub schedule: BTreeMap<ScheduleSlotKey, FactScheduleEntry>,
}

/// Lock-guarded star schema held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
    /// Number of upcoming writes that fail with a persistence error.
    failing_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with [`Error::Persistence`].
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, AtomicOrdering::SeqCst);
    }

    /// Clone of every table, for state comparisons.
    pub fn snapshot(&self) -> MemoryTables {
        self.tables.read().clone()
    }

    pub fn teacher(&self, teacher_id: Uuid) -> Option<DimTeacher> {
        self.tables.read().teachers.get(&teacher_id).cloned()
    }

    pub fn subject(&self, subject_id: Uuid) -> Option<DimSubject> {
        self.tables.read().subjects.get(&subject_id).cloned()
    }

    pub fn department(&self, department_id: Uuid) -> Option<DimDepartment> {
        self.tables.read().departments.get(&department_id).cloned()
    }

    pub fn semester(&self, semester_id: Uuid) -> Option<DimSemester> {
        self.tables.read().semesters.get(&semester_id).cloned()
    }

    pub fn schedule_entries(&self) -> Vec<FactScheduleEntry> {
        self.tables.read().schedule.values().cloned().collect()
    }

    pub fn workload_facts(&self) -> Vec<FactWorkload> {
        self.tables.read().workload.values().cloned().collect()
    }

    /// Consume one injected failure, if any.
    fn check_write(&self, op: &str) -> Result<()> {
        let injected = self
            .failing_writes
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if injected {
            Err(Error::persistence(format!("{}: injected write failure", op)))
        } else {
            Ok(())
        }
    }
}

/// Known department names sort first, alphabetically; unknown ones last.
fn cmp_optional_name(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert_teacher(&self, teacher: &DimTeacher) -> Result<()> {
        self.check_write("upsert teacher")?;
        self.tables
            .write()
            .teachers
            .insert(teacher.teacher_id, teacher.clone());
        Ok(())
    }

    async fn delete_teacher(&self, teacher_id: Uuid) -> Result<()> {
        self.check_write("delete teacher")?;
        self.tables.write().teachers.remove(&teacher_id);
        Ok(())
    }

    async fn upsert_department(&self, department: &DimDepartment) -> Result<()> {
        self.check_write("upsert department")?;
        self.tables
            .write()
            .departments
            .insert(department.department_id, department.clone());
        Ok(())
    }

    async fn upsert_subject(&self, subject: &DimSubject) -> Result<()> {
        self.check_write("upsert subject")?;
        self.tables
            .write()
            .subjects
            .insert(subject.subject_id, subject.clone());
        Ok(())
    }

    async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
        self.check_write("delete subject")?;
        self.tables.write().subjects.remove(&subject_id);
        Ok(())
    }

    async fn upsert_semester(&self, semester: &DimSemester) -> Result<()> {
        self.check_write("upsert semester")?;
        self.tables
            .write()
            .semesters
            .insert(semester.semester_id, semester.clone());
        Ok(())
    }

    async fn upsert_workload(&self, workload: &FactWorkload) -> Result<()> {
        self.check_write("upsert workload")?;
        let mut tables = self.tables.write();
        tables
            .workload
            .entry(workload.key())
            .and_modify(|row| {
                row.hours_per_week = workload.hours_per_week;
                row.total_hours = workload.total_hours;
            })
            .or_insert_with(|| workload.clone());
        Ok(())
    }

    async fn upsert_schedule_entry(&self, entry: &FactScheduleEntry) -> Result<()> {
        self.check_write("upsert schedule entry")?;
        let mut tables = self.tables.write();
        tables
            .schedule
            .entry(entry.key())
            .and_modify(|row| {
                row.semester_id = entry.semester_id;
                row.teacher_id = entry.teacher_id;
                row.subject_id = entry.subject_id;
                row.is_assigned = entry.is_assigned;
            })
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn workload_stats(&self, filter: SemesterFilter) -> Result<Vec<WorkloadStat>> {
        let tables = self.tables.read();

        let mut stats: Vec<WorkloadStat> = tables
            .workload
            .values()
            .filter(|w| filter.matches(w.semester_id))
            .map(|w| {
                let teacher = tables.teachers.get(&w.teacher_id);
                let subject = tables.subjects.get(&w.subject_id);
                WorkloadStat {
                    teacher_id: w.teacher_id,
                    teacher_name: teacher.map(|t| t.full_name.clone()).unwrap_or_default(),
                    department_id: teacher.map(|t| t.department_id).unwrap_or_else(Uuid::nil),
                    department_name: teacher
                        .map(|t| t.department_name.clone())
                        .unwrap_or_default(),
                    semester_id: w.semester_id,
                    subject_id: w.subject_id,
                    subject_code: subject.map(|s| s.code.clone()).unwrap_or_default(),
                    hours_per_week: w.hours_per_week,
                    total_hours: w.total_hours,
                }
            })
            .collect();

        stats.sort_by(|a, b| b.total_hours.total_cmp(&a.total_hours));
        Ok(stats)
    }

    async fn utilization_stats(&self, filter: SemesterFilter) -> Result<Vec<UtilizationStat>> {
        let tables = self.tables.read();

        // (department of the referenced teacher, semester) -> (assigned, total)
        let mut groups: BTreeMap<(Option<(String, Uuid)>, Uuid), (u64, u64)> = BTreeMap::new();
        for entry in tables.schedule.values() {
            if !filter.matches(entry.semester_id) {
                continue;
            }
            let department = tables
                .teachers
                .get(&entry.teacher_id)
                .map(|t| (t.department_name.clone(), t.department_id));
            let counts = groups.entry((department, entry.semester_id)).or_default();
            if entry.is_assigned {
                counts.0 += 1;
            }
            counts.1 += 1;
        }

        let mut rows: Vec<(Option<String>, UtilizationStat)> = groups
            .into_iter()
            .map(|((department, semester_id), (assigned, total))| match department {
                Some((name, id)) => (
                    Some(name.clone()),
                    UtilizationStat::new(id, name, semester_id, assigned, total),
                ),
                None => (
                    None,
                    UtilizationStat::new(
                        Uuid::nil(),
                        UNKNOWN_DEPARTMENT,
                        semester_id,
                        assigned,
                        total,
                    ),
                ),
            })
            .collect();

        rows.sort_by(|(a_name, a), (b_name, b)| {
            cmp_optional_name(a_name, b_name)
                .then_with(|| a.semester_id.cmp(&b.semester_id))
                .then_with(|| a.department_id.cmp(&b.department_id))
        });
        Ok(rows.into_iter().map(|(_, stat)| stat).collect())
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let tables = self.tables.read();
        Ok(DashboardSummary {
            total_teachers: tables.teachers.len() as u64,
            total_departments: tables.departments.len() as u64,
            total_subjects: tables.subjects.len() as u64,
            total_semesters: tables.semesters.len() as u64,
        })
    }

    async fn department_metrics(&self) -> Result<Vec<DepartmentMetric>> {
        let tables = self.tables.read();

        let mut metrics: Vec<DepartmentMetric> = tables
            .departments
            .values()
            .map(|d| DepartmentMetric {
                department_id: d.department_id,
                department_name: d.name.clone(),
                teacher_count: tables
                    .teachers
                    .values()
                    .filter(|t| t.department_id == d.department_id)
                    .count() as u64,
                subject_count: tables
                    .subjects
                    .values()
                    .filter(|s| s.department_id == d.department_id)
                    .count() as u64,
            })
            .collect();

        metrics.sort_by(|a, b| {
            a.department_name
                .cmp(&b.department_name)
                .then_with(|| a.department_id.cmp(&b.department_id))
        });
        Ok(metrics)
    }

    async fn schedule_metrics(&self, filter: SemesterFilter) -> Result<Vec<ScheduleMetric>> {
        let tables = self.tables.read();

        let mut groups: BTreeMap<Uuid, (u64, u64)> = BTreeMap::new();
        for entry in tables.schedule.values() {
            if !filter.matches(entry.semester_id) {
                continue;
            }
            let counts = groups.entry(entry.semester_id).or_default();
            if entry.is_assigned {
                counts.0 += 1;
            }
            counts.1 += 1;
        }

        let mut rows: Vec<(Option<String>, ScheduleMetric)> = groups
            .into_iter()
            .map(|(semester_id, (assigned, total))| {
                let name = tables.semesters.get(&semester_id).map(|s| s.name.clone());
                let metric = ScheduleMetric::new(
                    semester_id,
                    name.clone().unwrap_or_default(),
                    assigned,
                    total,
                );
                (name, metric)
            })
            .collect();

        rows.sort_by(|(a_name, a), (b_name, b)| {
            cmp_optional_name(a_name, b_name).then_with(|| a.semester_id.cmp(&b.semester_id))
        });
        Ok(rows.into_iter().map(|(_, metric)| metric).collect())
    }

    async fn schedule_heatmap(&self, filter: SemesterFilter) -> Result<Vec<HeatmapCell>> {
        let tables = self.tables.read();

        let mut cells: BTreeMap<(i32, i32), u64> = BTreeMap::new();
        for entry in tables.schedule.values() {
            if filter.matches(entry.semester_id) {
                *cells.entry((entry.day_of_week, entry.period)).or_default() += 1;
            }
        }

        Ok(cells
            .into_iter()
            .map(|((day_of_week, period), entry_count)| HeatmapCell {
                day_of_week,
                period,
                entry_count,
            })
            .collect())
    }

    async fn semester_name(&self, semester_id: Uuid) -> Result<Option<String>> {
        Ok(self
            .tables
            .read()
            .semesters
            .get(&semester_id)
            .map(|s| s.name.clone()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
