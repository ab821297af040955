//! Mock implementations for testing.
//!
//! `MockConnector` stands in for the Redpanda connector: topics are in-memory
//! logs, and every subscription reads its topic through the real
//! `DeliveryTracker` and `SubjectPattern`, so ack, nak and redelivery behave
//! exactly as in production. `FlakyStore` wraps `MemoryStore` with switchable
//! failures.

use analytics_core::{
    AnalyticsStore, DashboardSummary, DepartmentMetric, DimDepartment, DimSemester, DimSubject,
    DimTeacher, Error, FactScheduleEntry, FactWorkload, HeatmapCell, MemoryStore, Result,
    ScheduleMetric, SemesterFilter, UtilizationStat, WorkloadStat,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use redpanda::{
    BusMessage, DeliveryTracker, MessageSource, NakOutcome, SubjectPattern, SubscriptionFactory,
    TopicGroup,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Bus
// =============================================================================

/// In-memory append-only topic.
#[derive(Clone, Default)]
pub struct MockTopic {
    records: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockTopic {
    /// Append a JSON payload; returns its offset.
    pub fn publish(&self, subject: &str, payload: &serde_json::Value) -> i64 {
        self.publish_raw(subject, payload.to_string().into_bytes())
    }

    pub fn publish_raw(&self, subject: &str, payload: impl Into<Vec<u8>>) -> i64 {
        let mut records = self.records.lock();
        records.push((subject.to_string(), payload.into()));
        records.len() as i64 - 1
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, offset: i64) -> Option<(String, Vec<u8>)> {
        usize::try_from(offset)
            .ok()
            .and_then(|i| self.records.lock().get(i).cloned())
    }
}

/// Pull subscription over a [`MockTopic`].
pub struct MockBus {
    group: TopicGroup,
    pattern: SubjectPattern,
    topic: MockTopic,
    tracker: DeliveryTracker,
    fetch_failures: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl MockBus {
    pub fn new(group: TopicGroup, topic: MockTopic, max_deliveries: u32) -> Result<Self> {
        Ok(Self {
            pattern: group.pattern()?,
            group,
            topic,
            tracker: DeliveryTracker::new(0, max_deliveries),
            fetch_failures: Arc::new(AtomicUsize::new(0)),
            resets: Arc::new(AtomicUsize::new(0)),
        })
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl MessageSource for MockBus {
    fn group(&self) -> &TopicGroup {
        &self.group
    }

    async fn fetch(&mut self, max: usize, wait: Duration) -> Result<Vec<BusMessage>> {
        if take_one(&self.fetch_failures) {
            return Err(Error::connection("mock fetch failure"));
        }

        let mut batch = self.tracker.take_redeliveries(max);
        if !batch.is_empty() {
            return Ok(batch);
        }

        while batch.len() < max {
            let offset = self.tracker.cursor();
            let Some((subject, payload)) = self.topic.read(offset) else {
                break;
            };
            if self.pattern.matches(&subject) {
                batch.push(self.tracker.deliver(BusMessage::new(subject, payload, offset)));
            } else {
                self.tracker.skip(offset);
            }
        }

        if batch.is_empty() {
            tokio::time::sleep(wait).await;
        }
        Ok(batch)
    }

    async fn ack(&mut self, message: &BusMessage) -> Result<()> {
        self.tracker.ack(message.offset);
        Ok(())
    }

    async fn nak(&mut self, message: &BusMessage) -> Result<NakOutcome> {
        Ok(self.tracker.nak(message.offset))
    }

    async fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn committed_offset(&self) -> i64 {
        self.tracker.committed_offset()
    }

    fn pending_redeliveries(&self) -> usize {
        self.tracker.pending_redeliveries()
    }
}

/// Subscription factory over in-memory topics.
#[derive(Default)]
pub struct MockConnector {
    topics: Mutex<HashMap<String, MockTopic>>,
    unavailable: Mutex<HashSet<String>>,
    fetch_failures: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    subscriptions: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topic by name, created on first use.
    pub fn topic(&self, name: &str) -> MockTopic {
        self.topics.lock().entry(name.to_string()).or_default().clone()
    }

    /// Refuse subscriptions for this group.
    pub fn set_unavailable(&self, group: &str) {
        self.unavailable.lock().insert(group.to_string());
    }

    pub fn set_available(&self, group: &str) {
        self.unavailable.lock().remove(group);
    }

    /// Make the next `n` fetches (across all subscriptions) fail.
    pub fn fail_next_fetches(&self, n: usize) {
        self.fetch_failures.store(n, Ordering::SeqCst);
    }

    /// Connection resets requested by consumers.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Subscriptions opened so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionFactory for MockConnector {
    async fn subscribe(
        &self,
        group: &TopicGroup,
        max_redeliveries: u32,
    ) -> Result<Box<dyn MessageSource>> {
        if self.unavailable.lock().contains(&group.name) {
            return Err(Error::connection(format!("{} unavailable", group.name)));
        }

        let mut bus = MockBus::new(group.clone(), self.topic(&group.topic), max_redeliveries)?;
        bus.fetch_failures = self.fetch_failures.clone();
        bus.resets = self.resets.clone();
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(bus))
    }
}

// =============================================================================
// Store
// =============================================================================

/// `MemoryStore` whose writes or reads can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Delay every read by `delay`.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
    }

    fn write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::persistence("flaky store: write refused"))
        } else {
            Ok(())
        }
    }

    async fn read(&self) -> Result<()> {
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(Error::query("flaky store: read refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AnalyticsStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn upsert_teacher(&self, teacher: &DimTeacher) -> Result<()> {
        self.write()?;
        self.inner.upsert_teacher(teacher).await
    }

    async fn delete_teacher(&self, teacher_id: uuid::Uuid) -> Result<()> {
        self.write()?;
        self.inner.delete_teacher(teacher_id).await
    }

    async fn upsert_department(&self, department: &DimDepartment) -> Result<()> {
        self.write()?;
        self.inner.upsert_department(department).await
    }

    async fn upsert_subject(&self, subject: &DimSubject) -> Result<()> {
        self.write()?;
        self.inner.upsert_subject(subject).await
    }

    async fn delete_subject(&self, subject_id: uuid::Uuid) -> Result<()> {
        self.write()?;
        self.inner.delete_subject(subject_id).await
    }

    async fn upsert_semester(&self, semester: &DimSemester) -> Result<()> {
        self.write()?;
        self.inner.upsert_semester(semester).await
    }

    async fn upsert_workload(&self, workload: &FactWorkload) -> Result<()> {
        self.write()?;
        self.inner.upsert_workload(workload).await
    }

    async fn upsert_schedule_entry(&self, entry: &FactScheduleEntry) -> Result<()> {
        self.write()?;
        self.inner.upsert_schedule_entry(entry).await
    }

    async fn workload_stats(&self, filter: SemesterFilter) -> Result<Vec<WorkloadStat>> {
        self.read().await?;
        self.inner.workload_stats(filter).await
    }

    async fn utilization_stats(&self, filter: SemesterFilter) -> Result<Vec<UtilizationStat>> {
        self.read().await?;
        self.inner.utilization_stats(filter).await
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        self.read().await?;
        self.inner.dashboard_summary().await
    }

    async fn department_metrics(&self) -> Result<Vec<DepartmentMetric>> {
        self.read().await?;
        self.inner.department_metrics().await
    }

    async fn schedule_metrics(&self, filter: SemesterFilter) -> Result<Vec<ScheduleMetric>> {
        self.read().await?;
        self.inner.schedule_metrics(filter).await
    }

    async fn schedule_heatmap(&self, filter: SemesterFilter) -> Result<Vec<HeatmapCell>> {
        self.read().await?;
        self.inner.schedule_heatmap(filter).await
    }

    async fn semester_name(&self, semester_id: uuid::Uuid) -> Result<Option<String>> {
        self.read().await?;
        self.inner.semester_name(semester_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr_group() -> TopicGroup {
        TopicGroup::new("hr", "hr-events", "hr.>")
    }

    #[tokio::test]
    async fn test_mock_bus_filters_by_subject_pattern() {
        let topic = MockTopic::default();
        topic.publish_raw("hr.teacher.created", "{}");
        topic.publish_raw("payroll.closed", "{}");
        topic.publish_raw("hr.department.updated", "{}");

        let mut bus = MockBus::new(hr_group(), topic, 5).unwrap();
        let batch = bus.fetch(10, Duration::from_millis(1)).await.unwrap();

        let subjects: Vec<&str> = batch.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["hr.teacher.created", "hr.department.updated"]);
        assert_eq!(batch[1].offset, 2);
    }

    #[tokio::test]
    async fn test_mock_bus_serves_redeliveries_first() {
        let topic = MockTopic::default();
        topic.publish_raw("hr.teacher.created", "{}");

        let mut bus = MockBus::new(hr_group(), topic.clone(), 5).unwrap();
        let first = bus.fetch(10, Duration::from_millis(1)).await.unwrap();
        bus.nak(&first[0]).await.unwrap();

        topic.publish_raw("hr.teacher.updated", "{}");
        let second = bus.fetch(10, Duration::from_millis(1)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].offset, 0);
        assert_eq!(second[0].delivery_count, 2);
    }

    #[tokio::test]
    async fn test_connector_refuses_unavailable_group() {
        let connector = MockConnector::new();
        connector.set_unavailable("hr");
        assert!(connector.subscribe(&hr_group(), 5).await.is_err());

        connector.set_available("hr");
        assert!(connector.subscribe(&hr_group(), 5).await.is_ok());
        assert_eq!(connector.subscriptions(), 1);
    }
}
