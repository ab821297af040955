//! Supervised consumers over mock topics.
//!
//! Messages go through the real supervisor, consumer loop, router and
//! denormalizer; only the bus transport and the store are replaced.

use integration_tests::fixtures::{self, subject, Slot};
use integration_tests::setup::{eventually, fast_bus_config, TestIngestion};
use redpanda::{group, topic, BusConfig};
use std::time::Duration;
use uuid::Uuid;
use worker::{WorkerState, WorkerStatus};

const WAIT: Duration = Duration::from_secs(5);

fn status_of(ingestion: &TestIngestion, name: &str) -> Option<WorkerStatus> {
    ingestion
        .supervisor
        .status()
        .into_iter()
        .find(|s| s.group == name)
}

#[tokio::test]
async fn test_events_flow_from_every_topic_group() {
    let ingestion = TestIngestion::new();
    assert_eq!(ingestion.supervisor.start_all().await, 3);

    let department = Uuid::new_v4();
    let teacher = Uuid::new_v4();
    let course = Uuid::new_v4();
    let semester = Uuid::new_v4();

    let hr = ingestion.topic(topic::HR);
    hr.publish(
        subject::DEPARTMENT_CREATED,
        &fixtures::department(department, "CS", "CS"),
    );
    hr.publish(
        subject::TEACHER_CREATED,
        &fixtures::teacher(teacher, "Donald Knuth", department, "CS"),
    );
    ingestion.topic(topic::SUBJECT).publish(
        subject::SUBJECT_CREATED,
        &fixtures::subject_changed(course, "Algorithms", "CS201", department),
    );
    let timetable = ingestion.topic(topic::TIMETABLE);
    timetable.publish(
        subject::SEMESTER_CREATED,
        &fixtures::semester(semester, "Fall 2025"),
    );
    timetable.publish(
        subject::SCHEDULE_GENERATED,
        &fixtures::schedule_generated(&[
            Slot::new(Uuid::new_v4(), semester, teacher, 0, 0),
            Slot::new(Uuid::new_v4(), semester, teacher, 0, 1).assigned(false),
        ]),
    );

    let memory = ingestion.memory().clone();
    assert!(
        eventually(WAIT, || {
            let tables = memory.snapshot();
            tables.teachers.len() == 1
                && tables.departments.len() == 1
                && tables.subjects.len() == 1
                && tables.semesters.len() == 1
                && tables.schedule.len() == 2
        })
        .await,
        "every group should have been consumed"
    );

    let utilization = ingestion
        .queries
        .utilization_stats(semester.into())
        .await
        .unwrap();
    assert_eq!(utilization.len(), 1);
    assert_eq!(utilization[0].department_name, "CS");
    assert_eq!(utilization[0].utilization_pct, 50.0);

    assert!(
        eventually(WAIT, || {
            status_of(&ingestion, group::TIMETABLE).is_some_and(|s| s.committed_offset == 2)
        })
        .await
    );

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_failed_write_is_redelivered_until_it_succeeds() {
    let ingestion = TestIngestion::with_bus(BusConfig {
        max_redeliveries: 10_000,
        ..fast_bus_config()
    });
    ingestion.store.set_fail_writes(true);
    ingestion.supervisor.start_all().await;

    let teacher = Uuid::new_v4();
    ingestion.topic(topic::HR).publish(
        subject::TEACHER_CREATED,
        &fixtures::teacher(teacher, "Barbara Liskov", Uuid::new_v4(), "CS"),
    );

    // Message keeps coming back while the store refuses writes
    assert!(
        eventually(WAIT, || {
            status_of(&ingestion, group::HR).is_some_and(|s| s.processed >= 3)
        })
        .await
    );
    assert!(ingestion.memory().teacher(teacher).is_none());
    assert_eq!(
        status_of(&ingestion, group::HR).unwrap().committed_offset,
        0,
        "unsettled message must hold the committed offset"
    );

    ingestion.store.set_fail_writes(false);
    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.teacher(teacher).is_some()).await);
    assert!(
        eventually(WAIT, || {
            status_of(&ingestion, group::HR).is_some_and(|s| s.committed_offset == 1)
        })
        .await
    );

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_message_dropped_after_delivery_limit() {
    let ingestion = TestIngestion::new();
    ingestion.store.set_fail_writes(true);
    ingestion.supervisor.start_all().await;

    let hr = ingestion.topic(topic::HR);
    let lost = Uuid::new_v4();
    hr.publish(
        subject::TEACHER_CREATED,
        &fixtures::teacher(lost, "Lost Update", Uuid::new_v4(), "CS"),
    );

    // Three deliveries, then the message is settled without being applied
    assert!(
        eventually(WAIT, || {
            status_of(&ingestion, group::HR)
                .is_some_and(|s| s.committed_offset == 1 && s.pending_redeliveries == 0)
        })
        .await
    );
    assert_eq!(status_of(&ingestion, group::HR).unwrap().processed, 3);

    ingestion.store.set_fail_writes(false);
    let next = Uuid::new_v4();
    hr.publish(
        subject::TEACHER_CREATED,
        &fixtures::teacher(next, "Next Update", Uuid::new_v4(), "CS"),
    );

    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.teacher(next).is_some()).await);
    assert!(memory.teacher(lost).is_none());

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_fetch_failures_reset_and_resume() {
    let ingestion = TestIngestion::new();
    ingestion.connector.fail_next_fetches(2);
    ingestion.supervisor.start_all().await;

    let course = Uuid::new_v4();
    ingestion.topic(topic::SUBJECT).publish(
        subject::SUBJECT_CREATED,
        &fixtures::subject_changed(course, "Databases", "CS301", Uuid::new_v4()),
    );

    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.subject(course).is_some()).await);

    let connector = ingestion.connector.clone();
    assert!(eventually(WAIT, || connector.resets() == 2).await);
    assert!(ingestion
        .supervisor
        .status()
        .iter()
        .all(|s| s.state == WorkerState::Running));

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_foreign_and_unknown_subjects_are_settled() {
    let ingestion = TestIngestion::new();
    ingestion.supervisor.start_all().await;

    let hr = ingestion.topic(topic::HR);
    let teacher = Uuid::new_v4();
    hr.publish_raw("payroll.run.closed", r#"{"run":1}"#);
    hr.publish(
        "hr.contract.signed",
        &serde_json::json!({ "teacher_id": teacher.to_string() }),
    );
    hr.publish_raw(subject::TEACHER_UPDATED, "{broken");
    hr.publish(
        subject::TEACHER_UPDATED,
        &fixtures::teacher(teacher, "Frances Allen", Uuid::new_v4(), "CS"),
    );

    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.teacher(teacher).is_some()).await);
    assert!(
        eventually(WAIT, || {
            status_of(&ingestion, group::HR)
                .is_some_and(|s| s.committed_offset == 4 && s.pending_redeliveries == 0)
        })
        .await
    );
    // The foreign subject never reaches the router
    assert_eq!(status_of(&ingestion, group::HR).unwrap().processed, 3);

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_unavailable_group_is_skipped() {
    let ingestion = TestIngestion::new();
    ingestion.connector.set_unavailable(group::SUBJECT);

    assert_eq!(ingestion.supervisor.start_all().await, 2);
    let mut running: Vec<String> = ingestion
        .supervisor
        .status()
        .into_iter()
        .map(|s| s.group)
        .collect();
    running.sort();
    assert_eq!(running, vec![group::HR, group::TIMETABLE]);

    let semester = Uuid::new_v4();
    ingestion.topic(topic::TIMETABLE).publish(
        subject::SEMESTER_CREATED,
        &fixtures::semester(semester, "Spring 2026"),
    );
    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.semester(semester).is_some()).await);

    ingestion.connector.set_available(group::SUBJECT);
    ingestion.supervisor.restart(group::SUBJECT).await.unwrap();
    assert_eq!(ingestion.supervisor.status().len(), 3);

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_stop_and_restart_single_group() {
    let ingestion = TestIngestion::new();
    ingestion.supervisor.start_all().await;
    assert_eq!(ingestion.connector.subscriptions(), 3);

    ingestion.supervisor.stop(group::HR).await.unwrap();
    assert!(status_of(&ingestion, group::HR).is_none());
    assert!(ingestion.supervisor.stop(group::HR).await.is_err());

    let teacher = Uuid::new_v4();
    ingestion.topic(topic::HR).publish(
        subject::TEACHER_CREATED,
        &fixtures::teacher(teacher, "John Backus", Uuid::new_v4(), "CS"),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ingestion.memory().teacher(teacher).is_none());

    ingestion.supervisor.restart(group::HR).await.unwrap();
    assert_eq!(ingestion.connector.subscriptions(), 4);

    let memory = ingestion.memory().clone();
    assert!(eventually(WAIT, || memory.teacher(teacher).is_some()).await);
    assert!(ingestion.supervisor.restart("analytics-payroll").await.is_err());

    ingestion.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_every_consumer() {
    let ingestion = TestIngestion::new();
    ingestion.supervisor.start_all().await;
    let token = ingestion.supervisor.shutdown_token();

    ingestion.supervisor.shutdown().await;

    assert!(token.is_cancelled());
    assert!(ingestion.supervisor.status().is_empty());
    assert!(ingestion
        .supervisor
        .start_group(redpanda::default_groups().remove(0))
        .await
        .is_err());
}
