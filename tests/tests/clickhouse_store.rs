//! ClickHouse store tests.
//!
//! Require Docker (or `ANALYTICS_TEST_CLICKHOUSE_URL`), so they are ignored
//! by default: `cargo test -p integration-tests -- --ignored`.

use analytics_core::{
    AnalyticsStore, DashboardSummary, HeatmapCell, SemesterFilter, UtilizationStat, WorkloadKey,
    UNKNOWN_DEPARTMENT,
};
use integration_tests::containers::TestClickHouse;
use integration_tests::fixtures::{self, subject, Slot};
use std::sync::Arc;
use uuid::Uuid;
use worker::{Denormalizer, Disposition, EventRouter};

async fn router_over(ch: &TestClickHouse) -> (Arc<dyn AnalyticsStore>, EventRouter) {
    let store: Arc<dyn AnalyticsStore> = Arc::new(ch.store().await);
    let router = EventRouter::new(Denormalizer::new(store.clone()));
    (store, router)
}

async fn apply(router: &EventRouter, subject: &str, payload: &serde_json::Value) -> Disposition {
    router.route(subject, payload.to_string().as_bytes()).await
}

#[tokio::test]
#[ignore]
async fn test_clickhouse_ping_and_empty_reads() {
    let ch = TestClickHouse::start().await;
    let (store, _) = router_over(&ch).await;

    store.ping().await.expect("ping failed");
    assert_eq!(
        store.dashboard_summary().await.unwrap(),
        DashboardSummary::default()
    );
    assert!(store
        .utilization_stats(SemesterFilter::ALL)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.semester_name(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_clickhouse_upserts_collapse_per_key() {
    let ch = TestClickHouse::start().await;
    let (store, router) = router_over(&ch).await;

    let department = Uuid::new_v4();
    let teacher = Uuid::new_v4();
    apply(
        &router,
        subject::DEPARTMENT_CREATED,
        &fixtures::department(department, "CS", "CS"),
    )
    .await;
    for name in ["Draft Name", "Final Name"] {
        assert_eq!(
            apply(
                &router,
                subject::TEACHER_UPDATED,
                &fixtures::teacher(teacher, name, department, "CS"),
            )
            .await,
            Disposition::Applied
        );
    }

    let summary = store.dashboard_summary().await.unwrap();
    assert_eq!(summary.total_teachers, 1);
    assert_eq!(summary.total_departments, 1);

    let metrics = store.department_metrics().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].teacher_count, 1);
}

#[tokio::test]
#[ignore]
async fn test_clickhouse_schedule_aggregates_and_dangling_teacher() {
    let ch = TestClickHouse::start().await;
    let (store, router) = router_over(&ch).await;

    let department = Uuid::new_v4();
    let teacher = Uuid::new_v4();
    let semester = Uuid::new_v4();
    let schedule = Uuid::new_v4();

    apply(
        &router,
        subject::TEACHER_CREATED,
        &fixtures::teacher(teacher, "Niklaus Wirth", department, "CS"),
    )
    .await;
    apply(
        &router,
        subject::SEMESTER_CREATED,
        &fixtures::semester(semester, "Fall 2025"),
    )
    .await;
    let slots = [
        Slot::new(schedule, semester, teacher, 0, 1),
        Slot::new(schedule, semester, teacher, 0, 1),
        Slot::new(schedule, semester, teacher, 1, 2),
        Slot::new(schedule, semester, teacher, 1, 3).assigned(false),
    ];
    let batch = fixtures::schedule_generated(&slots);
    apply(&router, subject::SCHEDULE_GENERATED, &batch).await;
    // Redelivery must not add rows
    apply(&router, subject::SCHEDULE_GENERATED, &batch).await;

    let filter = SemesterFilter::semester(semester);
    assert_eq!(
        store.utilization_stats(filter).await.unwrap(),
        vec![UtilizationStat::new(department, "CS", semester, 3, 4)]
    );
    assert_eq!(
        store.schedule_heatmap(filter).await.unwrap(),
        vec![
            HeatmapCell {
                day_of_week: 0,
                period: 1,
                entry_count: 2
            },
            HeatmapCell {
                day_of_week: 1,
                period: 2,
                entry_count: 1
            },
            HeatmapCell {
                day_of_week: 1,
                period: 3,
                entry_count: 1
            },
        ]
    );
    let schedule_metrics = store.schedule_metrics(filter).await.unwrap();
    assert_eq!(schedule_metrics.len(), 1);
    assert_eq!(schedule_metrics[0].semester_name, "Fall 2025");
    assert_eq!(schedule_metrics[0].fill_rate, 75.0);

    apply(
        &router,
        subject::TEACHER_DELETED,
        &fixtures::teacher_deleted(teacher),
    )
    .await;
    let rows = store.utilization_stats(filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].department_name, UNKNOWN_DEPARTMENT);
    assert!(rows[0].department_id.is_nil());
}

#[tokio::test]
#[ignore]
async fn test_clickhouse_workload_with_missing_dimensions() {
    let ch = TestClickHouse::start().await;
    let (store, router) = router_over(&ch).await;

    let key = WorkloadKey {
        teacher_id: Uuid::new_v4(),
        semester_id: Uuid::new_v4(),
        subject_id: Uuid::new_v4(),
    };
    router
        .denormalizer()
        .upsert_workload(key, 2.0, 30.0)
        .await
        .unwrap();
    router
        .denormalizer()
        .upsert_workload(key, 4.0, 60.0)
        .await
        .unwrap();

    let rows = store
        .workload_stats(SemesterFilter::semester(key.semester_id))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_hours, 60.0);
    assert_eq!(rows[0].teacher_name, "");
    assert_eq!(rows[0].subject_code, "");
    assert!(rows[0].department_id.is_nil());
}
