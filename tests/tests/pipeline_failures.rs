//! Failure paths: unavailable sources, panics, store errors, queue limits
//! and shutdown.

use engine_core::{Error, SourceTag, TaskStatus};
use integration_tests::fixtures::{self, DataDir, SOURCE_A_JSON};
use integration_tests::mocks::{LoadBehavior, MockSource};
use integration_tests::setup::{PoolOptions, TestContext, WAIT};
use std::sync::Arc;
use std::time::Duration;

/// Source B file is missing: the task fails and stores nothing.
#[tokio::test]
async fn test_missing_source_file_fails_task() {
    let ctx = TestContext::with_files(
        DataDir::with_documents(Some(SOURCE_A_JSON), None),
        PoolOptions::default(),
    );

    let report = ctx
        .run(fixtures::brand_submission("acme 2019-2021", 2019, 2021, &["Acme"]))
        .await;

    assert_eq!(report.task.status, TaskStatus::Failed);
    let reason = report.task.error.expect("failed task carries a reason");
    assert!(reason.contains("SRC_001"), "reason: {}", reason);
    assert!(reason.contains("source B"), "reason: {}", reason);
    assert!(report.records.is_empty());

    ctx.shutdown().await;
}

/// Both sources missing: source A is the one reported.
#[tokio::test]
async fn test_both_sources_missing_reports_source_a() {
    let ctx = TestContext::with_files(DataDir::with_documents(None, None), PoolOptions::default());

    let report = ctx.run(fixtures::submission("nothing", 2019, 2025)).await;

    assert_eq!(report.task.status, TaskStatus::Failed);
    let reason = report.task.error.unwrap_or_default();
    assert!(reason.contains("source A"), "reason: {}", reason);

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_document_fails_task() {
    let ctx = TestContext::with_files(
        DataDir::with_documents(Some("{ not json"), Some(fixtures::SOURCE_B_CSV)),
        PoolOptions::default(),
    );

    let report = ctx.run(fixtures::submission("broken a", 2019, 2025)).await;

    assert_eq!(report.task.status, TaskStatus::Failed);
    assert!(report.records.is_empty());

    ctx.shutdown().await;
}

/// A panicking load fails that task only; the worker keeps going.
#[tokio::test]
async fn test_worker_survives_panicking_source() {
    let source_a = MockSource::new(
        SourceTag::A,
        vec![fixtures::record("Acme", "2020-05-01", 20000.0, SourceTag::A)],
    );
    source_a.then(LoadBehavior::Panic("source exploded".into()));
    let source_b = MockSource::empty(SourceTag::B);
    let ctx = TestContext::with_sources(source_a.shared(), source_b.shared(), PoolOptions::default());

    let first = ctx.run(fixtures::submission("first", 2020, 2020)).await;
    assert_eq!(first.task.status, TaskStatus::Failed);
    let reason = first.task.error.unwrap_or_default();
    assert!(reason.contains("source exploded"), "reason: {}", reason);
    assert!(first.records.is_empty());

    let second = ctx.run(fixtures::submission("second", 2020, 2020)).await;
    assert_eq!(second.task.status, TaskStatus::Completed);
    assert_eq!(second.records.len(), 1);
    assert_eq!(source_a.load_count(), 2);

    ctx.shutdown().await;
}

/// A transient outage fails one task without affecting the next.
#[tokio::test]
async fn test_source_outage_is_per_task() {
    let source_a = MockSource::empty(SourceTag::A);
    let source_b = MockSource::new(
        SourceTag::B,
        vec![fixtures::record("Toyota", "2023-01-15", 18500.0, SourceTag::B)],
    );
    source_b.then(LoadBehavior::Unavailable("connection reset".into()));
    let ctx = TestContext::with_sources(source_a.shared(), source_b.shared(), PoolOptions::default());

    let first = ctx.run(fixtures::submission("during outage", 2023, 2023)).await;
    assert_eq!(first.task.status, TaskStatus::Failed);
    assert!(first
        .task
        .error
        .as_deref()
        .is_some_and(|r| r.contains("connection reset")));

    let second = ctx.run(fixtures::submission("after outage", 2023, 2023)).await;
    assert_eq!(second.task.status, TaskStatus::Completed);
    assert_eq!(second.records[0].record.company, "Toyota");

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_store_write_failure_fails_task() {
    let ctx = TestContext::with_files(DataDir::new(), PoolOptions::default());
    ctx.store.set_fail_appends(true);

    let report = ctx.run(fixtures::submission("all 2023", 2023, 2023)).await;

    assert_eq!(report.task.status, TaskStatus::Failed);
    let reason = report.task.error.unwrap_or_default();
    assert!(reason.contains("DB_001"), "reason: {}", reason);
    assert!(report.records.is_empty());
    assert_eq!(
        ctx.store.transitions_for(report.task.id),
        vec![TaskStatus::InProgress, TaskStatus::Failed]
    );

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_invalid_submission_is_rejected() {
    let ctx = TestContext::with_files(DataDir::new(), PoolOptions::default());

    let mut submission = fixtures::submission("bad price", 2020, 2021);
    submission.price_range = fixtures::price_range(Some(f64::INFINITY), None);
    let err = ctx.service.submit(submission).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let unnamed = fixtures::submission("", 2020, 2021);
    let err = ctx.service.submit(unnamed).await.unwrap_err();
    assert!(err.is_submission_error());

    assert!(ctx.service.list_tasks().await.unwrap().is_empty());

    ctx.shutdown().await;
}

/// A full queue refuses the submission and records the task as failed.
#[tokio::test]
async fn test_full_queue_fails_submission() {
    let options = PoolOptions {
        queue_capacity: Some(1),
        ..PoolOptions::default()
    };
    let ctx = TestContext::stopped(
        MockSource::empty(SourceTag::A).shared(),
        MockSource::empty(SourceTag::B).shared(),
        options,
        Arc::default(),
    );

    let accepted = ctx.submit(fixtures::submission("accepted", 2020, 2020)).await;
    let err = ctx
        .service
        .submit(fixtures::submission("refused", 2020, 2020))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueueFull { capacity: 1 }));

    let tasks = ctx.service.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 2);
    let refused = &tasks[1];
    assert_eq!(refused.status, TaskStatus::Failed);
    assert!(refused
        .error
        .as_deref()
        .is_some_and(|r| r.contains("QUEUE_001")));

    ctx.pool.start();
    let report = ctx.finish(accepted.id).await;
    assert_eq!(report.task.status, TaskStatus::Completed);

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_wait_for_unknown_task() {
    let ctx = TestContext::with_files(DataDir::new(), PoolOptions::default());
    let missing = engine_core::TaskId::new();

    let err = ctx.service.wait_for_terminal(missing, WAIT).await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(id) if id == missing));
    assert!(ctx.service.get_task(missing).await.unwrap().is_none());

    ctx.shutdown().await;
}

/// Shutdown lets the running task finish and leaves queued work pending.
#[tokio::test]
async fn test_shutdown_finishes_current_task() {
    let options = PoolOptions {
        simulated_latency: Duration::from_millis(200),
        ..PoolOptions::default()
    };
    let ctx = TestContext::with_files(DataDir::new(), options);

    let running = ctx.submit(fixtures::submission("running", 2023, 2023)).await;
    let queued = ctx.submit(fixtures::submission("queued", 2023, 2023)).await;

    let started = tokio::time::timeout(WAIT, async {
        while ctx.store.start_order().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "first task never started");

    ctx.shutdown().await;
    assert!(!ctx.pool.is_running());

    let running = ctx.service.get_task(running.id).await.unwrap().unwrap();
    assert_eq!(running.task.status, TaskStatus::Completed);
    assert_eq!(running.records.len(), 4);

    let queued = ctx.service.get_task(queued.id).await.unwrap().unwrap();
    assert_eq!(queued.task.status, TaskStatus::Pending);
}
