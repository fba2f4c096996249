//! Integration tests for the refresh scheduler.

use super::helpers::{Harness, harness, local_service};
use console_sync::errors::{ApiError, ErrorKind};
use console_sync::loading::LoadingKey;
use console_sync::notify::NotificationLevel;
use console_sync::registry::adapters::ApiOperation;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

fn seeded(harness: Harness) -> Harness {
    harness
        .api
        .seed_services(vec![
            local_service("svc1", "healthy"),
            local_service("svc2", "warning"),
        ])
        .expect("seeding should succeed");
    harness
        .api
        .seed_system(json!({"cpu": 12.5, "memory": 40}), json!({"healthy": 1}))
        .expect("seeding should succeed");
    harness
}

#[rstest]
#[tokio::test]
async fn refresh_fans_out_and_notifies_once(harness: Harness) {
    let harness = seeded(harness);
    let scheduler = harness.console.scheduler();

    let report = scheduler
        .refresh_all()
        .await
        .expect("refresh should not be skipped");

    assert!(report.is_complete());
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);
    assert_eq!(harness.api.calls(ApiOperation::CheckServices), 1);
    assert_eq!(harness.api.calls(ApiOperation::SystemResources), 1);
    assert_eq!(harness.console.services().services().len(), 2);
    assert_eq!(
        harness
            .console
            .system()
            .resources()
            .map(|snapshot| snapshot.data),
        Some(json!({"cpu": 12.5, "memory": 40}))
    );
    let entries = harness.console.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert!(entries.first().is_some_and(|entry| {
        entry.notification().level() == NotificationLevel::Success
            && entry.notification().message() == "all data refreshed"
    }));
    assert!(!scheduler.is_refreshing());
    assert!(!harness.console.loading().get_loading(&LoadingKey::Refreshing));
}

#[rstest]
#[tokio::test]
async fn overlapping_refreshes_are_skipped(harness: Harness) {
    let harness = seeded(harness);
    harness
        .api
        .set_latency(Duration::from_millis(20))
        .expect("latency should be set");
    let scheduler = harness.console.scheduler();

    let (first, second) = tokio::join!(scheduler.refresh_all(), scheduler.refresh_all());

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);
}

#[rstest]
#[tokio::test]
async fn failed_branches_are_summarised_as_a_warning(harness: Harness) {
    let harness = seeded(harness);
    harness
        .api
        .fail_next(
            ApiOperation::SystemResources,
            ApiError::no_response("connection refused", false),
        )
        .expect("failure should be scripted");
    harness
        .api
        .fail_next(
            ApiOperation::CheckServices,
            ApiError::no_response("connection refused", false),
        )
        .expect("failure should be scripted");

    let report = harness
        .console
        .scheduler()
        .refresh_all()
        .await
        .expect("refresh should not be skipped");

    assert!(report.services);
    assert!(!report.health);
    assert!(!report.resources);
    assert_eq!(report.failed_count(), 2);
    let errors = harness.console.errors();
    assert_eq!(errors.errors_by_kind(ErrorKind::RefreshError).len(), 1);
    assert_eq!(errors.errors_by_kind(ErrorKind::HealthCheckError).len(), 1);
    assert_eq!(errors.errors_by_kind(ErrorKind::FetchError).len(), 1);
    let entries = harness.console.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert!(entries.first().is_some_and(|entry| {
        entry.notification().level() == NotificationLevel::Warning
            && entry.notification().message().starts_with("2 of 3")
    }));
    assert_eq!(harness.console.services().services().len(), 2);
}

#[rstest]
#[tokio::test]
async fn failed_fetches_keep_stale_data_and_notify_once(harness: Harness) {
    let harness = seeded(harness);
    harness
        .console
        .services()
        .fetch_services(false)
        .await
        .expect("initial fetch should succeed");
    for operation in [ApiOperation::ListServices, ApiOperation::SystemResources] {
        harness
            .api
            .fail_next(operation, ApiError::no_response("connection refused", false))
            .expect("failure should be scripted");
    }

    let report = harness
        .console
        .scheduler()
        .refresh_all()
        .await
        .expect("refresh should not be skipped");

    assert!(!report.services);
    assert!(report.health);
    assert!(!report.resources);
    assert_eq!(report.failed_count(), 2);
    let errors = harness.console.errors();
    assert_eq!(errors.errors_by_kind(ErrorKind::FetchError).len(), 2);
    assert_eq!(errors.errors_by_kind(ErrorKind::RefreshError).len(), 1);
    let entries = harness.console.notifications().entries();
    assert_eq!(entries.len(), 1);
    assert!(entries.first().is_some_and(|entry| {
        entry.notification().level() == NotificationLevel::Warning
            && entry.notification().message().starts_with("2 of 3")
    }));
    assert_eq!(harness.console.services().services().len(), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn auto_refresh_runs_on_the_interval_until_stopped(harness: Harness) {
    let harness = seeded(harness);
    let scheduler = harness.console.scheduler();

    assert!(scheduler.start_auto_refresh(Duration::from_secs(60)));
    assert!(!scheduler.start_auto_refresh(Duration::from_secs(60)));
    assert!(scheduler.is_auto_refreshing());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);

    scheduler.stop_auto_refresh();
    scheduler.stop_auto_refresh();
    assert!(!scheduler.is_auto_refreshing());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);

    assert!(scheduler.start_auto_refresh(Duration::from_secs(60)));
    scheduler.stop_auto_refresh();
}

#[rstest]
#[tokio::test]
async fn zero_interval_is_rejected(harness: Harness) {
    let scheduler = harness.console.scheduler();

    assert!(!scheduler.start_auto_refresh(Duration::ZERO));
    assert!(!scheduler.is_auto_refreshing());
}

#[rstest]
#[tokio::test]
async fn health_summary_failures_keep_the_previous_snapshot(harness: Harness) {
    let harness = seeded(harness);
    let system = harness.console.system();
    let first = system
        .fetch_health_summary()
        .await
        .expect("summary should load");
    harness
        .api
        .fail_next(
            ApiOperation::HealthSummary,
            ApiError::no_response("connection reset", false),
        )
        .expect("failure should be scripted");

    assert!(system.fetch_health_summary().await.is_none());

    assert_eq!(first, json!({"healthy": 1}));
    assert_eq!(
        system.health_summary().map(|snapshot| snapshot.data),
        Some(json!({"healthy": 1}))
    );
    assert_eq!(harness.api.calls(ApiOperation::HealthSummary), 2);
}
