//! Unit tests for the error aggregator.

use super::*;
use crate::notify::NotificationLevel;
use crate::test_support::{ManualClock, RecordingNotifier};
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    aggregator: ErrorAggregator<ManualClock>,
    notifier: Arc<RecordingNotifier>,
}

fn harness_with(config: ErrorAggregatorConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let aggregator = ErrorAggregator::new(Arc::new(ManualClock::new()), config)
        .with_notifier(notifier.clone());
    Harness {
        aggregator,
        notifier,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(ErrorAggregatorConfig::default())
}

#[rstest]
fn oldest_records_are_evicted_beyond_capacity(harness: Harness) {
    for index in 0..150 {
        harness
            .aggregator
            .add_error(format!("failure {index}"), ErrorContext::new().silent());
    }

    let errors = harness.aggregator.errors();
    assert_eq!(errors.len(), 100);
    assert_eq!(errors.first().map(ErrorRecord::message), Some("failure 50"));
    assert_eq!(errors.last().map(ErrorRecord::message), Some("failure 149"));
}

#[rstest]
fn recent_errors_returns_five_newest_first(harness: Harness) {
    for index in 0..8 {
        harness
            .aggregator
            .add_error(format!("failure {index}"), ErrorContext::new());
    }

    let recent: Vec<String> = harness
        .aggregator
        .recent_errors()
        .iter()
        .map(|record| record.message().to_owned())
        .collect();
    assert_eq!(
        recent,
        vec!["failure 7", "failure 6", "failure 5", "failure 4", "failure 3"]
    );
}

#[rstest]
fn recent_errors_never_exceeds_log_length(harness: Harness) {
    harness.aggregator.add_error("only one", ErrorContext::new());
    assert_eq!(harness.aggregator.recent_errors().len(), 1);
}

#[rstest]
fn ids_are_monotonic(harness: Harness) {
    let first = harness.aggregator.add_error("a", ErrorContext::new());
    let second = harness.aggregator.add_error("b", ErrorContext::new());
    assert!(second.id() > first.id());
}

#[rstest]
fn clearing_by_kind_moves_last_error_to_newest_survivor(harness: Harness) {
    harness.aggregator.add_error(
        "list failed",
        ErrorContext::scoped(ErrorKind::FetchError, "services"),
    );
    harness.aggregator.add_error(
        "delete failed",
        ErrorContext::scoped(ErrorKind::DeleteError, "services"),
    );

    assert_eq!(
        harness.aggregator.clear_errors_by_kind(ErrorKind::DeleteError),
        1
    );
    let last = harness.aggregator.last_error().expect("a record should survive");
    assert_eq!(last.message(), "list failed");

    harness.aggregator.clear_errors_by_kind(ErrorKind::FetchError);
    assert!(harness.aggregator.last_error().is_none());
    assert!(!harness.aggregator.has_errors());
}

#[rstest]
fn clearing_by_source_keeps_other_sources(harness: Harness) {
    harness
        .aggregator
        .add_error("tools down", ErrorContext::scoped(ErrorKind::FetchError, "tools"));
    harness
        .aggregator
        .add_error("agents down", ErrorContext::scoped(ErrorKind::FetchError, "agents"));

    assert_eq!(harness.aggregator.clear_errors_by_source("tools"), 1);
    assert_eq!(harness.aggregator.errors_by_source("agents").len(), 1);
    assert!(harness.aggregator.errors_by_source("tools").is_empty());
}

#[rstest]
fn remove_error_drops_only_that_record(harness: Harness) {
    let first = harness.aggregator.add_error("first", ErrorContext::new());
    harness.aggregator.add_error("second", ErrorContext::new());

    assert!(harness.aggregator.remove_error(first.id()));
    assert!(!harness.aggregator.remove_error(first.id()));
    assert_eq!(harness.aggregator.error_count(), 1);
}

#[rstest]
#[case(ErrorKind::Warning, NotificationLevel::Warning, false)]
#[case(ErrorKind::Critical, NotificationLevel::Error, true)]
#[case(ErrorKind::FetchError, NotificationLevel::Error, false)]
fn notification_policy_follows_kind(
    harness: Harness,
    #[case] kind: ErrorKind,
    #[case] level: NotificationLevel,
    #[case] persistent: bool,
) {
    harness
        .aggregator
        .add_error("something happened", ErrorContext::new().with_kind(kind));

    let seen = harness.notifier.seen();
    let notification = seen.first().expect("a notification should be sent");
    assert_eq!(notification.level(), level);
    assert_eq!(notification.is_persistent(), persistent);
}

#[rstest]
fn silent_errors_are_logged_without_notification(harness: Harness) {
    harness
        .aggregator
        .add_error("poll failed", ErrorContext::new().silent());
    assert!(harness.notifier.seen().is_empty());
    assert_eq!(harness.aggregator.error_count(), 1);
}

#[rstest]
fn disabled_notifications_suppress_every_error() {
    let quiet = harness_with(ErrorAggregatorConfig {
        notify: false,
        ..ErrorAggregatorConfig::default()
    });
    quiet
        .aggregator
        .add_error("boom", ErrorContext::new().with_kind(ErrorKind::Critical));
    assert!(quiet.notifier.seen().is_empty());
}

#[rstest]
fn structured_payloads_are_normalised(harness: Harness) {
    let record = harness.aggregator.add_error(
        json!({"message": "quota exceeded", "type": "business", "code": 42, "details": {"limit": 5}}),
        ErrorContext::new().with_source("tools"),
    );
    assert_eq!(record.message(), "quota exceeded");
    assert_eq!(record.kind(), ErrorKind::Business);
    assert_eq!(record.code(), Some("42"));
    assert_eq!(record.details(), Some(&json!({"limit": 5})));
    assert_eq!(record.source(), Some("tools"));
}

#[rstest]
fn empty_messages_fall_back_to_placeholder(harness: Harness) {
    let record = harness.aggregator.add_error("   ", ErrorContext::new());
    assert_eq!(record.message(), "unknown error");
    assert_eq!(record.kind(), ErrorKind::Error);
}

#[rstest]
fn context_kind_overrides_input_classification(harness: Harness) {
    let record = harness.aggregator.add_error(
        ApiError::no_response("connection refused", false),
        ErrorContext::scoped(ErrorKind::FetchError, "services"),
    );
    assert_eq!(record.kind(), ErrorKind::FetchError);
}

#[rstest]
#[case(
    ApiError::Response { status: 404, message: "svc1 not found".to_owned(), body: None },
    "delete service",
    ErrorKind::NotFound,
    "delete service: svc1 not found"
)]
#[case(
    ApiError::Response { status: 401, message: String::new(), body: None },
    "",
    ErrorKind::Auth,
    "unauthorized, please sign in again"
)]
#[case(
    ApiError::no_response("connection reset", false),
    "list services",
    ErrorKind::Network,
    "list services: network connection failed, check network settings"
)]
#[case(
    ApiError::no_response("deadline elapsed", true),
    "check health",
    ErrorKind::Timeout,
    "check health: request timed out"
)]
#[case(
    ApiError::Request("relative URL without a base".to_owned()),
    "",
    ErrorKind::Error,
    "relative URL without a base"
)]
fn handle_api_error_classifies_transport_failures(
    harness: Harness,
    #[case] err: ApiError,
    #[case] context: &str,
    #[case] kind: ErrorKind,
    #[case] message: &str,
) {
    let record = harness.aggregator.handle_api_error(&err, context);
    assert_eq!(record.kind(), kind);
    assert_eq!(record.message(), message);
}

#[rstest]
fn default_source_applies_when_none_given() {
    let sourced = harness_with(ErrorAggregatorConfig {
        default_source: Some("console".to_owned()),
        ..ErrorAggregatorConfig::default()
    });
    let record = sourced.aggregator.add_error("oops", ErrorContext::new());
    assert_eq!(record.source(), Some("console"));
}

#[rstest]
#[case("not_found", ErrorKind::NotFound)]
#[case("fetch-error", ErrorKind::FetchError)]
#[case("FATAL", ErrorKind::Critical)]
fn error_kind_parses_loose_spellings(#[case] raw: &str, #[case] expected: ErrorKind) {
    assert_eq!(ErrorKind::try_from(raw), Ok(expected));
}

#[rstest]
fn unknown_error_kind_is_rejected() {
    assert!(ErrorKind::try_from("meltdown").is_err());
}

#[rstest]
fn concurrent_records_are_stored_in_id_order() {
    let harness = harness_with(ErrorAggregatorConfig {
        capacity: 1_000,
        ..ErrorAggregatorConfig::default()
    });

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let aggregator = &harness.aggregator;
            scope.spawn(move || {
                for index in 0..50 {
                    aggregator.add_error(
                        format!("worker {worker} failure {index}"),
                        ErrorContext::new().silent(),
                    );
                }
            });
        }
    });

    let ids: Vec<u64> = harness
        .aggregator
        .errors()
        .iter()
        .map(|record| record.id().into_inner())
        .collect();
    assert_eq!(ids.len(), 400);
    assert!(ids.windows(2).all(|pair| pair.first() < pair.last()));
    assert_eq!(ids.first(), Some(&1));
}
