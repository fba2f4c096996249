//! In-memory integration tests for the service store.

use super::helpers::{Harness, config, harness, local_service, ok_envelope, remote_service};
use async_trait::async_trait;
use console_sync::config::ConsoleConfig;
use console_sync::console::Console;
use console_sync::errors::{ApiError, ApiResult, ErrorKind};
use console_sync::loading::LoadingKey;
use console_sync::registry::adapters::{ApiOperation, InMemoryLocalStore};
use console_sync::registry::domain::TransportKind;
use console_sync::registry::ports::{LocalStore, RegistryApi};
use console_sync::registry::services::StoreError;
use mockable::DefaultClock;
use mockall::mock;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Registry {}

    #[async_trait]
    impl RegistryApi for Registry {
        async fn list_services(&self) -> ApiResult<Value>;
        async fn list_tools(&self) -> ApiResult<Value>;
        async fn list_agents(&self) -> ApiResult<Value>;
        async fn check_services(&self) -> ApiResult<Value>;
        async fn add_service(&self, config: &Value) -> ApiResult<Value>;
        async fn update_service(&self, name: &str, config: &Value) -> ApiResult<Value>;
        async fn delete_service(&self, name: &str) -> ApiResult<Value>;
        async fn restart_service(&self, name: &str) -> ApiResult<Value>;
        async fn batch_update_services(&self, updates: &Value) -> ApiResult<Value>;
        async fn batch_delete_services(&self, names: &[String]) -> ApiResult<Value>;
        async fn batch_restart_services(&self, names: &[String]) -> ApiResult<Value>;
        async fn call_tool(&self, name: &str, args: &Value) -> ApiResult<Value>;
        async fn tool_records(&self, limit: usize) -> ApiResult<Value>;
        async fn system_resources(&self) -> ApiResult<Value>;
        async fn health_summary(&self) -> ApiResult<Value>;
    }
}

fn mock_console(api: MockRegistry, config: ConsoleConfig) -> Console<MockRegistry, DefaultClock> {
    let local_store: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
    Console::new(Arc::new(api), Arc::new(DefaultClock), local_store, config)
}

fn seed(harness: &Harness, services: Vec<Value>) {
    harness
        .api
        .seed_services(services)
        .expect("seeding should succeed");
}

#[rstest]
#[tokio::test]
async fn enveloped_listing_populates_the_store(harness: Harness) {
    harness
        .api
        .set_response(
            ApiOperation::ListServices,
            json!({"success": true, "data": {"services": [{"name": "svc1", "status": "healthy"}]}}),
        )
        .expect("response should be scripted");
    let services = harness.console.services();

    let fetched = services
        .fetch_services(false)
        .await
        .expect("fetch should succeed")
        .expect("fetch should not be skipped");

    assert_eq!(fetched.len(), 1);
    let svc1 = services.get_service("svc1").expect("svc1 should be stored");
    assert_eq!(svc1.status.key(), "healthy");
    assert!(svc1.transport_kind().is_none());
    assert_eq!(services.healthy_services().len(), 1);
    assert_eq!(services.stats().total, 1);
    assert_eq!(services.stats().running, 1);
    assert!(services.last_update_time().is_some());
    assert!(!services.is_fetching());
}

#[rstest]
#[case::bare_array(json!([{"name": "a"}, {"name": "b"}]))]
#[case::data_array(json!({"success": true, "data": [{"name": "a"}, {"name": "b"}]}))]
#[case::nested_data(json!({"data": {"data": {"services": [{"name": "a"}, {"name": "b"}]}}}))]
#[case::top_level_field(json!({"services": [{"name": "a"}, {"name": "b"}]}))]
#[case::malformed_entry_skipped(json!({"data": [{"name": "a"}, {"status": "healthy"}, 7, {"name": "b"}]}))]
#[tokio::test]
async fn every_envelope_shape_yields_the_same_collection(harness: Harness, #[case] body: Value) {
    harness
        .api
        .set_response(ApiOperation::ListServices, body)
        .expect("response should be scripted");

    harness
        .console
        .services()
        .fetch_services(false)
        .await
        .expect("fetch should succeed");

    let names: Vec<String> = harness
        .console
        .services()
        .services()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(names, ["a", "b"]);
}

#[rstest]
#[case::business_failure(
    json!({"success": false, "message": "registry offline"}),
    "registry offline"
)]
#[case::unrecognised_shape(json!({"data": {"services": "many"}}), "unrecognised")]
#[tokio::test]
async fn rejected_listings_keep_the_previous_collection(
    harness: Harness,
    #[case] body: Value,
    #[case] expected_message: &str,
) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    let services = harness.console.services();
    services
        .fetch_services(false)
        .await
        .expect("initial fetch should succeed");
    harness
        .api
        .set_response(ApiOperation::ListServices, body)
        .expect("response should be scripted");

    let result = services.fetch_services(true).await;

    assert!(matches!(result, Err(StoreError::Api(_))));
    assert_eq!(services.services().len(), 1);
    let recorded = harness.console.errors().errors_by_kind(ErrorKind::FetchError);
    assert_eq!(recorded.len(), 1);
    assert!(
        recorded
            .first()
            .is_some_and(|record| record.message().contains(expected_message)),
        "unexpected error log: {recorded:?}"
    );
    assert!(!harness.console.loading().get_loading(&LoadingKey::Services));
}

#[rstest]
#[tokio::test]
async fn transport_failures_are_recorded_and_state_survives(harness: Harness) {
    seed(
        &harness,
        vec![local_service("svc1", "healthy"), remote_service("svc2", "error")],
    );
    let services = harness.console.services();
    services
        .fetch_services(false)
        .await
        .expect("initial fetch should succeed");
    harness
        .api
        .fail_next(
            ApiOperation::ListServices,
            ApiError::no_response("connection reset", false),
        )
        .expect("failure should be scripted");

    let result = services.fetch_services(true).await;

    assert!(matches!(
        result,
        Err(StoreError::Api(ApiError::NoResponse { .. }))
    ));
    assert_eq!(services.services().len(), 2);
    assert_eq!(services.failed_services().len(), 1);
    assert_eq!(services.remote_services().len(), 1);
    assert_eq!(
        services
            .local_services()
            .first()
            .and_then(|record| record.transport_kind()),
        Some(TransportKind::Local)
    );
}

#[rstest]
#[tokio::test]
async fn cached_listing_is_reused_until_forced(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    let services = harness.console.services();

    services.fetch_services(false).await.expect("first fetch");
    services.fetch_services(false).await.expect("cached fetch");
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);

    services.fetch_services(true).await.expect("forced fetch");
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 2);
}

#[rstest]
#[tokio::test]
async fn overlapping_unforced_fetches_are_skipped(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    harness
        .api
        .set_latency(Duration::from_millis(20))
        .expect("latency should be set");
    let services = harness.console.services();

    let (first, second) = tokio::join!(services.fetch_services(false), services.fetch_services(false));

    let first = first.expect("first fetch should succeed");
    let second = second.expect("second fetch should succeed");
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn refetch_after_a_mutation_does_not_join_an_older_read(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    harness
        .api
        .set_latency(Duration::from_millis(50))
        .expect("latency should be set");
    let services = harness.console.services();

    let (listed, added) = tokio::join!(services.fetch_services(false), async {
        harness
            .api
            .set_latency(Duration::ZERO)
            .expect("latency should be reset");
        services
            .add_service(json!({"mcpServers": {"weather": {"command": "python", "args": ["weather.py"]}}}))
            .await
    });

    listed.expect("slow fetch should succeed");
    added.expect("add should succeed");
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 2);
    assert!(services.get_service("weather").is_some());

    services
        .fetch_services(false)
        .await
        .expect("cached fetch should succeed");
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 2);
    assert!(services.get_service("weather").is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn read_in_flight_across_a_delete_is_not_cached(harness: Harness) {
    seed(
        &harness,
        vec![local_service("svc1", "healthy"), local_service("svc2", "healthy")],
    );
    harness
        .api
        .set_latency(Duration::from_millis(50))
        .expect("latency should be set");
    let services = harness.console.services();

    let (listed, deleted) = tokio::join!(services.fetch_services(false), async {
        harness
            .api
            .set_latency(Duration::ZERO)
            .expect("latency should be reset");
        services.delete_service("svc2").await
    });
    listed.expect("slow fetch should succeed");
    deleted.expect("delete should succeed");
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);

    services
        .fetch_services(false)
        .await
        .expect("fetch after delete should succeed");

    assert_eq!(harness.api.calls(ApiOperation::ListServices), 2);
    assert!(services.get_service("svc1").is_some());
    assert!(services.get_service("svc2").is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn forced_fetch_starts_a_new_call_while_one_is_in_flight(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    harness
        .api
        .set_latency(Duration::from_millis(50))
        .expect("latency should be set");
    let services = harness.console.services();

    let (unforced, forced) = tokio::join!(services.fetch_services(false), services.fetch_services(true));

    assert!(unforced.expect("unforced fetch should succeed").is_some());
    assert!(forced.expect("forced fetch should succeed").is_some());
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 2);
}

#[rstest]
#[tokio::test]
async fn deleting_purges_side_tables_without_refetching(harness: Harness) {
    seed(
        &harness,
        vec![local_service("svc1", "healthy"), local_service("svc2", "healthy")],
    );
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");
    services
        .check_services_health()
        .await
        .expect("health check should succeed");
    services.update_connection_status("svc1", true, json!({"transport": "stdio"}));
    services.record_metrics("svc1", json!({"response_time": 12.5}));
    services
        .select_service("svc1")
        .expect("svc1 should be selectable");
    assert!(services.service_health("svc1").is_some());

    services
        .delete_service("svc1")
        .await
        .expect("delete should succeed");

    assert!(services.get_service("svc1").is_none());
    assert!(services.service_health("svc1").is_none());
    assert!(services.connection_status("svc1").is_none());
    assert!(services.service_metrics("svc1").is_none());
    assert!(services.current_service().is_none());
    assert_eq!(services.stats().total, 1);
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);
}

#[rstest]
#[tokio::test]
async fn deleting_unknown_service_records_a_delete_error(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");

    let result = services.delete_service("ghost").await;

    assert!(matches!(
        result,
        Err(StoreError::Api(ApiError::Response { status: 404, .. }))
    ));
    assert_eq!(services.services().len(), 1);
    assert_eq!(
        harness
            .console
            .errors()
            .errors_by_kind(ErrorKind::DeleteError)
            .len(),
        1
    );
}

#[rstest]
#[case(json!({}))]
#[case(json!([]))]
#[case(json!({"name": "svc", "command": "npx", "url": "https://x"}))]
#[case(json!({"name": "svc", "source": "legacy", "command": "npx"}))]
#[tokio::test]
async fn invalid_configs_are_rejected_before_any_call(
    config: ConsoleConfig,
    #[case] service_config: Value,
) {
    let console = mock_console(MockRegistry::new(), config);

    let result = console.services().add_service(service_config).await;

    assert!(matches!(result, Err(StoreError::Config(_))));
    assert_eq!(
        console.errors().errors_by_kind(ErrorKind::AddError).len(),
        1
    );
}

#[rstest]
#[tokio::test]
async fn unforced_reads_within_ttl_reach_the_registry_once(config: ConsoleConfig) {
    let mut api = MockRegistry::new();
    api.expect_list_services()
        .times(1)
        .returning(|| Ok(ok_envelope(json!([{"name": "svc1", "status": "healthy"}]))));
    let console = mock_console(api, config);

    for _ in 0..3 {
        console
            .services()
            .fetch_services(false)
            .await
            .expect("fetch should succeed");
    }

    assert_eq!(console.services().services().len(), 1);
}

#[rstest]
#[tokio::test]
async fn adding_a_service_refetches_and_notifies(harness: Harness) {
    let services = harness.console.services();

    let added = services
        .add_service(json!({"mcpServers": {"weather": {"command": "python", "args": ["weather.py"]}}}))
        .await
        .expect("add should succeed");

    assert!(added.get("mcpServers").is_some());
    let weather = services.get_service("weather").expect("weather should be listed");
    assert_eq!(weather.status.key(), "init");
    assert!(!weather.is_available());
    assert_eq!(harness.api.calls(ApiOperation::ListServices), 1);
    assert!(
        harness
            .console
            .notifications()
            .entries()
            .iter()
            .any(|entry| entry.notification().message().contains("weather"))
    );
}

#[rstest]
#[tokio::test]
async fn batch_mutations_refetch_the_collection(harness: Harness) {
    seed(
        &harness,
        vec![
            local_service("a", "healthy"),
            local_service("b", "healthy"),
            local_service("c", "stopped"),
        ],
    );
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");

    let deleted = services
        .batch_delete_services(&["a".to_owned(), "b".to_owned()])
        .await
        .expect("batch delete should succeed");
    assert_eq!(deleted.get("deleted"), Some(&json!(2)));
    assert_eq!(services.services().len(), 1);

    services
        .batch_update_services(&json!([{"name": "c", "config": {"status": "healthy", "command": "npx"}}]))
        .await
        .expect("batch update should succeed");
    assert!(
        services
            .get_service("c")
            .is_some_and(|record| record.is_healthy())
    );
    assert_eq!(services.stats().stopped, 0);
}

#[rstest]
#[tokio::test]
async fn health_snapshots_merge_into_records(harness: Harness) {
    seed(
        &harness,
        vec![local_service("svc1", "init"), local_service("svc2", "healthy")],
    );
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");
    harness
        .api
        .set_response(
            ApiOperation::CheckServices,
            ok_envelope(json!({"services": [
                {"name": "svc1", "status": "healthy", "response_time": 42},
                {"name": "ghost", "status": "error"}
            ]})),
        )
        .expect("response should be scripted");

    let snapshots = services
        .check_services_health()
        .await
        .expect("health check should succeed");

    assert_eq!(snapshots.len(), 2);
    assert_eq!(services.healthy_services().len(), 2);
    assert_eq!(format!("{:.1}", services.health_rate()), "100.0");
    assert!(services.get_service("ghost").is_none());
    let health = services.service_health("svc1").expect("health should be tracked");
    assert_eq!(health.status.key(), "healthy");
    let view = services
        .telemetry_view("svc1")
        .expect("telemetry should render");
    assert_eq!(view.latency, "42 ms");
}

#[rstest]
#[tokio::test]
async fn disconnected_services_are_not_active(harness: Harness) {
    seed(
        &harness,
        vec![local_service("svc1", "healthy"), local_service("svc2", "healthy")],
    );
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");

    services.update_connection_status("svc2", false, Value::Null);

    let active: Vec<String> = services
        .active_services()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(active, ["svc1"]);
}

#[rstest]
#[tokio::test]
async fn reset_clears_collection_and_selection(harness: Harness) {
    seed(&harness, vec![local_service("svc1", "healthy")]);
    let services = harness.console.services();
    services.fetch_services(false).await.expect("fetch should succeed");
    services.select_service("svc1").expect("svc1 should be selectable");

    services.reset();

    assert!(services.services().is_empty());
    assert!(services.current_service().is_none());
    assert_eq!(services.stats().total, 0);
    assert!(matches!(
        services.select_service("svc1"),
        Err(StoreError::ServiceNotFound(_))
    ));
}
