//! In-memory integration tests for the tool store.

use super::helpers::{Harness, config, harness, tool};
use console_sync::config::ConsoleConfig;
use console_sync::errors::{ApiError, ErrorKind};
use console_sync::registry::adapters::{ApiOperation, InMemoryLocalStore, InMemoryRegistryApi};
use console_sync::registry::domain::ExecutionOutcome;
use console_sync::registry::ports::LocalStore;
use console_sync::registry::services::StoreError;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

fn seeded(harness: Harness) -> Harness {
    harness
        .api
        .seed_tools(vec![
            tool("get_weather", "weather"),
            tool("get_forecast", "weather"),
            json!({"name": "search", "service_name": "web", "category": "lookup", "available": false}),
        ])
        .expect("seeding should succeed");
    harness
}

#[rstest]
#[tokio::test]
async fn fetched_tools_are_grouped_and_searchable(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();

    tools.fetch_tools(false).await.expect("fetch should succeed");

    assert_eq!(tools.tools().len(), 3);
    assert_eq!(tools.service_names(), ["weather", "web"]);
    assert_eq!(tools.tools_for_service("weather").len(), 2);
    assert_eq!(tools.available_tools().len(), 2);
    let by_category = tools.tools_by_category();
    assert_eq!(by_category.get("default").map(Vec::len), Some(2));
    assert_eq!(by_category.get("lookup").map(Vec::len), Some(1));
    assert_eq!(tools.search_tools("FORECAST").len(), 1);
    assert_eq!(tools.search_tools("weather").len(), 2);
    assert_eq!(tools.search_tools("  ").len(), 3);
    assert!(
        tools
            .get_tool("get_weather")
            .is_some_and(|found| found.input_schema.is_some())
    );
}

#[rstest]
#[tokio::test]
async fn favourites_persist_across_consoles(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    assert!(tools.toggle_favorite("search").expect("toggle should succeed"));
    assert!(
        harness
            .local_store
            .load("mcpstore-favorite-tools")
            .expect("load should succeed")
            .is_some_and(|raw| raw.contains("search"))
    );

    let reopened = harness.reopen();
    let restored = reopened.console.tools();
    restored.fetch_tools(false).await.expect("fetch should succeed");
    let favourites: Vec<String> = restored
        .favorite_tools()
        .into_iter()
        .map(|found| found.name)
        .collect();
    assert_eq!(favourites, ["search"]);

    assert!(!restored.toggle_favorite("search").expect("toggle should succeed"));
    assert!(restored.favorite_tools().is_empty());
}

#[rstest]
#[tokio::test]
async fn unknown_tools_cannot_be_favourited(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    assert!(matches!(
        tools.toggle_favorite("missing"),
        Err(StoreError::ToolNotFound(_))
    ));
}

#[rstest]
#[tokio::test]
async fn executions_are_recorded_in_history(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    let result = tools
        .execute_tool("get_weather", json!({"city": "Oslo"}))
        .await
        .expect("execution should succeed");
    let failure = tools.execute_tool("missing", json!({})).await;

    assert_eq!(result.get("tool_name"), Some(&json!("get_weather")));
    assert!(matches!(
        failure,
        Err(StoreError::Api(ApiError::Response { status: 404, .. }))
    ));
    let history = tools.execution_history();
    assert_eq!(history.len(), 2);
    let newest = history.first().expect("history should not be empty");
    assert_eq!(newest.tool_name, "missing");
    assert_eq!(newest.outcome, ExecutionOutcome::Failure);
    let oldest = history.last().expect("history should not be empty");
    assert_eq!(oldest.outcome, ExecutionOutcome::Success);
    assert_eq!(oldest.service_name.as_deref(), Some("weather"));
    let stats = tools.stats();
    assert_eq!(stats.executions, 2);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.failed_executions, 1);
    assert_eq!(
        harness
            .console
            .errors()
            .errors_by_kind(ErrorKind::ExecutionError)
            .len(),
        1
    );
}

#[rstest]
#[tokio::test]
async fn history_is_capped_and_restored(mut config: ConsoleConfig) {
    config.history_limit = 3;
    let harness = seeded(Harness::with(
        Arc::new(InMemoryRegistryApi::new()),
        Arc::new(InMemoryLocalStore::new()),
        config,
    ));
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    for attempt in 0..5 {
        tools
            .execute_tool("get_weather", json!({ "attempt": attempt }))
            .await
            .expect("execution should succeed");
    }

    let history = tools.execution_history();
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.first().map(|record| record.params.clone()),
        Some(json!({"attempt": 4}))
    );

    let reopened = harness.reopen();
    assert_eq!(reopened.console.tools().execution_history(), history);
}

#[rstest]
#[tokio::test]
async fn popular_and_recent_views_rank_executions(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");
    for name in ["get_weather", "get_forecast", "get_weather"] {
        tools
            .execute_tool(name, json!({}))
            .await
            .expect("execution should succeed");
    }

    let popular = tools.popular_tools();
    let ranked: Vec<(String, usize)> = popular
        .iter()
        .map(|entry| (entry.name.clone(), entry.count))
        .collect();
    assert_eq!(
        ranked,
        [("get_weather".to_owned(), 2), ("get_forecast".to_owned(), 1)]
    );
    assert!(popular.iter().all(|entry| entry.tool.is_some()));
    assert_eq!(tools.recent_executions().len(), 3);
}

#[rstest]
#[tokio::test]
async fn history_entries_can_be_removed_and_cleared(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");
    tools
        .execute_tool("get_weather", json!({}))
        .await
        .expect("execution should succeed");
    tools
        .execute_tool("get_forecast", json!({}))
        .await
        .expect("execution should succeed");
    let id = tools
        .execution_history()
        .first()
        .map(|record| record.id)
        .expect("history should not be empty");

    assert!(tools.remove_execution(id));
    assert!(!tools.remove_execution(id));
    assert_eq!(tools.execution_history().len(), 1);

    tools.clear_history();
    assert!(tools.execution_history().is_empty());
    assert!(harness.reopen().console.tools().execution_history().is_empty());
}

#[rstest]
#[tokio::test]
async fn batched_executions_keep_input_order(harness: Harness) {
    let harness = seeded(harness);
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    let results = tools
        .execute_tools(vec![
            ("get_weather".to_owned(), json!({})),
            ("missing".to_owned(), json!({})),
            ("get_forecast".to_owned(), json!({})),
        ])
        .await;

    let outcomes: Vec<bool> = results.iter().map(Result::is_ok).collect();
    assert_eq!(outcomes, [true, false, true]);
    assert_eq!(harness.api.calls(ApiOperation::CallTool), 3);
    assert_eq!(tools.execution_history().len(), 3);
}

#[rstest]
#[tokio::test]
async fn malformed_persisted_state_falls_back_to_defaults(config: ConsoleConfig) {
    let local_store = Arc::new(InMemoryLocalStore::new());
    local_store
        .save("mcpstore-execution-history", "{not json")
        .expect("save should succeed");
    local_store
        .save("mcpstore-favorite-tools", r#"{"unexpected": true}"#)
        .expect("save should succeed");

    let harness = seeded(Harness::with(
        Arc::new(InMemoryRegistryApi::new()),
        local_store,
        config,
    ));
    let tools = harness.console.tools();
    tools.fetch_tools(false).await.expect("fetch should succeed");

    assert!(tools.execution_history().is_empty());
    assert!(tools.favorite_tools().is_empty());
}

#[rstest]
#[tokio::test]
async fn remote_execution_records_pass_through(harness: Harness) {
    harness
        .api
        .seed_tool_records(vec![
            json!({"tool_name": "get_weather", "success": true}),
            json!({"tool_name": "search", "success": false}),
        ])
        .expect("seeding should succeed");

    let records = harness
        .console
        .tools()
        .fetch_tool_records(1)
        .await
        .expect("records should load");

    assert_eq!(records, [json!({"tool_name": "get_weather", "success": true})]);
}
