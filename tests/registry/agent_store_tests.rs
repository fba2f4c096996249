//! In-memory integration tests for the agent store.

use super::helpers::{Harness, harness};
use console_sync::errors::{ApiError, ErrorKind};
use console_sync::registry::adapters::ApiOperation;
use console_sync::registry::domain::AgentStatus;
use rstest::rstest;
use serde_json::json;

fn seeded(harness: Harness) -> Harness {
    harness
        .api
        .seed_agents(vec![
            json!({"agent_id": "research", "service_count": 2, "healthy_services": 2, "tool_count": 7}),
            json!({"agent_id": "ops", "service_count": 3, "healthy_services": 1, "unhealthy_services": 2, "tool_count": 4}),
            json!({"agent_id": "idle", "service_count": 0}),
            json!({"service_count": 1}),
        ])
        .expect("seeding should succeed");
    harness
}

#[rstest]
#[tokio::test]
async fn agent_status_is_derived_from_service_health(harness: Harness) {
    let harness = seeded(harness);
    let agents = harness.console.agents();

    let fetched = agents
        .fetch_agents(false)
        .await
        .expect("fetch should succeed")
        .expect("fetch should not be skipped");

    assert_eq!(fetched.len(), 3);
    let status_of = |id: &str| agents.get_agent(id).map(|agent| agent.status);
    assert_eq!(status_of("research"), Some(AgentStatus::Active));
    assert_eq!(status_of("ops"), Some(AgentStatus::Partial));
    assert_eq!(status_of("idle"), Some(AgentStatus::Inactive));

    let stats = agents.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.partial, 1);
    assert_eq!(stats.inactive, 1);
    assert_eq!(stats.error, 1);
    assert_eq!(stats.total_services, 5);
    assert_eq!(stats.total_tools, 11);
    assert_eq!(agents.agents_with_status(AgentStatus::Active).len(), 1);
}

#[rstest]
#[tokio::test]
async fn agents_are_searchable_and_selectable(harness: Harness) {
    let harness = seeded(harness);
    let agents = harness.console.agents();
    agents.fetch_agents(false).await.expect("fetch should succeed");

    assert_eq!(agents.search_agents("RES").len(), 1);
    assert_eq!(agents.search_agents("").len(), 3);
    assert!(agents.select_agent("ghost").is_none());
    assert!(agents.select_agent("ops").is_some());
    assert_eq!(
        agents.current_agent().map(|agent| agent.id),
        Some("ops".to_owned())
    );

    agents.reset();
    assert!(agents.agents().is_empty());
    assert!(agents.current_agent().is_none());
}

#[rstest]
#[tokio::test]
async fn failed_fetch_keeps_previous_agents(harness: Harness) {
    let harness = seeded(harness);
    let agents = harness.console.agents();
    agents.fetch_agents(false).await.expect("fetch should succeed");
    harness
        .api
        .fail_next(
            ApiOperation::ListAgents,
            ApiError::Response {
                status: 503,
                message: String::new(),
                body: None,
            },
        )
        .expect("failure should be scripted");

    assert!(agents.fetch_agents(true).await.is_err());

    assert_eq!(agents.agents().len(), 3);
    let recorded = harness.console.errors().errors_by_kind(ErrorKind::FetchError);
    assert!(
        recorded
            .first()
            .is_some_and(|record| record.message().contains("service temporarily unavailable"))
    );
}
