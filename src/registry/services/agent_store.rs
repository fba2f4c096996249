//! Agent summary store.

use super::context::{FetchSlot, InFlight, StoreContext, StoreResult, normalize_records};
use crate::errors::{ApiResult, ErrorKind};
use crate::loading::LoadingKey;
use crate::orchestrator::CacheKey;
use crate::registry::domain::{AgentRecord, AgentStats, AgentStatus, extract_collection};
use crate::registry::ports::RegistryApi;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

const SOURCE: &str = "agents";
const LIST_KEY: &str = "agents:list";
const COLLECTION_FIELD: &str = "agents";

#[derive(Debug, Default)]
struct AgentState {
    agents: Vec<AgentRecord>,
    stats: AgentStats,
    current: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

/// Owns the agent summaries.
pub struct AgentStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    ctx: Arc<StoreContext<A, C>>,
    in_flight: InFlight,
    state: RwLock<AgentState>,
}

impl<A, C> AgentStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty store.
    #[must_use]
    pub fn new(ctx: Arc<StoreContext<A, C>>) -> Self {
        Self {
            ctx,
            in_flight: InFlight::default(),
            state: RwLock::new(AgentState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AgentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AgentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the agent list and replaces the collection.
    ///
    /// Returns `Ok(None)` when a fetch is already in flight and `force` is
    /// not set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `fetch-error` when the call
    /// fails; the previous agents are kept.
    pub async fn fetch_agents(&self, force: bool) -> StoreResult<Option<Vec<AgentRecord>>> {
        let slot = self.in_flight.claim(force);
        if matches!(slot, FetchSlot::Busy) {
            debug!("agent fetch already in flight; skipping");
            return Ok(None);
        }
        let loaded = self
            .ctx
            .loading
            .with_loading(&[LoadingKey::Agents], self.load_agents(force))
            .await;
        drop(slot);
        match loaded {
            Ok(agents) => Ok(Some(agents)),
            Err(err) => {
                self.ctx
                    .record(&err, ErrorKind::FetchError, SOURCE, "failed to fetch agents");
                Err(err.into())
            }
        }
    }

    async fn load_agents(&self, force: bool) -> ApiResult<Vec<AgentRecord>> {
        let body = self
            .ctx
            .read(
                &CacheKey::new(LIST_KEY),
                self.ctx.settings.list_ttl,
                force,
                |api| api.list_agents(),
            )
            .await?;
        let raw = extract_collection(&body, COLLECTION_FIELD)?;
        let agents = normalize_records(&raw, "agent", AgentRecord::from_payload);
        let now = self.ctx.clock.utc();
        let mut state = self.write();
        state.stats = AgentStats::compute(&agents);
        state.agents.clone_from(&agents);
        state.last_update = Some(now);
        info!(total = agents.len(), "agents loaded");
        Ok(agents)
    }

    /// Returns every agent.
    #[must_use]
    pub fn agents(&self) -> Vec<AgentRecord> {
        self.read().agents.clone()
    }

    /// Returns the agent with identifier `id`.
    #[must_use]
    pub fn get_agent(&self, id: &str) -> Option<AgentRecord> {
        self.read().agents.iter().find(|agent| agent.id == id).cloned()
    }

    /// Agents with the given derived status.
    #[must_use]
    pub fn agents_with_status(&self, status: AgentStatus) -> Vec<AgentRecord> {
        self.read()
            .agents
            .iter()
            .filter(|agent| agent.status == status)
            .cloned()
            .collect()
    }

    /// Case-insensitive search over agent identifiers. A blank query returns
    /// every agent.
    #[must_use]
    pub fn search_agents(&self, query: &str) -> Vec<AgentRecord> {
        let lowered = query.trim().to_lowercase();
        self.read()
            .agents
            .iter()
            .filter(|agent| lowered.is_empty() || agent.id.to_lowercase().contains(&lowered))
            .cloned()
            .collect()
    }

    /// Marks `id` as the selected agent. Returns `None` when it is unknown.
    pub fn select_agent(&self, id: &str) -> Option<AgentRecord> {
        let mut state = self.write();
        let agent = state.agents.iter().find(|agent| agent.id == id).cloned()?;
        state.current = Some(agent.id.clone());
        Some(agent)
    }

    /// Returns the selected agent, if it is still listed.
    #[must_use]
    pub fn current_agent(&self) -> Option<AgentRecord> {
        let state = self.read();
        let current = state.current.as_deref()?;
        state.agents.iter().find(|agent| agent.id == current).cloned()
    }

    /// Counts over the agent list.
    #[must_use]
    pub fn stats(&self) -> AgentStats {
        self.read().stats
    }

    /// When the list was last replaced.
    #[must_use]
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.read().last_update
    }

    /// Whether a fetch currently holds the single-flight marker.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Clears the list and selection.
    pub fn reset(&self) {
        *self.write() = AgentState::default();
    }
}
