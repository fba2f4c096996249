//! Tool collection, favourites and execution history.

use super::context::{FetchSlot, InFlight, StoreContext, StoreError, StoreResult, normalize_records};
use crate::errors::{ApiResult, ErrorKind};
use crate::loading::LoadingKey;
use crate::orchestrator::{CacheKey, batch};
use crate::registry::domain::{
    ExecutionId, ExecutionOutcome, ExecutionRecord, PopularTool, ToolRecord, ToolStats,
    extract_collection, extract_object, open_envelope,
};
use crate::registry::ports::RegistryApi;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Number of entries returned by [`ToolStore::recent_executions`].
pub const RECENT_EXECUTION_COUNT: usize = 10;

/// Number of entries returned by [`ToolStore::popular_tools`].
pub const POPULAR_TOOL_COUNT: usize = 10;

/// Persisted key of the favourite tool names.
pub const FAVORITES_KEY: &str = "favorite-tools";

/// Persisted key of the execution history.
pub const HISTORY_KEY: &str = "execution-history";

const SOURCE: &str = "tools";
const LIST_KEY: &str = "tools:list";
const COLLECTION_FIELD: &str = "tools";
const RECORDS_FIELD: &str = "executions";

#[derive(Debug, Default)]
struct ToolState {
    tools: Vec<ToolRecord>,
    favorites: BTreeSet<String>,
    /// Newest first.
    history: VecDeque<ExecutionRecord>,
    current: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

impl ToolState {
    fn overlay_favorites(&mut self) {
        for tool in &mut self.tools {
            tool.favorite = self.favorites.contains(&tool.name);
        }
    }

    fn filtered(&self, keep: impl Fn(&ToolRecord) -> bool) -> Vec<ToolRecord> {
        self.tools.iter().filter(|tool| keep(tool)).cloned().collect()
    }
}

/// Owns the tool list, the favourite set and the execution history.
///
/// The favourite set and the history are loaded from the local store at
/// construction and written back after every change. The list itself is
/// replaced wholesale on each fetch, with favourites overlaid afterwards.
pub struct ToolStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    ctx: Arc<StoreContext<A, C>>,
    in_flight: InFlight,
    state: RwLock<ToolState>,
}

impl<A, C> ToolStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a store, restoring favourites and history from the local
    /// store.
    #[must_use]
    pub fn new(ctx: Arc<StoreContext<A, C>>) -> Self {
        let favorites: BTreeSet<String> = ctx.load_persisted(FAVORITES_KEY);
        let mut history: VecDeque<ExecutionRecord> = ctx.load_persisted(HISTORY_KEY);
        history.truncate(ctx.settings.history_limit.max(1));
        Self {
            ctx,
            in_flight: InFlight::default(),
            state: RwLock::new(ToolState {
                favorites,
                history,
                ..ToolState::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ToolState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ToolState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the tool list and replaces the collection.
    ///
    /// Returns `Ok(None)` when a fetch is already in flight and `force` is
    /// not set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `fetch-error` when the call
    /// fails; the collection is left untouched.
    pub async fn fetch_tools(&self, force: bool) -> StoreResult<Option<Vec<ToolRecord>>> {
        let slot = self.in_flight.claim(force);
        if matches!(slot, FetchSlot::Busy) {
            debug!("tool fetch already in flight; skipping");
            return Ok(None);
        }
        let loaded = self
            .ctx
            .loading
            .with_loading(&[LoadingKey::Tools], self.load_tools(force))
            .await;
        drop(slot);
        match loaded {
            Ok(tools) => Ok(Some(tools)),
            Err(err) => {
                self.ctx
                    .record(&err, ErrorKind::FetchError, SOURCE, "failed to fetch tools");
                Err(err.into())
            }
        }
    }

    async fn load_tools(&self, force: bool) -> ApiResult<Vec<ToolRecord>> {
        let body = self
            .ctx
            .read(
                &CacheKey::new(LIST_KEY),
                self.ctx.settings.list_ttl,
                force,
                |api| api.list_tools(),
            )
            .await?;
        let raw = extract_collection(&body, COLLECTION_FIELD)?;
        let tools = normalize_records(&raw, "tool", ToolRecord::from_payload);
        let now = self.ctx.clock.utc();
        let mut state = self.write();
        state.tools = tools;
        state.overlay_favorites();
        state.last_update = Some(now);
        info!(total = state.tools.len(), "tools loaded");
        Ok(state.tools.clone())
    }

    /// Re-reads the favourite set from the local store and overlays it.
    pub fn load_favorites(&self) {
        let favorites: BTreeSet<String> = self.ctx.load_persisted(FAVORITES_KEY);
        let mut state = self.write();
        state.favorites = favorites;
        state.overlay_favorites();
    }

    /// Flips the favourite flag of `name` and persists the set. Returns the
    /// new flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ToolNotFound`] for unlisted tools and
    /// [`StoreError::LocalStore`] when the set cannot be persisted; in both
    /// cases nothing changes.
    pub fn toggle_favorite(&self, name: &str) -> StoreResult<bool> {
        let mut state = self.write();
        if !state.tools.iter().any(|tool| tool.name == name) {
            return Err(StoreError::ToolNotFound(name.to_owned()));
        }
        let mut favorites = state.favorites.clone();
        let favorite = if favorites.remove(name) {
            false
        } else {
            favorites.insert(name.to_owned());
            true
        };
        self.ctx.persist(FAVORITES_KEY, &favorites)?;
        state.favorites = favorites;
        state.overlay_favorites();
        Ok(favorite)
    }

    /// Calls tool `name` and appends the outcome to the history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] when the call fails. The failure is still
    /// recorded in the history and as an `execution-error`.
    pub async fn execute_tool(&self, name: &str, params: Value) -> StoreResult<Value> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Executing]);
        self.run_tool(name, params).await
    }

    /// Executes several calls through [`batch`] with the configured
    /// concurrency. Results are in input order.
    pub async fn execute_tools(&self, calls: Vec<(String, Value)>) -> Vec<StoreResult<Value>> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Executing]);
        let requests = calls
            .into_iter()
            .map(|(name, params)| async move { self.run_tool(&name, params).await });
        batch(requests, self.ctx.settings.batch_concurrency).await
    }

    async fn run_tool(&self, name: &str, params: Value) -> StoreResult<Value> {
        let started = Instant::now();
        let outcome = self
            .ctx
            .api
            .call_tool(name, &params)
            .await
            .and_then(open_envelope);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut record = ExecutionRecord {
            id: ExecutionId::new(),
            tool_name: name.to_owned(),
            service_name: self.get_tool(name).and_then(|tool| tool.service_name),
            params,
            outcome: ExecutionOutcome::Success,
            result: None,
            message: String::new(),
            timestamp: self.ctx.clock.utc(),
            duration_ms,
        };
        match outcome {
            Ok(body) => {
                let result = extract_object(&body);
                record.message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                record.result = Some(result.clone());
                self.push_history(record);
                self.ctx
                    .notify_success("tool executed", format!("tool \"{name}\" finished"));
                Ok(result)
            }
            Err(err) => {
                record.outcome = ExecutionOutcome::Failure;
                record.message = err.user_message();
                self.push_history(record);
                self.ctx.record(
                    &err,
                    ErrorKind::ExecutionError,
                    SOURCE,
                    &format!("tool \"{name}\" failed"),
                );
                Err(err.into())
            }
        }
    }

    fn push_history(&self, record: ExecutionRecord) {
        let limit = self.ctx.settings.history_limit.max(1);
        let snapshot: Vec<ExecutionRecord> = {
            let mut state = self.write();
            state.history.push_front(record);
            state.history.truncate(limit);
            state.history.iter().cloned().collect()
        };
        self.save_history(&snapshot);
    }

    fn save_history(&self, history: &[ExecutionRecord]) {
        if let Err(err) = self.ctx.persist(HISTORY_KEY, history) {
            warn!(error = %err, "execution history not persisted");
        }
    }

    /// Empties the execution history.
    pub fn clear_history(&self) {
        self.write().history.clear();
        self.save_history(&[]);
    }

    /// Removes one history entry. Returns `false` when the id is unknown.
    pub fn remove_execution(&self, id: ExecutionId) -> bool {
        let snapshot: Vec<ExecutionRecord> = {
            let mut state = self.write();
            let Some(index) = state.history.iter().position(|record| record.id == id) else {
                return false;
            };
            state.history.remove(index);
            state.history.iter().cloned().collect()
        };
        self.save_history(&snapshot);
        true
    }

    /// Fetches up to `limit` execution records kept by the registry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `fetch-error` when the call
    /// fails.
    pub async fn fetch_tool_records(&self, limit: usize) -> StoreResult<Vec<Value>> {
        let key = CacheKey::new(format!("tools:records:{limit}"));
        let loaded = self
            .ctx
            .read(&key, self.ctx.settings.list_ttl, false, move |api| {
                api.tool_records(limit)
            })
            .await
            .and_then(|body| extract_collection(&body, RECORDS_FIELD));
        loaded.map_err(|err| {
            self.ctx
                .record(&err, ErrorKind::FetchError, SOURCE, "failed to fetch tool records");
            err.into()
        })
    }

    /// Marks `name` as the selected tool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ToolNotFound`] when no tool has that name.
    pub fn select_tool(&self, name: &str) -> StoreResult<ToolRecord> {
        let mut state = self.write();
        let tool = state
            .tools
            .iter()
            .find(|tool| tool.name == name)
            .cloned()
            .ok_or_else(|| StoreError::ToolNotFound(name.to_owned()))?;
        state.current = Some(tool.name.clone());
        Ok(tool)
    }

    /// Returns the selected tool, if it is still listed.
    #[must_use]
    pub fn current_tool(&self) -> Option<ToolRecord> {
        let state = self.read();
        let current = state.current.as_deref()?;
        state.tools.iter().find(|tool| tool.name == current).cloned()
    }

    /// Returns every tool.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolRecord> {
        self.read().tools.clone()
    }

    /// Returns the tool named `name`.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<ToolRecord> {
        self.read().tools.iter().find(|tool| tool.name == name).cloned()
    }

    /// Tools exposed by `service`.
    #[must_use]
    pub fn tools_for_service(&self, service: &str) -> Vec<ToolRecord> {
        self.read()
            .filtered(|tool| tool.service_name.as_deref() == Some(service))
    }

    /// Tools grouped by service name; undeclared services group as
    /// `unknown`.
    #[must_use]
    pub fn tools_by_service(&self) -> BTreeMap<String, Vec<ToolRecord>> {
        group(&self.read().tools, |tool| tool.service_or_unknown().to_owned())
    }

    /// Tools grouped by category.
    #[must_use]
    pub fn tools_by_category(&self) -> BTreeMap<String, Vec<ToolRecord>> {
        group(&self.read().tools, |tool| tool.category.clone())
    }

    /// Sorted, distinct names of services exposing tools.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.read()
            .tools
            .iter()
            .filter_map(|tool| tool.service_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tools not flagged unavailable.
    #[must_use]
    pub fn available_tools(&self) -> Vec<ToolRecord> {
        self.read().filtered(|tool| tool.available)
    }

    /// Tools marked as favourites.
    #[must_use]
    pub fn favorite_tools(&self) -> Vec<ToolRecord> {
        self.read().filtered(|tool| tool.favorite)
    }

    /// Case-insensitive search over name, description and service name. A
    /// blank query returns every tool.
    #[must_use]
    pub fn search_tools(&self, query: &str) -> Vec<ToolRecord> {
        let lowered = query.trim().to_lowercase();
        if lowered.is_empty() {
            return self.tools();
        }
        self.read().filtered(|tool| tool.matches(&lowered))
    }

    /// The whole execution history, newest first.
    #[must_use]
    pub fn execution_history(&self) -> Vec<ExecutionRecord> {
        self.read().history.iter().cloned().collect()
    }

    /// The newest executions by timestamp.
    #[must_use]
    pub fn recent_executions(&self) -> Vec<ExecutionRecord> {
        let mut recent = self.execution_history();
        recent.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        recent.truncate(RECENT_EXECUTION_COUNT);
        recent
    }

    /// The most executed tools, ties broken by name.
    #[must_use]
    pub fn popular_tools(&self) -> Vec<PopularTool> {
        let state = self.read();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &state.history {
            *counts.entry(record.tool_name.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(right.0)));
        ranked
            .into_iter()
            .take(POPULAR_TOOL_COUNT)
            .map(|(name, count)| PopularTool {
                name: name.to_owned(),
                count,
                tool: state.tools.iter().find(|tool| tool.name == name).cloned(),
            })
            .collect()
    }

    /// Counts over the tool list and the history.
    #[must_use]
    pub fn stats(&self) -> ToolStats {
        let state = self.read();
        ToolStats::compute(&state.tools, &state.history)
    }

    /// When the list was last replaced.
    #[must_use]
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.read().last_update
    }

    /// Returns `true` while a fetch holds the in-flight marker.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Clears the in-memory list, history and selection. Persisted
    /// favourites are kept.
    pub fn reset(&self) {
        let mut state = self.write();
        let favorites = std::mem::take(&mut state.favorites);
        *state = ToolState {
            favorites,
            ..ToolState::default()
        };
        info!("tool store reset");
    }
}

fn group(
    tools: &[ToolRecord],
    key: impl Fn(&ToolRecord) -> String,
) -> BTreeMap<String, Vec<ToolRecord>> {
    let mut grouped: BTreeMap<String, Vec<ToolRecord>> = BTreeMap::new();
    for tool in tools {
        grouped.entry(key(tool)).or_default().push(tool.clone());
    }
    grouped
}
