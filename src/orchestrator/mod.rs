//! Outbound call orchestration.
//!
//! [`RequestOrchestrator`] serves idempotent reads from a TTL cache and
//! collapses concurrent reads of the same [`CacheKey`] onto one in-flight
//! call. [`retry_with_backoff`] and [`batch`] cover retries with exponential
//! backoff and chunked, bounded-concurrency execution. Mutating calls never
//! go through the cache.

mod batch;
mod cache;
mod retry;

pub use batch::batch;
pub use cache::CacheKey;
pub use retry::{RetryPolicy, backoff_delay, retry_with_backoff};

use crate::errors::ApiResult;
use cache::CacheEntry;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use mockable::Clock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default bound on the number of cached payloads.
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 256;

type SharedCall = Shared<BoxFuture<'static, ApiResult<Value>>>;

/// Errors raised by cache maintenance.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// The invalidation pattern is not a valid regular expression.
    #[error("invalid cache invalidation pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern as supplied.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
}

#[derive(Default)]
struct OrchestratorState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, SharedCall>,
}

impl OrchestratorState {
    fn fresh_value(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<Value> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before.saturating_sub(self.entries.len())
    }

    fn store(&mut self, key: CacheKey, entry: CacheEntry, max_entries: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            self.purge_expired(entry.stored_at);
        }
        while !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, candidate)| candidate.stored_at)
                .map(|(oldest_key, _)| oldest_key.clone())
            else {
                break;
            };
            debug!(key = %oldest, "evicting oldest cache entry");
            self.entries.remove(&oldest);
        }
        self.entries.insert(key, entry);
    }
}

/// TTL cache with in-flight request deduplication.
///
/// Only successful results are cached; a failure is shared with every caller
/// waiting on the same in-flight call and then forgotten. Dropping a caller's
/// future does not cancel the underlying call while other callers still wait
/// on it.
pub struct RequestOrchestrator<C: Clock + Send + Sync> {
    clock: Arc<C>,
    max_entries: usize,
    state: Mutex<OrchestratorState>,
}

impl<C: Clock + Send + Sync> RequestOrchestrator<C> {
    /// Creates an orchestrator with the default cache bound.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            clock,
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    /// Caps the number of cached payloads (minimum one).
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value for `key`, or runs `thunk` and caches its
    /// successful result for `ttl`.
    ///
    /// Concurrent calls with the same key share one invocation of `thunk`.
    /// A zero `ttl` still deduplicates in-flight calls but caches nothing.
    ///
    /// # Errors
    ///
    /// Returns the [`crate::errors::ApiError`] produced by the shared call.
    pub async fn execute<F, Fut>(&self, key: &CacheKey, ttl: Duration, thunk: F) -> ApiResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let call = {
            let mut state = self.lock();
            if let Some(value) = state.fresh_value(key, self.clock.utc()) {
                debug!(key = %key, "serving cached response");
                return Ok(value);
            }
            match state.in_flight.entry(key.clone()) {
                Entry::Occupied(slot) => {
                    debug!(key = %key, "joining in-flight request");
                    slot.get().clone()
                }
                Entry::Vacant(slot) => slot.insert(thunk().boxed().shared()).clone(),
            }
        };
        self.complete(key, call, ttl).await
    }

    /// Runs `thunk` even when a value is cached or a call for `key` is
    /// already in flight, and caches its successful result for `ttl`.
    ///
    /// The new call replaces any in-flight one: later [`Self::execute`]
    /// callers join it, and the replaced call's result is never cached.
    ///
    /// # Errors
    ///
    /// Returns the [`crate::errors::ApiError`] produced by the call.
    pub async fn execute_fresh<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        thunk: F,
    ) -> ApiResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        let call = {
            let mut state = self.lock();
            state.entries.remove(key);
            let call = thunk().boxed().shared();
            if state.in_flight.insert(key.clone(), call.clone()).is_some() {
                debug!(key = %key, "superseding in-flight request");
            }
            call
        };
        self.complete(key, call, ttl).await
    }

    async fn complete(&self, key: &CacheKey, call: SharedCall, ttl: Duration) -> ApiResult<Value> {
        let result = call.clone().await;
        self.settle(key, &call, &result, ttl);
        result
    }

    fn settle(&self, key: &CacheKey, call: &SharedCall, result: &ApiResult<Value>, ttl: Duration) {
        let mut state = self.lock();
        let owns_slot = state
            .in_flight
            .get(key)
            .is_some_and(|current| current.ptr_eq(call));
        if !owns_slot {
            return;
        }
        state.in_flight.remove(key);
        if let Ok(value) = result
            && !ttl.is_zero()
        {
            let entry = CacheEntry {
                value: value.clone(),
                stored_at: self.clock.utc(),
                ttl,
            };
            state.store(key.clone(), entry, self.max_entries);
        }
    }

    /// Removes the entry for `key` and detaches any call in flight for it,
    /// so that call's result is not cached and later callers start a new
    /// one. Returns `false` when there was nothing to drop.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = self.lock();
        let cached = state.entries.remove(key).is_some();
        let pending = state.in_flight.remove(key).is_some();
        cached || pending
    }

    /// Removes entries whose key matches the regular expression `pattern`,
    /// or every entry when `pattern` is `None`, and detaches matching calls
    /// in flight. Returns the number of cached entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidPattern`] when `pattern` does not
    /// compile.
    pub fn invalidate_matching(&self, pattern: Option<&str>) -> Result<usize, OrchestratorError> {
        let Some(raw) = pattern else {
            let mut state = self.lock();
            let removed = state.entries.len();
            state.entries.clear();
            state.in_flight.clear();
            return Ok(removed);
        };
        let matcher = Regex::new(raw).map_err(|source| OrchestratorError::InvalidPattern {
            pattern: raw.to_owned(),
            source,
        })?;
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !matcher.is_match(key.as_str()));
        state.in_flight.retain(|key, _| !matcher.is_match(key.as_str()));
        Ok(before.saturating_sub(state.entries.len()))
    }

    /// Drops expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.utc();
        self.lock().purge_expired(now)
    }

    /// Returns `true` when a fresh entry exists for `key`.
    #[must_use]
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        let now = self.clock.utc();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(now))
    }

    /// Returns the number of stored entries, fresh or not.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns the number of calls currently in flight.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }
}
