//! Collaborators shared by every store.

use crate::errors::{ApiError, ApiResult, ErrorAggregator, ErrorContext, ErrorKind, ErrorRecord};
use crate::loading::LoadingStateTracker;
use crate::notify::{Notification, Notifier};
use crate::orchestrator::{CacheKey, RequestOrchestrator, RetryPolicy, retry_with_backoff};
use crate::registry::domain::{RegistryDomainError, open_envelope};
use crate::registry::ports::{LocalStore, LocalStoreError, RegistryApi, namespaced_key};
use futures_util::future::BoxFuture;
use mockable::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default TTL for cached list reads.
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(10);

/// Default number of concurrent calls in a batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Default cap on the persisted execution history.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Default namespace for persisted keys.
pub const DEFAULT_NAMESPACE: &str = "mcpstore";

/// Errors returned by store actions.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The registry call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A configuration was rejected before any call was made.
    #[error(transparent)]
    Config(#[from] RegistryDomainError),

    /// Local persistence failed.
    #[error(transparent)]
    LocalStore(#[from] LocalStoreError),

    /// No service has the given name.
    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    /// No tool has the given name.
    #[error("tool '{0}' not found")]
    ToolNotFound(String),
}

/// Result type for store actions.
pub type StoreResult<T> = Result<T, StoreError>;

/// Tunables applied by the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// TTL for cached list reads.
    pub list_ttl: Duration,
    /// Retry policy for reads. Mutations are sent once.
    pub retry: RetryPolicy,
    /// Maximum concurrent calls in batched executions.
    pub batch_concurrency: usize,
    /// Maximum number of execution records kept.
    pub history_limit: usize,
    /// Prefix for persisted keys.
    pub namespace: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            list_ttl: DEFAULT_LIST_TTL,
            retry: RetryPolicy::new(2, Duration::from_secs(1)),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

/// Explicitly constructed collaborators handed to each store.
pub struct StoreContext<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub(crate) api: Arc<A>,
    pub(crate) clock: Arc<C>,
    pub(crate) orchestrator: Arc<RequestOrchestrator<C>>,
    pub(crate) loading: Arc<LoadingStateTracker>,
    pub(crate) errors: Arc<ErrorAggregator<C>>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) local_store: Arc<dyn LocalStore>,
    pub(crate) settings: StoreSettings,
}

impl<A, C> StoreContext<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Bundles the collaborators.
    #[expect(clippy::too_many_arguments, reason = "composition root wiring")]
    #[must_use]
    pub fn new(
        api: Arc<A>,
        clock: Arc<C>,
        orchestrator: Arc<RequestOrchestrator<C>>,
        loading: Arc<LoadingStateTracker>,
        errors: Arc<ErrorAggregator<C>>,
        notifier: Arc<dyn Notifier>,
        local_store: Arc<dyn LocalStore>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            api,
            clock,
            orchestrator,
            loading,
            errors,
            notifier,
            local_store,
            settings,
        }
    }

    /// Returns the registry API.
    #[must_use]
    pub const fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Returns the request orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<RequestOrchestrator<C>> {
        &self.orchestrator
    }

    /// Returns the loading tracker.
    #[must_use]
    pub const fn loading(&self) -> &Arc<LoadingStateTracker> {
        &self.loading
    }

    /// Returns the error aggregator.
    #[must_use]
    pub const fn errors(&self) -> &Arc<ErrorAggregator<C>> {
        &self.errors
    }

    /// Returns the store settings.
    #[must_use]
    pub const fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Runs an idempotent read through the cache with retries and opens the
    /// envelope. `force` skips the cache and starts a new call even when one
    /// is already in flight. Transport failures are retried; `success: false`
    /// envelopes are not, and are never cached.
    pub(crate) async fn read<F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        force: bool,
        call: F,
    ) -> ApiResult<Value>
    where
        F: for<'a> Fn(&'a A) -> BoxFuture<'a, ApiResult<Value>> + Send + Sync + 'static,
    {
        let api = Arc::clone(&self.api);
        let policy = self.settings.retry;
        let thunk = move || async move {
            let body = retry_with_backoff(policy, || call(api.as_ref())).await?;
            open_envelope(body)
        };
        if force {
            self.orchestrator.execute_fresh(key, ttl, thunk).await
        } else {
            self.orchestrator.execute(key, ttl, thunk).await
        }
    }

    /// Drops every cached read whose key starts with `prefix` and detaches
    /// matching reads still in flight.
    pub(crate) fn invalidate_prefix(&self, prefix: &str) {
        let pattern = format!("^{}", regex::escape(prefix));
        if let Err(err) = self.orchestrator.invalidate_matching(Some(&pattern)) {
            warn!(error = %err, prefix, "cache invalidation failed");
        }
    }

    /// Records `err` under `kind` with `"<action>: <message>"`.
    pub(crate) fn record(
        &self,
        err: &ApiError,
        kind: ErrorKind,
        source: &str,
        action: &str,
    ) -> ErrorRecord {
        self.errors.add_error(
            err.clone(),
            ErrorContext::scoped(kind, source)
                .with_message(format!("{action}: {}", err.user_message())),
        )
    }

    /// Like [`Self::record`] but without a notification.
    pub(crate) fn record_silently(
        &self,
        err: &ApiError,
        kind: ErrorKind,
        source: &str,
        action: &str,
    ) -> ErrorRecord {
        self.errors.add_error(
            err.clone(),
            ErrorContext::scoped(kind, source)
                .with_message(format!("{action}: {}", err.user_message()))
                .silent(),
        )
    }

    pub(crate) fn notify_success(&self, title: &str, message: impl Into<String>) {
        self.notifier.notify(Notification::success(title, message));
    }

    /// Loads the JSON value persisted under `key`, falling back to the
    /// default when it is missing, unreadable or malformed.
    pub(crate) fn load_persisted<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let full_key = namespaced_key(&self.settings.namespace, key);
        let raw = match self.local_store.load(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(err) => {
                warn!(key = %full_key, error = %err, "local state unreadable; using defaults");
                return T::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key = %full_key, error = %err, "local state malformed; using defaults");
            T::default()
        })
    }

    /// Persists `value` as JSON under `key`.
    pub(crate) fn persist<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), LocalStoreError> {
        let full_key = namespaced_key(&self.settings.namespace, key);
        let raw = serde_json::to_string(value).map_err(LocalStoreError::storage)?;
        self.local_store.save(&full_key, &raw)
    }
}

/// Single-flight marker for a collection fetch.
#[derive(Debug, Default)]
pub(crate) struct InFlight(AtomicBool);

/// Outcome of [`InFlight::claim`].
pub(crate) enum FetchSlot<'a> {
    /// This fetch holds the marker until the guard drops.
    Claimed(InFlightGuard<'a>),
    /// Another fetch holds the marker but this one was forced.
    Forced,
    /// Another fetch holds the marker; skip.
    Busy,
}

impl InFlight {
    /// Claims the marker. A forced fetch proceeds even when it is taken.
    pub(crate) fn claim(&self, force: bool) -> FetchSlot<'_> {
        match self
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => FetchSlot::Claimed(InFlightGuard(&self.0)),
            Err(_) if force => FetchSlot::Forced,
            Err(_) => FetchSlot::Busy,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases an [`InFlight`] marker on drop.
pub(crate) struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Parses every entry with `parse`, skipping malformed ones with a warning.
pub(crate) fn normalize_records<T>(
    raw: &[Value],
    entity: &str,
    parse: impl Fn(&Value) -> Result<T, RegistryDomainError>,
) -> Vec<T> {
    raw.iter()
        .filter_map(|entry| match parse(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(entity, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}
