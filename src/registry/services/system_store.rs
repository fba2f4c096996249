//! Host resource and health summary snapshots.

use super::context::StoreContext;
use crate::errors::{ApiResult, ErrorKind};
use crate::loading::LoadingKey;
use crate::orchestrator::CacheKey;
use crate::registry::domain::extract_object;
use crate::registry::ports::RegistryApi;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::warn;

const SOURCE: &str = "system";
const RESOURCES_KEY: &str = "system:resources";
const SUMMARY_KEY: &str = "system:health-summary";

/// A payload and the time it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Payload as received.
    pub data: Value,
    /// Arrival time.
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SystemState {
    resources: Option<Snapshot>,
    summary: Option<Snapshot>,
}

/// Keeps the latest resource usage and health summary.
///
/// Failures never propagate: they are recorded as `fetch-error`s and the
/// previous snapshot is kept. The `poll_*` variants record without a
/// notification.
pub struct SystemStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    ctx: Arc<StoreContext<A, C>>,
    state: RwLock<SystemState>,
}

impl<A, C> SystemStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a store without snapshots.
    #[must_use]
    pub fn new(ctx: Arc<StoreContext<A, C>>) -> Self {
        Self {
            ctx,
            state: RwLock::new(SystemState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SystemState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SystemState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches host resource usage. Returns `None` on failure.
    pub async fn fetch_system_resources(&self) -> Option<Value> {
        match self.load_resources().await {
            Ok(data) => Some(data),
            Err(err) => {
                self.ctx.record(
                    &err,
                    ErrorKind::FetchError,
                    SOURCE,
                    "failed to fetch system resources",
                );
                None
            }
        }
    }

    /// Background variant of [`Self::fetch_system_resources`]: a failure is
    /// logged and recorded without a notification.
    pub async fn poll_system_resources(&self) -> Option<Value> {
        match self.load_resources().await {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(error = %err, "background resource fetch failed; keeping stale data");
                self.ctx.record_silently(
                    &err,
                    ErrorKind::FetchError,
                    SOURCE,
                    "failed to fetch system resources",
                );
                None
            }
        }
    }

    async fn load_resources(&self) -> ApiResult<Value> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Resources]);
        let body = self
            .ctx
            .read(&CacheKey::new(RESOURCES_KEY), Duration::ZERO, false, |api| {
                api.system_resources()
            })
            .await?;
        let data = extract_object(&body);
        self.write().resources = Some(self.snapshot(data.clone()));
        Ok(data)
    }

    /// Fetches the aggregate health summary. Returns `None` on failure.
    pub async fn fetch_health_summary(&self) -> Option<Value> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Health]);
        let fetched = self
            .ctx
            .read(&CacheKey::new(SUMMARY_KEY), Duration::ZERO, false, |api| {
                api.health_summary()
            })
            .await;
        match fetched {
            Ok(body) => {
                let data = extract_object(&body);
                self.write().summary = Some(self.snapshot(data.clone()));
                Some(data)
            }
            Err(err) => {
                self.ctx.record(
                    &err,
                    ErrorKind::FetchError,
                    SOURCE,
                    "failed to fetch health summary",
                );
                None
            }
        }
    }

    fn snapshot(&self, data: Value) -> Snapshot {
        Snapshot {
            data,
            fetched_at: self.ctx.clock.utc(),
        }
    }

    /// Latest resource usage.
    #[must_use]
    pub fn resources(&self) -> Option<Snapshot> {
        self.read().resources.clone()
    }

    /// Latest health summary.
    #[must_use]
    pub fn health_summary(&self) -> Option<Snapshot> {
        self.read().summary.clone()
    }

    /// Drops both snapshots.
    pub fn reset(&self) {
        *self.write() = SystemState::default();
    }
}
