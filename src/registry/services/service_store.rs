//! Service collection store.

use super::context::{FetchSlot, InFlight, StoreContext, StoreError, StoreResult, normalize_records};
use crate::errors::{ApiResult, ErrorContext, ErrorKind};
use crate::health::{NormalizedStatus, ServiceStatus};
use crate::loading::LoadingKey;
use crate::orchestrator::CacheKey;
use crate::registry::domain::{
    HealthSnapshot, ServiceConfig, ServiceRecord, ServiceStats, TelemetryView, TransportKind,
    extract_collection, extract_object, open_envelope,
};
use crate::registry::ports::RegistryApi;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const SOURCE: &str = "services";
const CACHE_PREFIX: &str = "services:";
const LIST_KEY: &str = "services:list";
const HEALTH_KEY: &str = "services:health";
const COLLECTION_FIELD: &str = "services";

/// Latest health-check result for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    /// Status after the check.
    pub status: NormalizedStatus<ServiceStatus>,
    /// When the check result arrived.
    pub last_check: DateTime<Utc>,
    /// The check entry as received.
    pub details: Value,
}

/// Connection state reported for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    /// Whether the service is connected.
    pub connected: bool,
    /// Additional reported fields.
    pub details: Value,
    /// When the status was recorded.
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ServiceState {
    services: Vec<ServiceRecord>,
    stats: ServiceStats,
    current: Option<String>,
    health: HashMap<String, ServiceHealth>,
    connections: HashMap<String, ConnectionStatus>,
    metrics: HashMap<String, Value>,
    last_update: Option<DateTime<Utc>>,
}

impl ServiceState {
    fn refresh_stats(&mut self) {
        self.stats = ServiceStats::compute(&self.services);
    }

    fn filtered(&self, keep: impl Fn(&ServiceRecord) -> bool) -> Vec<ServiceRecord> {
        self.services
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }
}

/// Owns the service collection and its side tables.
///
/// The collection is replaced wholesale by [`Self::fetch_services`], merged
/// by name by [`Self::check_services_health`], and shrunk in place by
/// [`Self::delete_service`]. Every other mutation refetches. Derived lists
/// and statistics are projections of the current collection.
///
/// Overlapping forced fetches are not sequenced: whichever response arrives
/// last is kept.
pub struct ServiceStore<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    ctx: Arc<StoreContext<A, C>>,
    in_flight: InFlight,
    state: RwLock<ServiceState>,
}

impl<A, C> ServiceStore<A, C>
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
            state: RwLock::new(ServiceState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the service list and replaces the collection.
    ///
    /// Returns `Ok(None)` without calling the registry when a fetch is
    /// already in flight, unless `force` is set. A forced fetch also
    /// bypasses the response cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] when the call fails or the payload shape
    /// is not recognised; the collection is left untouched and a
    /// `fetch-error` is recorded.
    pub async fn fetch_services(&self, force: bool) -> StoreResult<Option<Vec<ServiceRecord>>> {
        match self.guarded_fetch(force).await {
            Ok(records) => Ok(records),
            Err(err) => {
                self.ctx
                    .record(&err, ErrorKind::FetchError, SOURCE, "failed to fetch services");
                Err(err.into())
            }
        }
    }

    /// Background variant of [`Self::fetch_services`] with `force` set: a
    /// failure is logged and recorded without a notification, and the
    /// collection keeps its stale records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] when the call fails or the payload shape
    /// is not recognised.
    pub async fn poll_services(&self) -> StoreResult<Option<Vec<ServiceRecord>>> {
        match self.guarded_fetch(true).await {
            Ok(records) => Ok(records),
            Err(err) => {
                warn!(error = %err, "background service fetch failed; keeping stale data");
                self.ctx.record_silently(
                    &err,
                    ErrorKind::FetchError,
                    SOURCE,
                    "failed to fetch services",
                );
                Err(err.into())
            }
        }
    }

    async fn guarded_fetch(&self, force: bool) -> ApiResult<Option<Vec<ServiceRecord>>> {
        let slot = self.in_flight.claim(force);
        if matches!(slot, FetchSlot::Busy) {
            debug!("service fetch already in flight; skipping");
            return Ok(None);
        }
        let loaded = self
            .ctx
            .loading
            .with_loading(&[LoadingKey::Services], self.load_services(force))
            .await;
        drop(slot);
        loaded.map(Some)
    }

    async fn load_services(&self, force: bool) -> ApiResult<Vec<ServiceRecord>> {
        let body = self
            .ctx
            .read(
                &CacheKey::new(LIST_KEY),
                self.ctx.settings.list_ttl,
                force,
                |api| api.list_services(),
            )
            .await?;
        let raw = extract_collection(&body, COLLECTION_FIELD)?;
        let records = normalize_records(&raw, "service", ServiceRecord::from_payload);
        let now = self.ctx.clock.utc();
        let mut guard = self.write();
        let state = &mut *guard;
        state.services.clone_from(&records);
        state.refresh_stats();
        state.last_update = Some(now);
        let active = records.iter().filter(|record| record.is_active).count();
        info!(total = records.len(), active, "services loaded");
        Ok(records)
    }

    async fn refetch(&self) {
        if let Err(err) = self.fetch_services(true).await {
            warn!(error = %err, "refetch after service mutation failed");
        }
    }

    async fn mutate<F>(
        &self,
        key: LoadingKey,
        kind: ErrorKind,
        action: &str,
        success: String,
        call: F,
    ) -> StoreResult<Value>
    where
        F: Future<Output = ApiResult<Value>>,
    {
        let _busy = self.ctx.loading.acquire(&[key]);
        match call.await.and_then(open_envelope) {
            Ok(body) => {
                self.ctx.invalidate_prefix(CACHE_PREFIX);
                self.refetch().await;
                self.ctx.notify_success(action, success);
                Ok(extract_object(&body))
            }
            Err(err) => {
                self.ctx
                    .record(&err, kind, SOURCE, &format!("{action} failed"));
                Err(err.into())
            }
        }
    }

    /// Validates `config` locally, submits it and refetches the collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] without contacting the registry when
    /// the configuration is empty, malformed or uses a removed field, and
    /// [`StoreError::Api`] when the registry rejects it. Both record an
    /// `add-error`.
    pub async fn add_service(&self, config: Value) -> StoreResult<Value> {
        let validated = match ServiceConfig::new(config) {
            Ok(validated) => validated,
            Err(err) => {
                self.ctx.errors.add_error(
                    format!("invalid service configuration: {err}"),
                    ErrorContext::scoped(ErrorKind::AddError, SOURCE),
                );
                return Err(StoreError::Config(err));
            }
        };
        let label = validated.label();
        self.mutate(
            LoadingKey::Adding,
            ErrorKind::AddError,
            "add service",
            format!("service \"{label}\" added"),
            self.ctx.api.add_service(validated.as_value()),
        )
        .await
    }

    /// Replaces the configuration of `name` and refetches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records an `update-error` when the
    /// registry call fails.
    pub async fn update_service(&self, name: &str, config: &Value) -> StoreResult<Value> {
        self.mutate(
            LoadingKey::Updating,
            ErrorKind::UpdateError,
            "update service",
            format!("service \"{name}\" updated"),
            self.ctx.api.update_service(name, config),
        )
        .await
    }

    /// Restarts `name` and refetches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records an `update-error` when the
    /// registry call fails.
    pub async fn restart_service(&self, name: &str) -> StoreResult<Value> {
        self.mutate(
            LoadingKey::Updating,
            ErrorKind::UpdateError,
            "restart service",
            format!("service \"{name}\" restarted"),
            self.ctx.api.restart_service(name),
        )
        .await
    }

    /// Applies several configuration updates and refetches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records an `update-error` when the
    /// registry call fails.
    pub async fn batch_update_services(&self, updates: &Value) -> StoreResult<Value> {
        let count = updates.as_array().map_or(0, Vec::len);
        self.mutate(
            LoadingKey::Updating,
            ErrorKind::UpdateError,
            "batch update services",
            format!("{count} services updated"),
            self.ctx.api.batch_update_services(updates),
        )
        .await
    }

    /// Removes several services and refetches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `delete-error` when the
    /// registry call fails.
    pub async fn batch_delete_services(&self, names: &[String]) -> StoreResult<Value> {
        self.mutate(
            LoadingKey::Deleting,
            ErrorKind::DeleteError,
            "batch delete services",
            format!("{} services removed", names.len()),
            self.ctx.api.batch_delete_services(names),
        )
        .await
    }

    /// Restarts several services and refetches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records an `update-error` when the
    /// registry call fails.
    pub async fn batch_restart_services(&self, names: &[String]) -> StoreResult<Value> {
        self.mutate(
            LoadingKey::Updating,
            ErrorKind::UpdateError,
            "batch restart services",
            format!("{} services restarted", names.len()),
            self.ctx.api.batch_restart_services(names),
        )
        .await
    }

    /// Removes `name` remotely, then drops it and its side-table entries
    /// locally without refetching.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `delete-error` when the
    /// registry call fails; local state is left untouched.
    pub async fn delete_service(&self, name: &str) -> StoreResult<()> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Deleting]);
        let outcome = self
            .ctx
            .api
            .delete_service(name)
            .await
            .and_then(open_envelope);
        if let Err(err) = outcome {
            self.ctx
                .record(&err, ErrorKind::DeleteError, SOURCE, "delete service failed");
            return Err(err.into());
        }
        self.ctx.invalidate_prefix(CACHE_PREFIX);
        {
            let mut guard = self.write();
            let state = &mut *guard;
            state.services.retain(|record| record.name != name);
            state.health.remove(name);
            state.connections.remove(name);
            state.metrics.remove(name);
            if state.current.as_deref() == Some(name) {
                state.current = None;
            }
            state.refresh_stats();
        }
        info!(service = name, "service removed");
        self.ctx
            .notify_success("delete service", format!("service \"{name}\" removed"));
        Ok(())
    }

    /// Runs a health-check pass and merges the snapshots by name.
    ///
    /// Snapshots for unknown services are ignored; fields a snapshot omits
    /// keep their previous values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] and records a `health-check-error` when
    /// the call fails; records are left untouched.
    pub async fn check_services_health(&self) -> StoreResult<Vec<HealthSnapshot>> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Checking]);
        self.load_health().await.map_err(|err| {
            self.ctx
                .record(&err, ErrorKind::HealthCheckError, SOURCE, "health check failed");
            err.into()
        })
    }

    /// Background variant of [`Self::check_services_health`]: a failure is
    /// logged and recorded without a notification, and stale data is kept.
    pub async fn poll_health(&self) -> Option<Vec<HealthSnapshot>> {
        let _busy = self.ctx.loading.acquire(&[LoadingKey::Checking]);
        match self.load_health().await {
            Ok(snapshots) => Some(snapshots),
            Err(err) => {
                warn!(error = %err, "background health check failed; keeping stale data");
                self.ctx.record_silently(
                    &err,
                    ErrorKind::HealthCheckError,
                    SOURCE,
                    "health check failed",
                );
                None
            }
        }
    }

    async fn load_health(&self) -> ApiResult<Vec<HealthSnapshot>> {
        let body = self
            .ctx
            .read(&CacheKey::new(HEALTH_KEY), Duration::ZERO, false, |api| {
                api.check_services()
            })
            .await?;
        let raw = extract_collection(&body, COLLECTION_FIELD)?;
        let snapshots = normalize_records(&raw, "health snapshot", HealthSnapshot::from_payload);
        let now = self.ctx.clock.utc();
        let mut guard = self.write();
        let state = &mut *guard;
        for snapshot in &snapshots {
            let Some(record) = state
                .services
                .iter_mut()
                .find(|record| record.name == snapshot.name)
            else {
                debug!(service = %snapshot.name, "health snapshot for unknown service");
                continue;
            };
            record.apply_health(snapshot);
            state.health.insert(
                snapshot.name.clone(),
                ServiceHealth {
                    status: record.status.clone(),
                    last_check: now,
                    details: snapshot.details.clone(),
                },
            );
        }
        state.refresh_stats();
        Ok(snapshots)
    }

    /// Recomputes and returns the summary statistics.
    pub fn update_stats(&self) -> ServiceStats {
        let mut guard = self.write();
        guard.refresh_stats();
        guard.stats.clone()
    }

    /// Records the connection state of `name`.
    pub fn update_connection_status(&self, name: &str, connected: bool, details: Value) {
        let status = ConnectionStatus {
            connected,
            details,
            last_update: self.ctx.clock.utc(),
        };
        self.write().connections.insert(name.to_owned(), status);
    }

    /// Records client-side metrics for `name`.
    pub fn record_metrics(&self, name: &str, metrics: Value) {
        self.write().metrics.insert(name.to_owned(), metrics);
    }

    /// Marks `name` as the selected service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ServiceNotFound`] when no service has that
    /// name.
    pub fn select_service(&self, name: &str) -> StoreResult<ServiceRecord> {
        let mut state = self.write();
        let record = state
            .services
            .iter()
            .find(|record| record.name == name)
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_owned()))?;
        state.current = Some(record.name.clone());
        Ok(record)
    }

    /// Returns the selected service, if it still exists.
    #[must_use]
    pub fn current_service(&self) -> Option<ServiceRecord> {
        let state = self.read();
        let current = state.current.as_deref()?;
        state
            .services
            .iter()
            .find(|record| record.name == current)
            .cloned()
    }

    /// Returns the service named `name`.
    #[must_use]
    pub fn get_service(&self, name: &str) -> Option<ServiceRecord> {
        self.read()
            .services
            .iter()
            .find(|record| record.name == name)
            .cloned()
    }

    /// Returns every service.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceRecord> {
        self.read().services.clone()
    }

    /// Returns the last computed statistics.
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        self.read().stats.clone()
    }

    /// Services with status `healthy`.
    #[must_use]
    pub fn healthy_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(ServiceRecord::is_healthy)
    }

    /// Services with any status other than `healthy`.
    #[must_use]
    pub fn unhealthy_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(|record| !record.is_healthy())
    }

    /// Services reporting `error` or `unhealthy`, or with an open circuit or
    /// lost connection.
    #[must_use]
    pub fn failed_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(ServiceRecord::is_failed)
    }

    /// Services reporting `healthy` or `running`.
    #[must_use]
    pub fn running_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(ServiceRecord::is_running)
    }

    /// Services with a local process transport.
    #[must_use]
    pub fn local_services(&self) -> Vec<ServiceRecord> {
        self.read()
            .filtered(|record| record.transport_kind() == Some(TransportKind::Local))
    }

    /// Services with a remote HTTP transport.
    #[must_use]
    pub fn remote_services(&self) -> Vec<ServiceRecord> {
        self.read()
            .filtered(|record| record.transport_kind() == Some(TransportKind::Remote))
    }

    /// Services without a status.
    #[must_use]
    pub fn unknown_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(ServiceRecord::is_unknown)
    }

    /// Services that may be used right now.
    #[must_use]
    pub fn available_services(&self) -> Vec<ServiceRecord> {
        self.read().filtered(ServiceRecord::is_available)
    }

    /// Healthy services not reported as disconnected.
    #[must_use]
    pub fn active_services(&self) -> Vec<ServiceRecord> {
        let state = self.read();
        state.filtered(|record| {
            record.is_healthy()
                && state
                    .connections
                    .get(&record.name)
                    .is_none_or(|connection| connection.connected)
        })
    }

    /// Services grouped by status key.
    #[must_use]
    pub fn services_by_status(&self) -> BTreeMap<String, Vec<ServiceRecord>> {
        let mut grouped: BTreeMap<String, Vec<ServiceRecord>> = BTreeMap::new();
        for record in &self.read().services {
            grouped
                .entry(record.status.key().to_owned())
                .or_default()
                .push(record.clone());
        }
        grouped
    }

    /// Percentage of healthy services with one decimal; `0` when empty.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "percentage is presentation-only"
    )]
    pub fn health_rate(&self) -> f64 {
        let state = self.read();
        let total = state.services.len();
        if total == 0 {
            return 0.0;
        }
        let healthy = state.services.iter().filter(|record| record.is_healthy()).count();
        (healthy as f64 / total as f64 * 1000.0).round() / 10.0
    }

    /// Latest health-check result for `name`.
    #[must_use]
    pub fn service_health(&self, name: &str) -> Option<ServiceHealth> {
        self.read().health.get(name).cloned()
    }

    /// Connection state recorded for `name`.
    #[must_use]
    pub fn connection_status(&self, name: &str) -> Option<ConnectionStatus> {
        self.read().connections.get(name).cloned()
    }

    /// Metrics recorded for `name`.
    #[must_use]
    pub fn service_metrics(&self, name: &str) -> Option<Value> {
        self.read().metrics.get(name).cloned()
    }

    /// Presentation strings for the telemetry of `name`.
    #[must_use]
    pub fn telemetry_view(&self, name: &str) -> Option<TelemetryView> {
        let now = self.ctx.clock.utc();
        self.read()
            .services
            .iter()
            .find(|record| record.name == name)
            .map(|record| record.telemetry.render(now))
    }

    /// When the collection was last replaced.
    #[must_use]
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.read().last_update
    }

    /// Returns `true` while a fetch holds the in-flight marker.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Clears the collection, side tables and selection.
    pub fn reset(&self) {
        *self.write() = ServiceState::default();
        info!("service store reset");
    }
}
