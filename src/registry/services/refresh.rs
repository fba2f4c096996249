//! On-demand and periodic refresh fan-out.

use super::context::{FetchSlot, InFlight, StoreContext};
use super::service_store::ServiceStore;
use super::system_store::SystemStore;
use crate::errors::{ErrorContext, ErrorKind};
use crate::loading::LoadingKey;
use crate::notify::Notification;
use crate::registry::ports::RegistryApi;
use mockable::Clock;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SOURCE: &str = "refresh";
const BRANCH_COUNT: usize = 3;

/// Outcome of one [`RefreshScheduler::refresh_all`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    /// The service list was replaced.
    pub services: bool,
    /// The health pass completed.
    pub health: bool,
    /// Resource usage was fetched.
    pub resources: bool,
}

impl RefreshReport {
    /// Number of branches that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        [self.services, self.health, self.resources]
            .into_iter()
            .filter(|ok| !ok)
            .count()
    }

    /// Whether every branch succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Runs the refresh fan-out, once on demand or on a timer.
///
/// A pass fetches services, runs a background health check and fetches
/// resource usage concurrently. Overlapping passes are skipped rather than
/// queued. The auto-refresh task holds only a weak reference, so dropping the
/// scheduler also ends the timer.
pub struct RefreshScheduler<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    ctx: Arc<StoreContext<A, C>>,
    services: Arc<ServiceStore<A, C>>,
    system: Arc<SystemStore<A, C>>,
    in_flight: InFlight,
    timer: Mutex<Option<CancellationToken>>,
}

impl<A, C> RefreshScheduler<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a scheduler over the given stores.
    #[must_use]
    pub fn new(
        ctx: Arc<StoreContext<A, C>>,
        services: Arc<ServiceStore<A, C>>,
        system: Arc<SystemStore<A, C>>,
    ) -> Self {
        Self {
            ctx,
            services,
            system,
            in_flight: InFlight::default(),
            timer: Mutex::new(None),
        }
    }

    /// Refreshes every collection concurrently and sends one summary
    /// notification.
    ///
    /// Returns `None` without doing anything when a pass is already running.
    /// Failed branches are recorded without notifications of their own. The
    /// `refreshing` flag stays set until every branch has settled.
    pub async fn refresh_all(&self) -> Option<RefreshReport> {
        let slot = self.in_flight.claim(false);
        if matches!(slot, FetchSlot::Busy) {
            debug!("refresh already in progress; skipping");
            return None;
        }
        let (services, health, resources) = self
            .ctx
            .loading
            .with_loading(&[LoadingKey::Refreshing], async {
                tokio::join!(
                    self.services.poll_services(),
                    self.services.poll_health(),
                    self.system.poll_system_resources(),
                )
            })
            .await;
        drop(slot);

        let report = RefreshReport {
            services: services.is_ok(),
            health: health.is_some(),
            resources: resources.is_some(),
        };
        self.summarize(report);
        Some(report)
    }

    fn summarize(&self, report: RefreshReport) {
        if report.is_complete() {
            info!("refresh completed");
            self.ctx
                .notifier
                .notify(Notification::success("Refreshed", "all data refreshed"));
            return;
        }
        let failed = report.failed_count();
        let message = format!("{failed} of {BRANCH_COUNT} refresh steps failed");
        warn!(?report, "refresh completed with failures");
        self.ctx.errors.add_error(
            message.as_str(),
            ErrorContext::scoped(ErrorKind::RefreshError, SOURCE).silent(),
        );
        self.ctx
            .notifier
            .notify(Notification::warning("Refresh incomplete", message));
    }

    /// Whether a refresh pass is running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Starts calling [`Self::refresh_all`] every `interval`, the first call
    /// one interval from now. Ticks missed while a pass runs are skipped.
    ///
    /// Returns `false` when the timer is already running or `interval` is
    /// zero. Must be called from within a tokio runtime.
    pub fn start_auto_refresh(self: &Arc<Self>, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!("auto-refresh interval must be positive");
            return false;
        }
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return false;
        }
        let token = CancellationToken::new();
        *timer = Some(token.clone());
        drop(timer);

        let scheduler = Arc::downgrade(self);
        tokio::spawn(run_timer(scheduler, interval, token));
        info!(interval_ms = interval.as_millis(), "auto-refresh started");
        true
    }

    /// Stops the timer. Calling it when no timer runs has no effect.
    pub fn stop_auto_refresh(&self) {
        let stopped = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = stopped {
            token.cancel();
            info!("auto-refresh stopped");
        }
    }

    /// Whether the timer is running.
    #[must_use]
    pub fn is_auto_refreshing(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl<A, C> Drop for RefreshScheduler<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

async fn run_timer<A, C>(
    scheduler: Weak<RefreshScheduler<A, C>>,
    interval: Duration,
    token: CancellationToken,
) where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(live) = scheduler.upgrade() else {
                    break;
                };
                if live.refresh_all().await.is_none() {
                    debug!("auto-refresh tick skipped; refresh in progress");
                }
            }
        }
    }
    debug!("auto-refresh task finished");
}
