//! Composition root.
//!
//! A [`Console`] owns exactly one of each shared collaborator and hands the
//! same instances to every store, so all stores see one cache, one set of
//! loading flags and one error log.

use crate::config::{ConsoleConfig, Preferences};
use crate::errors::ErrorAggregator;
use crate::loading::LoadingStateTracker;
use crate::notify::{NotificationFeed, Notifier};
use crate::orchestrator::RequestOrchestrator;
use crate::registry::adapters::{
    DirLocalStore, HttpRegistryApi, HttpRegistryApiError, InMemoryLocalStore,
};
use crate::registry::ports::{LocalStore, LocalStoreError, LocalStoreResult, RegistryApi};
use crate::registry::services::{
    AgentStore, RefreshScheduler, ServiceStore, StoreContext, SystemStore, ToolStore,
};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while connecting a console.
#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    /// The registry client could not be built.
    #[error(transparent)]
    Api(#[from] HttpRegistryApiError),

    /// The local state directory could not be opened.
    #[error(transparent)]
    LocalStore(#[from] LocalStoreError),
}

/// Result type for console construction.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Registry console state: the stores and their shared collaborators.
pub struct Console<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    config: ConsoleConfig,
    context: Arc<StoreContext<A, C>>,
    notifications: Arc<NotificationFeed<C>>,
    services: Arc<ServiceStore<A, C>>,
    tools: Arc<ToolStore<A, C>>,
    agents: Arc<AgentStore<A, C>>,
    system: Arc<SystemStore<A, C>>,
    scheduler: Arc<RefreshScheduler<A, C>>,
}

/// Console talking to a remote registry over HTTP.
pub type HttpConsole = Console<HttpRegistryApi, DefaultClock>;

impl HttpConsole {
    /// Connects to the registry named in `config` using the system clock.
    ///
    /// Local state goes to `config.storage.directory` when set and stays in
    /// memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError`] when the HTTP client cannot be built or the
    /// state directory cannot be opened.
    pub fn connect(config: ConsoleConfig) -> ConsoleResult<Self> {
        let api = HttpRegistryApi::new(
            &config.api.base_url,
            config.api_timeout(),
            &config.api.api_version,
        )?;
        let local_store: Arc<dyn LocalStore> = match &config.storage.directory {
            Some(directory) => Arc::new(DirLocalStore::open(directory)?),
            None => Arc::new(InMemoryLocalStore::new()),
        };
        info!(base_url = %api.base_url(), "registry console connected");
        Ok(Self::new(
            Arc::new(api),
            Arc::new(DefaultClock),
            local_store,
            config,
        ))
    }
}

impl<A, C> Console<A, C>
where
    A: RegistryApi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Wires the stores around `api`.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        clock: Arc<C>,
        local_store: Arc<dyn LocalStore>,
        config: ConsoleConfig,
    ) -> Self {
        let notifications = Arc::new(NotificationFeed::new(Arc::clone(&clock)));
        let notifier: Arc<dyn Notifier> = notifications.clone();
        let errors = Arc::new(
            ErrorAggregator::new(Arc::clone(&clock), config.error_settings())
                .with_notifier(Arc::clone(&notifier)),
        );
        let context = Arc::new(StoreContext::new(
            api,
            Arc::clone(&clock),
            Arc::new(RequestOrchestrator::new(clock)),
            Arc::new(LoadingStateTracker::default()),
            errors,
            notifier,
            local_store,
            config.store_settings(),
        ));
        let services = Arc::new(ServiceStore::new(Arc::clone(&context)));
        let system = Arc::new(SystemStore::new(Arc::clone(&context)));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&context),
            Arc::clone(&services),
            Arc::clone(&system),
        ));
        Self {
            tools: Arc::new(ToolStore::new(Arc::clone(&context))),
            agents: Arc::new(AgentStore::new(Arc::clone(&context))),
            config,
            context,
            notifications,
            services,
            system,
            scheduler,
        }
    }

    /// Configuration the console was built with.
    #[must_use]
    pub const fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Shared collaborators.
    #[must_use]
    pub const fn context(&self) -> &Arc<StoreContext<A, C>> {
        &self.context
    }

    /// Error log shared by every store.
    #[must_use]
    pub fn errors(&self) -> &Arc<ErrorAggregator<C>> {
        self.context.errors()
    }

    /// Loading flags shared by every store.
    #[must_use]
    pub fn loading(&self) -> &Arc<LoadingStateTracker> {
        self.context.loading()
    }

    /// Notification history.
    #[must_use]
    pub const fn notifications(&self) -> &Arc<NotificationFeed<C>> {
        &self.notifications
    }

    /// Service store.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceStore<A, C>> {
        &self.services
    }

    /// Tool store.
    #[must_use]
    pub const fn tools(&self) -> &Arc<ToolStore<A, C>> {
        &self.tools
    }

    /// Agent store.
    #[must_use]
    pub const fn agents(&self) -> &Arc<AgentStore<A, C>> {
        &self.agents
    }

    /// Resource and health summary store.
    #[must_use]
    pub const fn system(&self) -> &Arc<SystemStore<A, C>> {
        &self.system
    }

    /// Refresh scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<RefreshScheduler<A, C>> {
        &self.scheduler
    }

    /// Loads the saved operator preferences.
    #[must_use]
    pub fn preferences(&self) -> Preferences {
        Preferences::load(
            self.context.local_store.as_ref(),
            &self.context.settings().namespace,
        )
    }

    /// Saves operator preferences.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError`] when the preferences cannot be written.
    pub fn save_preferences(&self, preferences: &Preferences) -> LocalStoreResult<()> {
        preferences.save(
            self.context.local_store.as_ref(),
            &self.context.settings().namespace,
        )
    }

    /// Starts the refresh timer when the configuration or the saved
    /// preferences enable it. Returns whether a timer was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if !(self.config.refresh.enabled || self.preferences().auto_refresh) {
            return false;
        }
        self.scheduler
            .start_auto_refresh(self.config.refresh_interval())
    }

    /// Stops the refresh timer and clears every store.
    pub fn shutdown(&self) {
        self.scheduler.stop_auto_refresh();
        self.services.reset();
        self.tools.reset();
        self.agents.reset();
        self.system.reset();
    }
}
