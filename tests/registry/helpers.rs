//! Shared fixtures for the registry integration tests.

use console_sync::config::ConsoleConfig;
use console_sync::console::Console;
use console_sync::registry::adapters::{InMemoryLocalStore, InMemoryRegistryApi};
use console_sync::registry::ports::LocalStore;
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::{Value, json};
use std::sync::Arc;

/// Console wired to in-memory adapters.
pub type TestConsole = Console<InMemoryRegistryApi, DefaultClock>;

/// A console together with handles on its adapters.
pub struct Harness {
    pub api: Arc<InMemoryRegistryApi>,
    pub local_store: Arc<InMemoryLocalStore>,
    pub console: TestConsole,
}

impl Harness {
    /// Builds a console over the given adapters.
    pub fn with(
        api: Arc<InMemoryRegistryApi>,
        local_store: Arc<InMemoryLocalStore>,
        config: ConsoleConfig,
    ) -> Self {
        let shared: Arc<dyn LocalStore> = local_store.clone();
        let console = Console::new(api.clone(), Arc::new(DefaultClock), shared, config);
        Self {
            api,
            local_store,
            console,
        }
    }

    /// Builds a second console sharing this harness's adapters.
    pub fn reopen(&self) -> Self {
        Self::with(
            self.api.clone(),
            self.local_store.clone(),
            self.console.config().clone(),
        )
    }
}

/// Configuration without retries so failures surface immediately.
#[fixture]
pub fn config() -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 1;
    config
}

/// A console over empty in-memory adapters.
#[fixture]
pub fn harness(config: ConsoleConfig) -> Harness {
    Harness::with(
        Arc::new(InMemoryRegistryApi::new()),
        Arc::new(InMemoryLocalStore::new()),
        config,
    )
}

/// A local service entry as the registry lists it.
pub fn local_service(name: &str, status: &str) -> Value {
    json!({ "name": name, "status": status, "command": "npx", "args": ["-y", name] })
}

/// A remote service entry as the registry lists it.
pub fn remote_service(name: &str, status: &str) -> Value {
    json!({ "name": name, "status": status, "url": format!("https://{name}.example.com/mcp") })
}

/// A tool entry as the registry lists it.
pub fn tool(name: &str, service: &str) -> Value {
    json!({
        "name": name,
        "service_name": service,
        "description": format!("{name} tool"),
        "inputSchema": { "type": "object" }
    })
}

/// Wraps `data` in a successful envelope.
pub fn ok_envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}
