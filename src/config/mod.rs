//! Console configuration.
//!
//! [`ConsoleConfig`] is read from a JSON file through a directory capability
//! and then adjusted from the environment. Every field has a default, so an
//! empty object is a complete configuration. Durations are milliseconds.
//!
//! ```json
//! {
//!   "api": { "base_url": "http://127.0.0.1:18200/api", "timeout_ms": 30000 },
//!   "cache": { "list_ttl_ms": 10000 },
//!   "retry": { "max_attempts": 2, "base_delay_ms": 1000 },
//!   "refresh": { "enabled": true, "interval_ms": 60000 },
//!   "storage": { "namespace": "mcpstore", "directory": "/var/lib/console" }
//! }
//! ```

mod preferences;

pub use preferences::{PREFERENCES_KEY, Preferences, Theme};

use crate::errors::{DEFAULT_ERROR_CAPACITY, ErrorAggregatorConfig};
use crate::orchestrator::RetryPolicy;
use crate::registry::services::{
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_HISTORY_LIMIT, DEFAULT_LIST_TTL, DEFAULT_NAMESPACE,
    StoreSettings,
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Overrides the registry base URL.
pub const BASE_URL_ENV: &str = "CONSOLE_SYNC_API_BASE_URL";

/// Overrides the request timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "CONSOLE_SYNC_API_TIMEOUT_MS";

/// Default registry base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:18200/api";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default value of the API version header.
pub const DEFAULT_API_VERSION: &str = "1.0.0";

/// Default auto-refresh interval.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;

/// Errors raised while loading a configuration file.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File name relative to the directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// The file is not a valid configuration.
    #[error("failed to parse config: {0}")]
    Parse(Arc<serde_json::Error>),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Remote API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Value sent in the API version header.
    pub api_version: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_version: DEFAULT_API_VERSION.to_owned(),
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL applied to collection list reads.
    pub list_ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_ttl_ms: millis(DEFAULT_LIST_TTL),
        }
    }
}

/// Retry policy for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1_000,
        }
    }
}

/// Error log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorSettings {
    /// Records retained.
    pub capacity: usize,
    /// Whether recorded errors produce notifications.
    pub notify: bool,
    /// Source assigned when none is given.
    pub default_source: Option<String>,
}

impl Default for ErrorSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ERROR_CAPACITY,
            notify: true,
            default_source: None,
        }
    }
}

/// Auto-refresh settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Start the timer when the console is started.
    pub enabled: bool,
    /// Time between passes.
    pub interval_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

/// Local persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Prefix for persisted keys.
    pub namespace: String,
    /// Directory for persisted state; in memory when absent.
    pub directory: Option<Utf8PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            directory: None,
        }
    }
}

/// Complete console configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Remote API connection.
    pub api: ApiSettings,
    /// Cache lifetimes.
    pub cache: CacheSettings,
    /// Read retries.
    pub retry: RetrySettings,
    /// Concurrent calls per batch.
    pub batch_concurrency: usize,
    /// Error log.
    pub errors: ErrorSettings,
    /// Execution records kept.
    pub history_limit: usize,
    /// Auto-refresh.
    pub refresh: RefreshSettings,
    /// Local persistence.
    pub storage: StorageSettings,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            errors: ErrorSettings::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            refresh: RefreshSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl ConsoleConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not valid JSON or a
    /// field has the wrong type.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(Arc::new(err)))
    }

    /// Reads and parses `file` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(dir: &Dir, file: &Utf8Path) -> ConfigResult<Self> {
        let text = dir.read_to_string(file).map_err(|err| ConfigError::Read {
            path: file.to_owned(),
            source: Arc::new(err),
        })?;
        Self::from_json_str(&text)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name. Values that cannot be
    /// parsed are ignored with a warning.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV) {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                warn!(variable = BASE_URL_ENV, "ignoring empty override");
            } else {
                trimmed.clone_into(&mut self.api.base_url);
            }
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(timeout_ms) if timeout_ms > 0 => self.api.timeout_ms = timeout_ms,
                _ => warn!(variable = TIMEOUT_ENV, value = %raw, "ignoring invalid override"),
            }
        }
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    /// Time between auto-refresh passes.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh.interval_ms)
    }

    /// Settings handed to the stores.
    #[must_use]
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            list_ttl: Duration::from_millis(self.cache.list_ttl_ms),
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.base_delay_ms),
            ),
            batch_concurrency: self.batch_concurrency.max(1),
            history_limit: self.history_limit,
            namespace: self.storage.namespace.clone(),
        }
    }

    /// Settings for the error aggregator.
    #[must_use]
    pub fn error_settings(&self) -> ErrorAggregatorConfig {
        ErrorAggregatorConfig {
            capacity: self.errors.capacity,
            notify: self.errors.notify,
            default_source: self.errors.default_source.clone(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
