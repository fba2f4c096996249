//! Operator preferences persisted in the local store.

use crate::registry::ports::{LocalStore, LocalStoreError, LocalStoreResult, namespaced_key};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Local store key holding the preferences.
pub const PREFERENCES_KEY: &str = "preferences";

/// Colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light scheme.
    #[default]
    Light,
    /// Dark scheme.
    Dark,
    /// Follow the host setting.
    Auto,
}

/// Operator preferences.
///
/// Stored values are merged over the defaults, so a record written by an
/// older version that lacks a field still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Colour scheme.
    pub theme: Theme,
    /// Whether the refresh timer should run.
    pub auto_refresh: bool,
    /// Rows per page in list views.
    pub page_size: usize,
    /// Whether notifications are shown.
    pub show_notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            auto_refresh: false,
            page_size: 20,
            show_notifications: true,
        }
    }
}

impl Preferences {
    /// Loads the preferences saved under `namespace`, falling back to the
    /// defaults when they are missing, unreadable or malformed.
    #[must_use]
    pub fn load(store: &dyn LocalStore, namespace: &str) -> Self {
        let key = namespaced_key(namespace, PREFERENCES_KEY);
        match store.load(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(key = %key, error = %err, "stored preferences malformed; using defaults");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(err) => {
                warn!(key = %key, error = %err, "stored preferences unreadable; using defaults");
                Self::default()
            }
        }
    }

    /// Saves the preferences under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError`] when the value cannot be written.
    pub fn save(&self, store: &dyn LocalStore, namespace: &str) -> LocalStoreResult<()> {
        let raw = serde_json::to_string(self).map_err(LocalStoreError::storage)?;
        store.save(&namespaced_key(namespace, PREFERENCES_KEY), &raw)
    }

    /// Removes the saved preferences.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError`] when the key cannot be removed.
    pub fn clear(store: &dyn LocalStore, namespace: &str) -> LocalStoreResult<()> {
        store.remove(&namespaced_key(namespace, PREFERENCES_KEY))
    }
}
