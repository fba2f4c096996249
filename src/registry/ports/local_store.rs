//! Local key/value persistence port.

use std::sync::Arc;
use thiserror::Error;

/// Result type for local store operations.
pub type LocalStoreResult<T> = Result<T, LocalStoreError>;

/// String key/value storage that outlives the process.
///
/// Keys are already namespaced by the caller; see [`namespaced_key`].
pub trait LocalStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError::Storage`] when the backing store cannot be
    /// read.
    fn load(&self, key: &str) -> LocalStoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError::Storage`] when the value cannot be written.
    fn save(&self, key: &str, value: &str) -> LocalStoreResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError::Storage`] when the key cannot be removed.
    fn remove(&self, key: &str) -> LocalStoreResult<()>;
}

/// Errors returned by local store implementations.
#[derive(Debug, Clone, Error)]
pub enum LocalStoreError {
    /// The key cannot be mapped onto the backing store.
    #[error("invalid local store key: {0}")]
    InvalidKey(String),

    /// Storage-layer failure.
    #[error("local storage error: {0}")]
    Storage(Arc<dyn std::error::Error + Send + Sync>),
}

impl LocalStoreError {
    /// Wraps a storage-layer error.
    #[must_use]
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Arc::new(err))
    }
}

/// Builds the persisted key `<namespace>-<key>`.
#[must_use]
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    format!("{namespace}-{key}")
}
