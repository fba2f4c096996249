//! Cache keys and TTL-stamped entries.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Key identifying one idempotent read.
///
/// Keys derived with [`CacheKey::for_call`] start with the operation name,
/// so pattern invalidation can target a whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an explicit key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a key from an operation name and its parameters.
    ///
    /// Calls without parameters (`null`) use the bare operation name;
    /// otherwise the SHA-256 digest of the serialised parameters is appended.
    /// Object keys serialise in sorted order, so equal parameter sets always
    /// produce equal keys.
    #[must_use]
    pub fn for_call(operation: &str, params: &Value) -> Self {
        if params.is_null() {
            return Self::new(operation);
        }
        let digest = Sha256::digest(params.to_string().as_bytes());
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        Self(format!("{operation}:{hex}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A cached payload stamped with its storage time and TTL.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct CacheEntry {
    pub(super) value: Value,
    pub(super) stored_at: DateTime<Utc>,
    pub(super) ttl: Duration,
}

impl CacheEntry {
    /// An entry is fresh while `now − stored_at < ttl`.
    pub(super) fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        chrono::Duration::from_std(self.ttl).map_or(true, |ttl| age < ttl)
    }
}
