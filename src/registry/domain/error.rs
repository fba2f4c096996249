//! Error types for registry record normalisation and config validation.

use thiserror::Error;

/// Errors returned while reading registry payloads or validating service
/// configurations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDomainError {
    /// The payload or configuration is not a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// A record or single-service configuration has no usable name.
    #[error("record has no usable name")]
    MissingName,

    /// The configuration is empty.
    #[error("service configuration must not be empty")]
    EmptyConfig,

    /// The configuration carries a field the registry no longer accepts.
    #[error("service configuration field '{0}' is no longer supported")]
    UnsupportedField(String),

    /// A service declares both a local command and a remote URL.
    #[error("service '{0}' must declare either a command or a url, not both")]
    ConflictingTransport(String),

    /// A service declares neither a local command nor a remote URL.
    #[error("service '{0}' must declare a command or a url")]
    MissingTransport(String),
}
