//! Closed error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification attached to every error record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Unclassified failure.
    #[default]
    Error,
    /// Degradation worth surfacing as a warning.
    Warning,
    /// Failure that must stay visible until dismissed.
    Critical,
    /// The request never reached the server.
    Network,
    /// The request was sent but no response arrived in time.
    Timeout,
    /// The server rejected the request parameters.
    Validation,
    /// The server refused the caller's credentials or permissions.
    Auth,
    /// The requested resource does not exist.
    NotFound,
    /// The server failed while handling the request.
    Server,
    /// The envelope reported `success: false`.
    Business,
    /// A collection fetch failed.
    FetchError,
    /// Adding a service failed.
    AddError,
    /// Updating, restarting or batch-mutating services failed.
    UpdateError,
    /// Deleting a service failed.
    DeleteError,
    /// Executing a tool failed.
    ExecutionError,
    /// A health-check pass failed.
    HealthCheckError,
    /// A scheduled or manual refresh failed.
    RefreshError,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::Error,
        Self::Warning,
        Self::Critical,
        Self::Network,
        Self::Timeout,
        Self::Validation,
        Self::Auth,
        Self::NotFound,
        Self::Server,
        Self::Business,
        Self::FetchError,
        Self::AddError,
        Self::UpdateError,
        Self::DeleteError,
        Self::ExecutionError,
        Self::HealthCheckError,
        Self::RefreshError,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::NotFound => "not-found",
            Self::Server => "server",
            Self::Business => "business",
            Self::FetchError => "fetch-error",
            Self::AddError => "add-error",
            Self::UpdateError => "update-error",
            Self::DeleteError => "delete-error",
            Self::ExecutionError => "execution-error",
            Self::HealthCheckError => "health-check-error",
            Self::RefreshError => "refresh-error",
        }
    }

    /// Returns `true` for the store-operation wrappers (`fetch-error` and
    /// friends) as opposed to transport classifications.
    #[must_use]
    pub const fn is_operation_scoped(self) -> bool {
        matches!(
            self,
            Self::FetchError
                | Self::AddError
                | Self::UpdateError
                | Self::DeleteError
                | Self::ExecutionError
                | Self::HealthCheckError
                | Self::RefreshError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ErrorKind {
    type Error = ParseErrorKindError;

    fn try_from(value: &str) -> Result<Self, ParseErrorKindError> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        if normalized == "fatal" {
            return Ok(Self::Critical);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseErrorKindError(value.to_owned()))
    }
}

/// Error returned when a string does not name a known [`ErrorKind`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown error kind: {0}")]
pub struct ParseErrorKindError(pub String);
