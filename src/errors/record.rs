//! Error records and the inputs they are normalised from.

use super::{ApiError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

const FALLBACK_MESSAGE: &str = "unknown error";

/// Monotonic identifier assigned by an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(u64);

impl ErrorId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A classified error as stored in the aggregator log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    id: ErrorId,
    message: String,
    kind: ErrorKind,
    source: Option<String>,
    code: Option<String>,
    details: Option<Value>,
    timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub(super) fn new(
        id: ErrorId,
        normalized: NormalizedError,
        context: ErrorContext,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            message: context.message.unwrap_or(normalized.message),
            kind: context.kind.or(normalized.kind).unwrap_or_default(),
            source: context.source,
            code: context.code.or(normalized.code),
            details: context.details.or(normalized.details),
            timestamp,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> ErrorId {
        self.id
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the taxonomy classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the component that reported the error.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns the machine-readable code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns structured details, if any.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Returns when the error was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Anything the aggregator accepts as an error.
#[derive(Debug, Clone)]
pub enum ErrorInput {
    /// A plain message.
    Message(String),
    /// A classified API failure.
    Api(ApiError),
    /// Any other error value.
    Failure(Arc<dyn StdError + Send + Sync>),
    /// A structured payload such as `{"message": .., "type": .., "code": ..}`.
    Structured(Value),
}

impl ErrorInput {
    /// Wraps an arbitrary error value.
    pub fn failure(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Failure(Arc::new(err))
    }

    pub(super) fn normalize(self) -> NormalizedError {
        match self {
            Self::Message(message) => NormalizedError::from_message(message),
            Self::Api(err) => NormalizedError {
                message: err.to_string(),
                kind: Some(err.kind()),
                code: match &err {
                    ApiError::Business { code, .. } => code.clone(),
                    ApiError::Response { status, .. } => Some(status.to_string()),
                    ApiError::NoResponse { .. } | ApiError::Request(_) | ApiError::Decode(_) => {
                        None
                    }
                },
                details: match err {
                    ApiError::Business { details, .. } => details,
                    ApiError::Response { body, .. } => body,
                    ApiError::NoResponse { .. } | ApiError::Request(_) | ApiError::Decode(_) => {
                        None
                    }
                },
            },
            Self::Failure(err) => NormalizedError::from_message(err.to_string()),
            Self::Structured(payload) => NormalizedError::from_payload(&payload),
        }
    }
}

impl From<&str> for ErrorInput {
    fn from(value: &str) -> Self {
        Self::Message(value.to_owned())
    }
}

impl From<String> for ErrorInput {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<ApiError> for ErrorInput {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

impl From<Value> for ErrorInput {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Error fields extracted from an [`ErrorInput`].
#[derive(Debug, Clone, PartialEq)]
pub(super) struct NormalizedError {
    pub(super) message: String,
    pub(super) kind: Option<ErrorKind>,
    pub(super) code: Option<String>,
    pub(super) details: Option<Value>,
}

impl NormalizedError {
    fn from_message(message: String) -> Self {
        let trimmed = message.trim();
        Self {
            message: if trimmed.is_empty() {
                FALLBACK_MESSAGE.to_owned()
            } else {
                trimmed.to_owned()
            },
            kind: None,
            code: None,
            details: None,
        }
    }

    fn from_payload(payload: &Value) -> Self {
        let message = match payload {
            Value::String(text) => text.clone(),
            Value::Object(fields) => fields
                .get("message")
                .or_else(|| fields.get("error"))
                .and_then(Value::as_str)
                .map_or_else(|| payload.to_string(), str::to_owned),
            other => other.to_string(),
        };
        let mut normalized = Self::from_message(message);
        normalized.kind = payload
            .get("type")
            .and_then(Value::as_str)
            .and_then(|raw| ErrorKind::try_from(raw).ok());
        normalized.code = payload.get("code").and_then(|code| match code {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        });
        normalized.details = payload.get("details").filter(|value| !value.is_null()).cloned();
        normalized
    }
}

/// Caller-supplied classification and presentation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub(super) kind: Option<ErrorKind>,
    pub(super) source: Option<String>,
    pub(super) code: Option<String>,
    pub(super) details: Option<Value>,
    pub(super) message: Option<String>,
    pub(super) silent: bool,
}

impl ErrorContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with a kind and a source.
    #[must_use]
    pub fn scoped(kind: ErrorKind, source: impl Into<String>) -> Self {
        Self::new().with_kind(kind).with_source(source)
    }

    /// Overrides the classification.
    #[must_use]
    pub const fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Names the reporting component.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Replaces the message derived from the input.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Suppresses the user-facing notification for this error.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Returns whether notification is suppressed.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.silent
    }
}
