//! Transport and envelope failures, classified once at the API boundary.

use super::ErrorKind;
use serde_json::Value;
use thiserror::Error;

/// Result type for remote registry calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a call to the remote registry.
///
/// The variants mirror what was observed on the wire: a response with a
/// non-success status, a request that got no response, a request that could
/// not be sent at all, an envelope flagged `success: false`, or a payload
/// whose shape is not recognised. Values are `Clone` so one in-flight result
/// can be handed to every deduplicated waiter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, possibly empty.
        message: String,
        /// Parsed response body, when it was JSON.
        body: Option<Value>,
    },

    /// The request was sent but no response arrived.
    #[error("no response received: {reason}")]
    NoResponse {
        /// Transport-level description.
        reason: String,
        /// Whether the client gave up because of its timeout.
        timed_out: bool,
    },

    /// The request could not be built or sent.
    #[error("request could not be sent: {0}")]
    Request(String),

    /// The envelope reported `success: false`.
    #[error("{message}")]
    Business {
        /// Domain message supplied by the server.
        message: String,
        /// Machine-readable error code, when supplied.
        code: Option<String>,
        /// Additional structured details, when supplied.
        details: Option<Value>,
    },

    /// The payload did not match any recognised response shape.
    #[error("unrecognised response payload: {0}")]
    Decode(String),
}

impl ApiError {
    /// Creates a [`ApiError::NoResponse`] error.
    #[must_use]
    pub fn no_response(reason: impl Into<String>, timed_out: bool) -> Self {
        Self::NoResponse {
            reason: reason.into(),
            timed_out,
        }
    }

    /// Creates a [`ApiError::Decode`] error.
    #[must_use]
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    /// Returns the HTTP status code when a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::NoResponse { .. } | Self::Request(_) | Self::Business { .. } | Self::Decode(_) => {
                None
            }
        }
    }

    /// Maps the failure onto the error taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Response { status, .. } => match *status {
                401 | 403 => ErrorKind::Auth,
                404 => ErrorKind::NotFound,
                400..=499 => ErrorKind::Validation,
                500..=599 => ErrorKind::Server,
                _ => ErrorKind::Error,
            },
            Self::NoResponse { timed_out: true, .. } => ErrorKind::Timeout,
            Self::NoResponse { .. } => ErrorKind::Network,
            Self::Request(_) => ErrorKind::Error,
            Self::Business { .. } => ErrorKind::Business,
            Self::Decode(_) => ErrorKind::Validation,
        }
    }

    /// Returns the message shown to an operator for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Response {
                status, message, ..
            } => response_message(*status, message),
            Self::NoResponse {
                timed_out: true, ..
            } => "request timed out".to_owned(),
            Self::NoResponse { .. } => "network connection failed, check network settings".to_owned(),
            Self::Request(reason) => reason.clone(),
            Self::Business { message, .. } => message.clone(),
            Self::Decode(_) => self.to_string(),
        }
    }
}

fn response_message(status: u16, body_message: &str) -> String {
    let supplied = Some(body_message.trim()).filter(|text| !text.is_empty());
    match status {
        401 => "unauthorized, please sign in again".to_owned(),
        403 => "insufficient permissions".to_owned(),
        404 => supplied.unwrap_or("resource not found").to_owned(),
        500 => "internal server error".to_owned(),
        503 => "service temporarily unavailable".to_owned(),
        400..=499 => supplied.unwrap_or("invalid request parameters").to_owned(),
        _ => supplied.map_or_else(|| format!("request failed ({status})"), str::to_owned),
    }
}
