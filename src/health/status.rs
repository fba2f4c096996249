//! Status vocabularies and normalisation.

use super::meta::{StatusMeta, StatusTone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Sentinel key for absent or empty statuses.
pub const UNKNOWN_STATUS: &str = "unknown";

/// A closed set of status keys reported by one API surface.
pub trait StatusVocabulary: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Parses an already lower-cased, trimmed key.
    fn from_key(key: &str) -> Option<Self>;

    /// Returns the canonical key.
    fn key(self) -> &'static str;

    /// Returns the presentation metadata for the status.
    fn meta(self) -> StatusMeta;
}

/// Service health lifecycle reported by list and health-check payloads,
/// ordered roughly by recency of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Configuration loaded, nothing attempted yet.
    Init,
    /// Connection attempt in progress.
    Startup,
    /// Connected, awaiting the first successful probe.
    Ready,
    /// Probes are succeeding.
    Healthy,
    /// Probes succeed slowly or intermittently.
    Degraded,
    /// Cautiously retrying after the circuit opened.
    HalfOpen,
    /// Temporarily excluded from use after repeated failures.
    CircuitOpen,
    /// No longer connected.
    Disconnected,
}

impl ServiceStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Init,
        Self::Startup,
        Self::Ready,
        Self::Healthy,
        Self::Degraded,
        Self::HalfOpen,
        Self::CircuitOpen,
        Self::Disconnected,
    ];

    /// Returns the canonical key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Startup => "startup",
            Self::Ready => "ready",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::HalfOpen => "half_open",
            Self::CircuitOpen => "circuit_open",
            Self::Disconnected => "disconnected",
        }
    }

    /// Returns `false` while the service must not be used.
    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(
            self,
            Self::CircuitOpen | Self::HalfOpen | Self::Disconnected | Self::Init | Self::Startup
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::from_key(&normalized).ok_or_else(|| ParseStatusError(value.to_owned()))
    }
}

impl StatusVocabulary for ServiceStatus {
    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == key)
    }

    fn key(self) -> &'static str {
        self.as_str()
    }

    fn meta(self) -> StatusMeta {
        let (text, tone) = match self {
            Self::Init => ("Initializing", StatusTone::Info),
            Self::Startup => ("Starting", StatusTone::Info),
            Self::Ready => ("Ready", StatusTone::Ready),
            Self::Healthy => ("Healthy", StatusTone::Success),
            Self::Degraded => ("Degraded", StatusTone::Warning),
            Self::HalfOpen => ("Half-open", StatusTone::Warning),
            Self::CircuitOpen => ("Circuit open", StatusTone::Danger),
            Self::Disconnected => ("Disconnected", StatusTone::Muted),
        };
        StatusMeta::new(text, tone, self.as_str())
    }
}

/// Connection lifecycle reported by the monitoring surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// The connection is being established.
    Initializing,
    /// Connected and responsive.
    Healthy,
    /// Connected but showing errors.
    Warning,
    /// Re-establishing a lost connection.
    Reconnecting,
    /// Reconnection attempts are failing.
    Unreachable,
    /// A graceful shutdown is in progress.
    Disconnecting,
    /// Shut down.
    Disconnected,
}

impl LifecycleStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Initializing,
        Self::Healthy,
        Self::Warning,
        Self::Reconnecting,
        Self::Unreachable,
        Self::Disconnecting,
        Self::Disconnected,
    ];

    /// Returns the canonical key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Reconnecting => "reconnecting",
            Self::Unreachable => "unreachable",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    /// Returns `true` when calls may be routed to the service.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Healthy | Self::Warning)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LifecycleStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::from_key(&normalized).ok_or_else(|| ParseStatusError(value.to_owned()))
    }
}

impl StatusVocabulary for LifecycleStatus {
    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == key)
    }

    fn key(self) -> &'static str {
        self.as_str()
    }

    fn meta(self) -> StatusMeta {
        let (text, tone) = match self {
            Self::Initializing => ("Initializing", StatusTone::Info),
            Self::Healthy => ("Healthy", StatusTone::Success),
            Self::Warning => ("Warning", StatusTone::Warning),
            Self::Reconnecting => ("Reconnecting", StatusTone::Info),
            Self::Unreachable => ("Unreachable", StatusTone::Danger),
            Self::Disconnecting => ("Disconnecting", StatusTone::Warning),
            Self::Disconnected => ("Disconnected", StatusTone::Muted),
        };
        StatusMeta::new(text, tone, self.as_str())
    }
}

/// Error returned when a string is not a member of a status vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);

/// A raw status string classified against a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedStatus<S> {
    /// A member of the vocabulary.
    Known(S),
    /// A non-empty string outside the vocabulary, lower-cased.
    Unrecognized(String),
    /// Absent, empty, or the literal `unknown`.
    Unknown,
}

impl<S> Default for NormalizedStatus<S> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<S: StatusVocabulary> NormalizedStatus<S> {
    /// Classifies `raw`; never fails.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let normalized = raw.map(|value| value.trim().to_ascii_lowercase());
        match normalized.as_deref() {
            None | Some("" | UNKNOWN_STATUS) => Self::Unknown,
            Some(key) => S::from_key(key).map_or_else(|| Self::Unrecognized(key.to_owned()), Self::Known),
        }
    }

    /// Returns the normalised key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Known(status) => status.key(),
            Self::Unrecognized(key) => key,
            Self::Unknown => UNKNOWN_STATUS,
        }
    }

    /// Returns the vocabulary member, if any.
    #[must_use]
    pub fn known(&self) -> Option<S> {
        match self {
            Self::Known(status) => Some(*status),
            Self::Unrecognized(_) | Self::Unknown => None,
        }
    }

    /// Returns `true` when the status is exactly `status`.
    #[must_use]
    pub fn is(&self, status: S) -> bool {
        self.known() == Some(status)
    }

    /// Returns presentation metadata, falling back to a generic "unknown"
    /// presentation outside the vocabulary.
    #[must_use]
    pub fn meta(&self) -> StatusMeta {
        match self {
            Self::Known(status) => status.meta(),
            Self::Unrecognized(key) => StatusMeta::unknown(key.clone()),
            Self::Unknown => StatusMeta::unknown("Unknown"),
        }
    }
}

impl<S: StatusVocabulary> fmt::Display for NormalizedStatus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl<S: StatusVocabulary> Serialize for NormalizedStatus<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de, S: StatusVocabulary> Deserialize<'de> for NormalizedStatus<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::parse(raw.as_deref()))
    }
}

/// Lower-cases `raw` and classifies it against vocabulary `S`.
#[must_use]
pub fn normalize_status<S: StatusVocabulary>(raw: Option<&str>) -> NormalizedStatus<S> {
    NormalizedStatus::parse(raw)
}

/// Returns presentation metadata for `raw` in vocabulary `S`.
#[must_use]
pub fn status_meta<S: StatusVocabulary>(raw: Option<&str>) -> StatusMeta {
    normalize_status::<S>(raw).meta()
}

/// Decides whether a service with health status `raw` can be used now.
///
/// Only `circuit_open`, `half_open`, `disconnected`, `init` and `startup`
/// are unavailable. Every other input, including strings outside the
/// vocabulary and the `unknown` sentinel, counts as available.
#[must_use]
pub fn is_service_available(raw: Option<&str>) -> bool {
    normalize_status::<ServiceStatus>(raw)
        .known()
        .is_none_or(ServiceStatus::is_available)
}
