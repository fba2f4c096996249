//! Service records, health snapshots and derived statistics.

use super::RegistryDomainError;
use super::fields::{self, Object};
use super::transport::{ServiceTransport, TransportKind};
use crate::health::{
    ErrorRateLevel, NormalizedStatus, ServiceStatus, error_rate_level, format_error_rate,
    format_latency, format_remaining, format_sample_size, is_service_available, normalize_status,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SERVICE_FIELDS: &[&str] = &[
    "name",
    "command",
    "args",
    "url",
    "status",
    "is_active",
    "state_metadata",
    "consecutive_successes",
    "consecutive_failures",
    "reconnect_attempts",
    "last_ping_time",
    "state_entered_time",
    "last_heartbeat",
    "error_message",
    "response_time",
    "error_rate",
    "sample_size",
    "next_retry_time",
];

/// Status keys outside [`ServiceStatus`] that older registries still report.
const RUNNING_KEY: &str = "running";
const STOPPED_KEY: &str = "stopped";
const ERROR_KEY: &str = "error";
const UNHEALTHY_KEY: &str = "unhealthy";

/// Raw health-probe telemetry, kept as reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceTelemetry {
    /// Probe latency in milliseconds.
    pub response_time: Option<Value>,
    /// Error rate as a ratio or percentage.
    pub error_rate: Option<Value>,
    /// Number of probes in the current window.
    pub sample_size: Option<Value>,
    /// Duration or deadline of the next reconnection attempt.
    pub next_retry_time: Option<Value>,
}

impl ServiceTelemetry {
    fn from_object(object: &Object) -> Self {
        Self {
            response_time: fields::present(object, "response_time"),
            error_rate: fields::present(object, "error_rate"),
            sample_size: fields::present(object, "sample_size"),
            next_retry_time: fields::present(object, "next_retry_time"),
        }
    }

    fn merge(&mut self, update: Self) {
        let Self {
            response_time,
            error_rate,
            sample_size,
            next_retry_time,
        } = update;
        if response_time.is_some() {
            self.response_time = response_time;
        }
        if error_rate.is_some() {
            self.error_rate = error_rate;
        }
        if sample_size.is_some() {
            self.sample_size = sample_size;
        }
        if next_retry_time.is_some() {
            self.next_retry_time = next_retry_time;
        }
    }

    /// Renders the telemetry for display.
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> TelemetryView {
        TelemetryView {
            latency: format_latency(self.response_time.as_ref()),
            error_rate: format_error_rate(self.error_rate.as_ref()),
            error_level: error_rate_level(self.error_rate.as_ref()),
            sample_size: format_sample_size(self.sample_size.as_ref()),
            retry_in: format_remaining(self.next_retry_time.as_ref(), None, now),
        }
    }
}

/// Display-ready telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryView {
    /// Formatted latency.
    pub latency: String,
    /// Formatted error rate.
    pub error_rate: String,
    /// Error-rate severity band.
    pub error_level: ErrorRateLevel,
    /// Formatted sample size.
    pub sample_size: String,
    /// Time until the next reconnection attempt.
    pub retry_in: String,
}

/// A normalised service as listed by the registry.
///
/// Optional fields are defaulted on construction, so consumers never branch
/// on missing counters or flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRecord {
    /// Unique service name.
    pub name: String,
    /// How the service is reached, when declared.
    pub transport: Option<ServiceTransport>,
    /// Health status.
    pub status: NormalizedStatus<ServiceStatus>,
    /// Whether the service is activated rather than only configured.
    pub is_active: bool,
    /// Consecutive successful probes.
    pub consecutive_successes: u64,
    /// Consecutive failed probes.
    pub consecutive_failures: u64,
    /// Reconnection attempts since the last success.
    pub reconnect_attempts: u64,
    /// Time of the last probe.
    pub last_ping_time: Option<DateTime<Utc>>,
    /// Time the current status was entered.
    pub state_entered_time: Option<DateTime<Utc>>,
    /// Time of the last heartbeat.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Last reported failure.
    pub error_message: Option<String>,
    /// Health-probe telemetry.
    pub telemetry: ServiceTelemetry,
    /// Fields this crate does not interpret.
    pub extra: Map<String, Value>,
}

impl ServiceRecord {
    /// Normalises one entry of a service listing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when the entry is not an object, has
    /// no name, or declares both a command and a URL.
    pub fn from_payload(payload: &Value) -> Result<Self, RegistryDomainError> {
        let object = payload.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        let name = fields::text(object, "name").ok_or(RegistryDomainError::MissingName)?;
        let transport = ServiceTransport::from_fields(&name, object)?;
        let is_active = object
            .get("is_active")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| object.get("state_metadata").is_some_and(|meta| !meta.is_null()));
        Ok(Self {
            transport,
            status: normalize_status(object.get("status").and_then(Value::as_str)),
            is_active,
            consecutive_successes: fields::count(object, "consecutive_successes"),
            consecutive_failures: fields::count(object, "consecutive_failures"),
            reconnect_attempts: fields::count(object, "reconnect_attempts"),
            last_ping_time: fields::timestamp(object, "last_ping_time"),
            state_entered_time: fields::timestamp(object, "state_entered_time"),
            last_heartbeat: fields::timestamp(object, "last_heartbeat"),
            error_message: fields::text(object, "error_message"),
            telemetry: ServiceTelemetry::from_object(object),
            extra: fields::remainder(object, SERVICE_FIELDS),
            name,
        })
    }

    /// Merges a health snapshot; fields absent from the snapshot keep their
    /// previous values.
    pub fn apply_health(&mut self, snapshot: &HealthSnapshot) {
        if let Some(status) = &snapshot.status {
            self.status = status.clone();
        }
        if snapshot.last_heartbeat.is_some() {
            self.last_heartbeat = snapshot.last_heartbeat;
        }
        if snapshot.error_message.is_some() {
            self.error_message.clone_from(&snapshot.error_message);
        }
        self.telemetry.merge(snapshot.telemetry.clone());
    }

    /// Returns the transport kind, if a transport is declared.
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport.as_ref().map(ServiceTransport::kind)
    }

    /// Returns `true` for status `healthy`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.is(ServiceStatus::Healthy)
    }

    /// Returns `true` for status `healthy` or `running`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_healthy() || self.status.key() == RUNNING_KEY
    }

    /// Returns `true` for status `stopped`.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.status.key() == STOPPED_KEY
    }

    /// Returns `true` for `error`, `unhealthy`, `circuit_open` or
    /// `disconnected`.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status.key(), ERROR_KEY | UNHEALTHY_KEY)
            || matches!(
                self.status.known(),
                Some(ServiceStatus::CircuitOpen | ServiceStatus::Disconnected)
            )
    }

    /// Returns `true` when the status is absent or `unknown`.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.status == NormalizedStatus::Unknown
    }

    /// Returns `true` when the service may be used now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        is_service_available(Some(self.status.key()))
    }
}

/// One entry of a health-check pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Service the snapshot belongs to.
    pub name: String,
    /// Reported status, if any.
    pub status: Option<NormalizedStatus<ServiceStatus>>,
    /// Reported heartbeat, if any.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Reported failure, if any.
    pub error_message: Option<String>,
    /// Reported telemetry.
    pub telemetry: ServiceTelemetry,
    /// The entry as received.
    pub details: Value,
}

impl HealthSnapshot {
    /// Reads one health-check entry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when the entry is not an object or
    /// has no name.
    pub fn from_payload(payload: &Value) -> Result<Self, RegistryDomainError> {
        let object = payload.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        let name = fields::text(object, "name").ok_or(RegistryDomainError::MissingName)?;
        Ok(Self {
            name,
            status: object
                .get("status")
                .and_then(Value::as_str)
                .map(|raw| normalize_status(Some(raw))),
            last_heartbeat: fields::timestamp(object, "last_heartbeat"),
            error_message: fields::text(object, "error_message"),
            telemetry: ServiceTelemetry::from_object(object),
            details: payload.clone(),
        })
    }
}

/// Summary counts over the service collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Number of services.
    pub total: usize,
    /// Services reporting `healthy` or `running`.
    pub running: usize,
    /// Services reporting `stopped`.
    pub stopped: usize,
    /// Services counted as failed.
    pub error: usize,
    /// Services with a local process transport.
    pub local: usize,
    /// Services with a remote HTTP transport.
    pub remote: usize,
    /// Services per status key.
    pub by_status: BTreeMap<String, usize>,
}

impl ServiceStats {
    /// Counts `records`.
    #[must_use]
    pub fn compute(records: &[ServiceRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Self::default()
            },
            |mut stats, record| {
                stats.running += usize::from(record.is_running());
                stats.stopped += usize::from(record.is_stopped());
                stats.error += usize::from(record.is_failed());
                match record.transport_kind() {
                    Some(TransportKind::Local) => stats.local += 1,
                    Some(TransportKind::Remote) => stats.remote += 1,
                    None => {}
                }
                *stats
                    .by_status
                    .entry(record.status.key().to_owned())
                    .or_default() += 1;
                stats
            },
        )
    }
}
