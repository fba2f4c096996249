//! Health state normalisation.
//!
//! Two independent status vocabularies are reported by the registry:
//! [`ServiceStatus`] for list and health-check payloads and
//! [`LifecycleStatus`] for connection monitoring. Both implement
//! [`StatusVocabulary`], so raw strings are normalised with
//! [`normalize_status`] by choosing the vocabulary as a type parameter.
//! [`is_service_available`] is the one availability predicate for services.

mod meta;
mod metrics;
mod status;

pub use meta::{StatusMeta, StatusTone};
pub use metrics::{
    ErrorRateLevel, PLACEHOLDER, error_rate_level, format_absolute_time, format_error_rate,
    format_latency, format_remaining, format_sample_size, parse_timestamp, remaining_seconds,
};
pub use status::{
    LifecycleStatus, NormalizedStatus, ParseStatusError, ServiceStatus, StatusVocabulary,
    UNKNOWN_STATUS, is_service_available, normalize_status, status_meta,
};

#[cfg(test)]
mod tests;
