//! Error classification and the bounded error log.
//!
//! Failures are classified once, at the API boundary, into [`ApiError`].
//! Store actions then decide whether to record them in an
//! [`ErrorAggregator`], which keeps the newest records, exposes filtered
//! views and applies the notification policy.

mod aggregator;
mod api;
mod kind;
mod record;

pub use aggregator::{
    DEFAULT_ERROR_CAPACITY, ErrorAggregator, ErrorAggregatorConfig, RECENT_ERROR_COUNT,
};
pub use api::{ApiError, ApiResult};
pub use kind::{ErrorKind, ParseErrorKindError};
pub use record::{ErrorContext, ErrorId, ErrorInput, ErrorRecord};

#[cfg(test)]
mod tests;
