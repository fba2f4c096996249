//! Bounded error log with a notification policy.

use super::record::NormalizedError;
use super::{ApiError, ErrorContext, ErrorId, ErrorInput, ErrorKind, ErrorRecord};
use crate::notify::{Notification, Notifier};
use mockable::Clock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::error;

/// Default number of records retained.
pub const DEFAULT_ERROR_CAPACITY: usize = 100;

/// Number of records returned by [`ErrorAggregator::recent_errors`].
pub const RECENT_ERROR_COUNT: usize = 5;

/// Construction options for [`ErrorAggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAggregatorConfig {
    /// Maximum number of records kept; the oldest are evicted first.
    pub capacity: usize,
    /// Whether recorded errors produce user-facing notifications.
    pub notify: bool,
    /// Source assigned when the caller does not name one.
    pub default_source: Option<String>,
}

impl Default for ErrorAggregatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ERROR_CAPACITY,
            notify: true,
            default_source: None,
        }
    }
}

/// Ring buffer of classified errors.
///
/// Records are stored oldest first. Once `capacity` is exceeded the oldest
/// record is evicted. The "last error" is always the newest surviving record.
pub struct ErrorAggregator<C: Clock + Send + Sync> {
    clock: Arc<C>,
    notifier: Option<Arc<dyn Notifier>>,
    config: ErrorAggregatorConfig,
    log: Mutex<ErrorLog>,
}

struct ErrorLog {
    next_id: u64,
    records: VecDeque<ErrorRecord>,
}

impl<C: Clock + Send + Sync> ErrorAggregator<C> {
    /// Creates an aggregator without a notifier.
    #[must_use]
    pub fn new(clock: Arc<C>, config: ErrorAggregatorConfig) -> Self {
        Self {
            clock,
            notifier: None,
            config: ErrorAggregatorConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            log: Mutex::new(ErrorLog {
                next_id: 1,
                records: VecDeque::new(),
            }),
        }
    }

    /// Routes notifications for recorded errors to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ErrorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Normalises `input`, appends it to the log and applies the notification
    /// policy.
    pub fn add_error(&self, input: impl Into<ErrorInput>, context: ErrorContext) -> ErrorRecord {
        let normalized = input.into().normalize();
        self.record(normalized, context)
    }

    /// Classifies a transport failure and records it.
    ///
    /// The message is the operator-facing text for the failure, prefixed with
    /// `context` when one is given.
    pub fn handle_api_error(&self, err: &ApiError, context: &str) -> ErrorRecord {
        let base = err.user_message();
        let message = if context.trim().is_empty() {
            base
        } else {
            format!("{}: {base}", context.trim())
        };
        let normalized = ErrorInput::Api(err.clone()).normalize();
        self.record(
            NormalizedError {
                message,
                ..normalized
            },
            ErrorContext::new(),
        )
    }

    fn record(&self, normalized: NormalizedError, mut context: ErrorContext) -> ErrorRecord {
        if context.source.is_none() {
            context.source.clone_from(&self.config.default_source);
        }
        let silent = context.is_silent();
        let record = {
            let mut log = self.lock();
            let id = ErrorId::new(log.next_id);
            log.next_id = log.next_id.saturating_add(1);
            let entry = ErrorRecord::new(id, normalized, context, self.clock.utc());
            log.records.push_back(entry.clone());
            while log.records.len() > self.config.capacity {
                log.records.pop_front();
            }
            entry
        };

        error!(
            id = record.id().into_inner(),
            kind = %record.kind(),
            source = record.source().unwrap_or("-"),
            "{}",
            record.message()
        );

        if self.config.notify && !silent {
            self.notify(&record);
        }
        record
    }

    fn notify(&self, record: &ErrorRecord) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let title = record.source().unwrap_or("error");
        let notification = match record.kind() {
            ErrorKind::Warning => Notification::warning(title, record.message()),
            ErrorKind::Critical => Notification::error(title, record.message()).persistent(),
            _ => Notification::error(title, record.message()),
        };
        notifier.notify(notification);
    }

    /// Removes every record.
    pub fn clear_errors(&self) {
        self.lock().records.clear();
    }

    /// Removes records of `kind`, returning how many were removed.
    pub fn clear_errors_by_kind(&self, kind: ErrorKind) -> usize {
        self.retain(|record| record.kind() != kind)
    }

    /// Removes records reported by `source`, returning how many were removed.
    pub fn clear_errors_by_source(&self, source: &str) -> usize {
        self.retain(|record| record.source() != Some(source))
    }

    /// Removes a single record. Returns `false` when the id is unknown.
    pub fn remove_error(&self, id: ErrorId) -> bool {
        self.retain(|record| record.id() != id) > 0
    }

    fn retain(&self, keep: impl Fn(&ErrorRecord) -> bool) -> usize {
        let mut log = self.lock();
        let before = log.records.len();
        log.records.retain(|record| keep(record));
        before.saturating_sub(log.records.len())
    }

    /// Returns every record, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// Returns at most five records, newest first.
    #[must_use]
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.lock()
            .records
            .iter()
            .rev()
            .take(RECENT_ERROR_COUNT)
            .cloned()
            .collect()
    }

    /// Returns records of `kind`, oldest first.
    #[must_use]
    pub fn errors_by_kind(&self, kind: ErrorKind) -> Vec<ErrorRecord> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.kind() == kind)
            .cloned()
            .collect()
    }

    /// Returns records reported by `source`, oldest first.
    #[must_use]
    pub fn errors_by_source(&self, source: &str) -> Vec<ErrorRecord> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.source() == Some(source))
            .cloned()
            .collect()
    }

    /// Returns the newest surviving record.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.lock().records.back().cloned()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns `true` when at least one record is stored.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.lock().records.is_empty()
    }
}
