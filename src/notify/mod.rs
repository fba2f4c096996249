//! User-facing notifications.
//!
//! Stores and the error aggregator report outcomes through the [`Notifier`]
//! port. [`NotificationFeed`] is the in-process adapter that keeps a bounded,
//! newest-first list with an unread counter.

mod feed;

pub use feed::{DEFAULT_FEED_CAPACITY, NotificationEntry, NotificationFeed, NotificationId};

use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// An operation completed successfully.
    Success,
    /// Neutral information.
    Info,
    /// Something degraded but the console keeps working.
    Warning,
    /// An operation failed.
    Error,
}

impl NotificationLevel {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as emitted by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    level: NotificationLevel,
    title: String,
    message: String,
    persistent: bool,
}

impl Notification {
    /// Creates a transient notification.
    #[must_use]
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            persistent: false,
        }
    }

    /// Creates a success notification.
    #[must_use]
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, message)
    }

    /// Creates a warning notification.
    #[must_use]
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title, message)
    }

    /// Creates an error notification.
    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, message)
    }

    /// Marks the notification as persistent (not auto-dismissed).
    #[must_use]
    pub const fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Returns the severity.
    #[must_use]
    pub const fn level(&self) -> NotificationLevel {
        self.level
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether the notification should stay until dismissed.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Publishes a notification.
    fn notify(&self, notification: Notification);
}
