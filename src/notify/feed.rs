//! Bounded in-process notification feed.

use super::{Notification, NotificationLevel, Notifier};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default number of notifications retained by the feed.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Unique identifier for a feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A notification stored in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    id: NotificationId,
    notification: Notification,
    timestamp: DateTime<Utc>,
    read: bool,
}

impl NotificationEntry {
    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> NotificationId {
        self.id
    }

    /// Returns the stored notification.
    #[must_use]
    pub const fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Returns when the notification was received.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns whether the entry has been read.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read
    }
}

/// Newest-first notification list capped at a fixed capacity.
///
/// Every notification is also emitted as a `tracing` event so headless
/// embeddings still see them.
pub struct NotificationFeed<C: Clock + Send + Sync> {
    clock: Arc<C>,
    capacity: usize,
    entries: Mutex<VecDeque<NotificationEntry>>,
}

impl<C: Clock + Send + Sync> NotificationFeed<C> {
    /// Creates a feed with the default capacity.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self::with_capacity(clock, DEFAULT_FEED_CAPACITY)
    }

    /// Creates a feed retaining at most `capacity` entries (minimum one).
    #[must_use]
    pub fn with_capacity(clock: Arc<C>, capacity: usize) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<NotificationEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns all entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Returns the number of unread entries.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|entry| !entry.read).count()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when the feed holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Marks one entry as read. Returns `false` when the id is unknown.
    pub fn mark_read(&self, id: NotificationId) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.iter_mut().find(|candidate| candidate.id == id) else {
            return false;
        };
        entry.read = true;
        true
    }

    /// Marks every entry as read.
    pub fn mark_all_read(&self) {
        for entry in self.lock().iter_mut() {
            entry.read = true;
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<C: Clock + Send + Sync> Notifier for NotificationFeed<C> {
    fn notify(&self, notification: Notification) {
        match notification.level() {
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(title = notification.title(), "{}", notification.message());
            }
            NotificationLevel::Warning => {
                warn!(title = notification.title(), "{}", notification.message());
            }
            NotificationLevel::Error => {
                error!(title = notification.title(), "{}", notification.message());
            }
        }

        let entry = NotificationEntry {
            id: NotificationId::new(),
            notification,
            timestamp: self.clock.utc(),
            read: false,
        };
        let mut entries = self.lock();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }
}
