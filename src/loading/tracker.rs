//! Loading-state map, scoped guards and per-key handles.

use super::LoadingKey;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::warn;

/// Point-in-time copy of every flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingSnapshot {
    global: bool,
    flags: BTreeMap<LoadingKey, bool>,
}

impl LoadingSnapshot {
    /// Returns `true` when the global flag or any key is set.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.global || self.flags.values().any(|busy| *busy)
    }

    /// Returns the global flag.
    #[must_use]
    pub const fn is_global_loading(&self) -> bool {
        self.global
    }

    /// Returns the flag for `key`, `false` when the key is not tracked.
    #[must_use]
    pub fn get(&self, key: &LoadingKey) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    /// Returns every key currently set.
    #[must_use]
    pub fn active_keys(&self) -> Vec<LoadingKey> {
        self.flags
            .iter()
            .filter(|(_, busy)| **busy)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns the per-key flags.
    #[must_use]
    pub const fn flags(&self) -> &BTreeMap<LoadingKey, bool> {
        &self.flags
    }
}

/// Thread-safe map of operation busy flags.
///
/// Every change is published to [`LoadingStateTracker::subscribe`] receivers.
pub struct LoadingStateTracker {
    state: Mutex<LoadingSnapshot>,
    updates: watch::Sender<LoadingSnapshot>,
}

impl Default for LoadingStateTracker {
    fn default() -> Self {
        Self::new(LoadingKey::WELL_KNOWN)
    }
}

impl LoadingStateTracker {
    /// Creates a tracker declaring `keys`, all initially `false`.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = LoadingKey>) -> Self {
        let initial = LoadingSnapshot {
            global: false,
            flags: keys.into_iter().map(|key| (key, false)).collect(),
        };
        let (updates, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            updates,
        }
    }

    fn update<T>(&self, change: impl FnOnce(&mut LoadingSnapshot) -> T) -> T {
        let mut state = self.lock();
        let outcome = change(&mut state);
        self.updates.send_if_modified(|published| {
            if *published == *state {
                false
            } else {
                published.clone_from(&*state);
                true
            }
        });
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, LoadingSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_flag(state: &mut LoadingSnapshot, key: &LoadingKey, value: bool) {
        if let Some(flag) = state.flags.get_mut(key) {
            *flag = value;
        } else {
            warn!(key = %key, "loading key was not declared; creating it");
            state.flags.insert(key.clone(), value);
        }
    }

    /// Sets the flag for `key`. Undeclared keys are created with a warning.
    pub fn set_loading(&self, key: &LoadingKey, value: bool) {
        self.update(|state| Self::write_flag(state, key, value));
    }

    /// Returns the flag for `key`, `false` for undeclared keys.
    #[must_use]
    pub fn get_loading(&self, key: &LoadingKey) -> bool {
        self.lock().get(key)
    }

    /// Sets the global flag.
    pub fn set_global_loading(&self, value: bool) {
        self.update(|state| state.global = value);
    }

    /// Returns the global flag.
    #[must_use]
    pub fn is_global_loading(&self) -> bool {
        self.lock().global
    }

    /// Returns `true` when the global flag or any key is set.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().is_loading()
    }

    /// Sets every key in `keys`.
    pub fn start_loading(&self, keys: &[LoadingKey]) {
        self.update(|state| {
            for key in keys {
                Self::write_flag(state, key, true);
            }
        });
    }

    /// Clears every key in `keys`.
    pub fn stop_loading(&self, keys: &[LoadingKey]) {
        self.update(|state| {
            for key in keys {
                Self::write_flag(state, key, false);
            }
        });
    }

    /// Applies several updates in one step.
    pub fn set_batch(&self, updates: impl IntoIterator<Item = (LoadingKey, bool)>) {
        self.update(|state| {
            for (key, value) in updates {
                Self::write_flag(state, &key, value);
            }
        });
    }

    fn clear_tracked(state: &mut LoadingSnapshot, keys: &[LoadingKey]) {
        for key in keys {
            if let Some(flag) = state.flags.get_mut(key) {
                *flag = false;
            }
        }
    }

    /// Clears the listed keys without creating undeclared ones.
    pub fn reset(&self, keys: &[LoadingKey]) {
        self.update(|state| Self::clear_tracked(state, keys));
    }

    /// Clears every key and the global flag.
    pub fn reset_all(&self) {
        self.update(|state| {
            state.global = false;
            for flag in state.flags.values_mut() {
                *flag = false;
            }
        });
    }

    /// Declares `key` if it is not tracked yet.
    pub fn add_state(&self, key: LoadingKey) {
        self.update(|state| {
            state.flags.entry(key).or_insert(false);
        });
    }

    /// Stops tracking `key`. Returns `false` when it was not tracked.
    pub fn remove_state(&self, key: &LoadingKey) -> bool {
        self.update(|state| state.flags.remove(key).is_some())
    }

    /// Returns every key currently set.
    #[must_use]
    pub fn active_keys(&self) -> Vec<LoadingKey> {
        self.lock().active_keys()
    }

    /// Returns the number of keys currently set.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().flags.values().filter(|busy| **busy).count()
    }

    /// Returns a copy of every flag.
    #[must_use]
    pub fn snapshot(&self) -> LoadingSnapshot {
        self.lock().clone()
    }

    /// Subscribes to snapshots published after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadingSnapshot> {
        self.updates.subscribe()
    }

    /// Sets `keys` and returns a guard that clears them when dropped.
    pub fn acquire(&self, keys: &[LoadingKey]) -> LoadingGuard<'_> {
        self.start_loading(keys);
        LoadingGuard {
            tracker: self,
            keys: keys.to_vec(),
            global: false,
        }
    }

    /// Sets the global flag and returns a guard that clears it when dropped.
    pub fn acquire_global(&self) -> LoadingGuard<'_> {
        self.set_global_loading(true);
        LoadingGuard {
            tracker: self,
            keys: Vec::new(),
            global: true,
        }
    }

    /// Runs `operation` with `keys` set, clearing them on every exit path.
    pub async fn with_loading<F>(&self, keys: &[LoadingKey], operation: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.acquire(keys);
        operation.await
    }

    /// Runs `operation` with the global flag set, clearing it on every exit
    /// path.
    pub async fn with_global_loading<F>(&self, operation: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.acquire_global();
        operation.await
    }

    /// Returns a handle bound to a single key.
    #[must_use]
    pub fn tracker(self: &Arc<Self>, key: LoadingKey) -> KeyTracker {
        self.add_state(key.clone());
        KeyTracker {
            tracker: Arc::clone(self),
            key,
        }
    }
}

/// Clears its flags when dropped.
#[must_use = "dropping the guard immediately clears the loading flags"]
pub struct LoadingGuard<'a> {
    tracker: &'a LoadingStateTracker,
    keys: Vec<LoadingKey>,
    global: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let keys = std::mem::take(&mut self.keys);
        let global = self.global;
        self.tracker.update(|state| {
            LoadingStateTracker::clear_tracked(state, &keys);
            if global {
                state.global = false;
            }
        });
    }
}

/// Start/stop handle for a single key.
#[derive(Clone)]
pub struct KeyTracker {
    tracker: Arc<LoadingStateTracker>,
    key: LoadingKey,
}

impl KeyTracker {
    /// Returns the tracked key.
    #[must_use]
    pub const fn key(&self) -> &LoadingKey {
        &self.key
    }

    /// Sets the flag.
    pub fn start(&self) {
        self.tracker.set_loading(&self.key, true);
    }

    /// Clears the flag.
    pub fn stop(&self) {
        self.tracker.set_loading(&self.key, false);
    }

    /// Flips the flag.
    pub fn toggle(&self) {
        self.tracker
            .update(|state| {
                let next = !state.get(&self.key);
                LoadingStateTracker::write_flag(state, &self.key, next);
            });
    }

    /// Returns the flag.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.tracker.get_loading(&self.key)
    }
}
