//! Named busy flags for in-progress operations.
//!
//! A [`LoadingStateTracker`] maps [`LoadingKey`]s to booleans plus a separate
//! global flag. Scoped acquisition through [`LoadingStateTracker::with_loading`]
//! releases flags on every exit path, including cancellation of the wrapped
//! future. Flags are plain booleans rather than counters: overlapping scopes
//! on the same key clear each other, so callers must not nest them.

mod key;
mod tracker;

pub use key::LoadingKey;
pub use tracker::{KeyTracker, LoadingGuard, LoadingSnapshot, LoadingStateTracker};
