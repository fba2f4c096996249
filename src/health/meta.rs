//! Presentation metadata for status values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    /// Neutral, transitional states.
    Info,
    /// Connected but not yet proven healthy.
    Ready,
    /// Working as expected.
    Success,
    /// Working with problems.
    Warning,
    /// Not working.
    Danger,
    /// Inactive or unknown.
    Muted,
}

impl StatusTone {
    /// Returns the tone name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Ready => "ready",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Muted => "muted",
        }
    }
}

impl fmt::Display for StatusTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display text, tone and CSS hooks for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMeta {
    /// Human-readable label.
    pub text: String,
    /// Badge tone.
    pub tone: StatusTone,
    /// State class, `is-<key>`.
    pub class_name: String,
    /// Badge class, `status-<key>`.
    pub badge_class: String,
}

impl StatusMeta {
    pub(super) fn new(text: &str, tone: StatusTone, key: &str) -> Self {
        Self {
            text: text.to_owned(),
            tone,
            class_name: format!("is-{key}"),
            badge_class: format!("status-{key}"),
        }
    }

    /// Generic presentation for statuses outside every vocabulary.
    pub(super) fn unknown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: StatusTone::Muted,
            class_name: "is-unknown".to_owned(),
            badge_class: "status-unknown".to_owned(),
        }
    }
}
