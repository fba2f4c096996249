//! Operation keys for the loading tracker.

use std::fmt;

/// Name of an operation whose busy state is tracked.
///
/// Well-known operations are enum variants; [`LoadingKey::Custom`] covers
/// genuinely open-ended names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadingKey {
    /// Any remote API call.
    Api,
    /// Service list fetch.
    Services,
    /// Tool list fetch.
    Tools,
    /// Agent list fetch.
    Agents,
    /// Dashboard data.
    Dashboard,
    /// Page-level loading.
    Page,
    /// Adding a service.
    Adding,
    /// Updating or restarting services.
    Updating,
    /// Deleting services.
    Deleting,
    /// Generic fetch.
    Fetching,
    /// Form submission.
    Submitting,
    /// Health-check pass.
    Checking,
    /// Health summary fetch.
    Health,
    /// Tool execution.
    Executing,
    /// Full refresh fan-out.
    Refreshing,
    /// System resource fetch.
    Resources,
    /// Caller-defined operation.
    Custom(String),
}

impl LoadingKey {
    /// Every well-known key.
    pub const WELL_KNOWN: [Self; 16] = [
        Self::Api,
        Self::Services,
        Self::Tools,
        Self::Agents,
        Self::Dashboard,
        Self::Page,
        Self::Adding,
        Self::Updating,
        Self::Deleting,
        Self::Fetching,
        Self::Submitting,
        Self::Checking,
        Self::Health,
        Self::Executing,
        Self::Refreshing,
        Self::Resources,
    ];

    /// Creates a caller-defined key.
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Returns the key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Api => "api",
            Self::Services => "services",
            Self::Tools => "tools",
            Self::Agents => "agents",
            Self::Dashboard => "dashboard",
            Self::Page => "page",
            Self::Adding => "adding",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Fetching => "fetching",
            Self::Submitting => "submitting",
            Self::Checking => "checking",
            Self::Health => "health",
            Self::Executing => "executing",
            Self::Refreshing => "refreshing",
            Self::Resources => "resources",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for LoadingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LoadingKey {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        Self::WELL_KNOWN
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .unwrap_or_else(|| Self::Custom(value.trim().to_owned()))
    }
}
