//! Service transport value objects.

use super::RegistryDomainError;
use super::fields::{Object, text};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where a service runs relative to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// A process launched by the registry.
    Local,
    /// An HTTP endpoint reached over the network.
    Remote,
}

impl TransportKind {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the registry reaches a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ServiceTransport {
    /// A local process started with `command`.
    LocalProcess {
        /// Executable command.
        command: String,
        /// Command-line arguments.
        args: Vec<String>,
    },
    /// A remote HTTP endpoint.
    RemoteHttp {
        /// Endpoint URL.
        url: String,
    },
}

impl ServiceTransport {
    /// Reads the transport declared by a service object.
    ///
    /// Returns `Ok(None)` when the object declares neither `command` nor
    /// `url`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::ConflictingTransport`] when both are
    /// declared.
    pub(super) fn from_fields(
        name: &str,
        object: &Object,
    ) -> Result<Option<Self>, RegistryDomainError> {
        match (text(object, "command"), text(object, "url")) {
            (Some(_), Some(_)) => Err(RegistryDomainError::ConflictingTransport(name.to_owned())),
            (Some(command), None) => Ok(Some(Self::LocalProcess {
                command,
                args: object
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default(),
            })),
            (None, Some(url)) => Ok(Some(Self::RemoteHttp { url })),
            (None, None) => Ok(None),
        }
    }

    /// Returns the transport kind.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::LocalProcess { .. } => TransportKind::Local,
            Self::RemoteHttp { .. } => TransportKind::Remote,
        }
    }
}
