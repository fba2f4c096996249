//! Tool records, execution history entries and tool statistics.

use super::RegistryDomainError;
use super::fields::{self, Object};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Category assigned to tools that do not declare one.
pub const DEFAULT_TOOL_CATEGORY: &str = "default";

/// Service name assigned to tools that do not declare one.
pub const UNKNOWN_SERVICE: &str = "unknown";

const TOOL_FIELDS: &[&str] = &[
    "name",
    "description",
    "service_name",
    "category",
    "available",
    "favorite",
    "input_schema",
    "inputSchema",
    "parameters",
];

/// A normalised tool exposed by a registered service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRecord {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Service exposing the tool.
    pub service_name: Option<String>,
    /// Display category.
    pub category: String,
    /// Whether the tool can currently be called.
    pub available: bool,
    /// Whether the user marked the tool as a favourite.
    pub favorite: bool,
    /// JSON schema for the call arguments.
    pub input_schema: Option<Value>,
    /// Fields this crate does not interpret.
    pub extra: Map<String, Value>,
}

impl ToolRecord {
    /// Normalises one entry of a tool listing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when the entry is not an object or has
    /// no name.
    pub fn from_payload(payload: &Value) -> Result<Self, RegistryDomainError> {
        let object: &Object = payload.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        Ok(Self {
            name: fields::text(object, "name").ok_or(RegistryDomainError::MissingName)?,
            description: fields::text(object, "description"),
            service_name: fields::text(object, "service_name"),
            category: fields::text(object, "category")
                .unwrap_or_else(|| DEFAULT_TOOL_CATEGORY.to_owned()),
            available: object.get("available").and_then(Value::as_bool) != Some(false),
            favorite: object.get("favorite").and_then(Value::as_bool).unwrap_or(false),
            input_schema: ["input_schema", "inputSchema", "parameters"]
                .into_iter()
                .find_map(|key| fields::present(object, key)),
            extra: fields::remainder(object, TOOL_FIELDS),
        })
    }

    /// Returns the service name, or [`UNKNOWN_SERVICE`].
    #[must_use]
    pub fn service_or_unknown(&self) -> &str {
        self.service_name.as_deref().unwrap_or(UNKNOWN_SERVICE)
    }

    /// Case-insensitive match against name, description and service name.
    #[must_use]
    pub fn matches(&self, lowered_query: &str) -> bool {
        [
            Some(self.name.as_str()),
            self.description.as_deref(),
            self.service_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(lowered_query))
    }
}

/// Unique identifier for a recorded tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Result of one tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The call returned a result.
    Success,
    /// The call failed.
    Failure,
}

/// One entry of the local execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Entry identifier.
    pub id: ExecutionId,
    /// Tool that was called.
    pub tool_name: String,
    /// Service exposing the tool, when it was listed at call time.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Arguments passed to the tool.
    pub params: Value,
    /// Whether the call succeeded.
    pub outcome: ExecutionOutcome,
    /// Returned payload, for successful calls.
    pub result: Option<Value>,
    /// Server or failure message.
    pub message: String,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
}

impl ExecutionRecord {
    /// Returns `true` for successful executions.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Success)
    }
}

/// Execution count for one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularTool {
    /// Tool name.
    pub name: String,
    /// Executions in the local history.
    pub count: usize,
    /// The tool's current record, if it is still listed.
    pub tool: Option<ToolRecord>,
}

/// Summary counts over tools and the execution history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolStats {
    /// Number of tools.
    pub total: usize,
    /// Tools per service name.
    pub by_service: BTreeMap<String, usize>,
    /// Entries in the execution history.
    pub executions: usize,
    /// Successful executions.
    pub successful_executions: usize,
    /// Failed executions.
    pub failed_executions: usize,
}

impl ToolStats {
    /// Counts `tools` and `history`.
    #[must_use]
    pub fn compute<'a>(
        tools: &[ToolRecord],
        history: impl IntoIterator<Item = &'a ExecutionRecord>,
    ) -> Self {
        let mut by_service = BTreeMap::new();
        for tool in tools {
            *by_service
                .entry(tool.service_or_unknown().to_owned())
                .or_default() += 1;
        }
        let (executions, successful_executions) = history
            .into_iter()
            .fold((0, 0), |(total, successes), record| {
                (total + 1, successes + usize::from(record.is_success()))
            });
        Self {
            total: tools.len(),
            by_service,
            executions,
            successful_executions,
            failed_executions: executions - successful_executions,
        }
    }
}
