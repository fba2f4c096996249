//! Domain model for the remote service registry.
//!
//! Records are normalised from loosely-shaped JSON payloads: optional fields
//! are defaulted, statuses are classified with [`crate::health`], and
//! transports are checked for exactly one of `command` and `url`. Nothing
//! here performs I/O.

mod agent;
mod config;
pub mod envelope;
mod error;
mod fields;
mod service;
mod tool;
mod transport;

pub use agent::{AgentRecord, AgentStats, AgentStatus};
pub use config::ServiceConfig;
pub use envelope::{extract_collection, extract_object, open_envelope};
pub use error::RegistryDomainError;
pub use service::{HealthSnapshot, ServiceRecord, ServiceStats, ServiceTelemetry, TelemetryView};
pub use tool::{
    DEFAULT_TOOL_CATEGORY, ExecutionId, ExecutionOutcome, ExecutionRecord, PopularTool,
    ToolRecord, ToolStats, UNKNOWN_SERVICE,
};
pub use transport::{ServiceTransport, TransportKind};
