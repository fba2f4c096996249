//! Agent summaries.

use super::RegistryDomainError;
use super::fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Availability of an agent, derived from the health of its services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Every service is healthy.
    Active,
    /// Some services are healthy, or none has been classified yet.
    Partial,
    /// No services, or none healthy.
    Inactive,
}

impl AgentStatus {
    /// Derives the status from service counts.
    #[must_use]
    pub const fn derive(service_count: u64, healthy: u64, unhealthy: u64) -> Self {
        if service_count == 0 {
            Self::Inactive
        } else if healthy == service_count {
            Self::Active
        } else if healthy > 0 || unhealthy == 0 {
            Self::Partial
        } else {
            Self::Inactive
        }
    }

    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Partial => "partial",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A normalised agent summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRecord {
    /// Agent identifier, also used as its name.
    pub id: String,
    /// Derived status.
    pub status: AgentStatus,
    /// Services registered for the agent.
    pub service_count: u64,
    /// Tools exposed to the agent.
    pub tool_count: u64,
    /// Services reporting healthy.
    pub healthy_services: u64,
    /// Services reporting unhealthy.
    pub unhealthy_services: u64,
    /// Tool executions made by the agent.
    pub total_tool_executions: u64,
    /// Time of the agent's last activity.
    pub last_activity: Option<DateTime<Utc>>,
}

impl AgentRecord {
    /// Normalises one entry of an agent listing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when the entry is not an object or has
    /// no `agent_id`.
    pub fn from_payload(payload: &Value) -> Result<Self, RegistryDomainError> {
        let object = payload.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        let id = fields::text(object, "agent_id")
            .or_else(|| fields::text(object, "id"))
            .ok_or(RegistryDomainError::MissingName)?;
        let service_count = fields::count(object, "service_count");
        let healthy_services = fields::count(object, "healthy_services");
        let unhealthy_services = fields::count(object, "unhealthy_services");
        Ok(Self {
            id,
            status: AgentStatus::derive(service_count, healthy_services, unhealthy_services),
            service_count,
            tool_count: fields::count(object, "tool_count"),
            healthy_services,
            unhealthy_services,
            total_tool_executions: fields::count(object, "total_tool_executions"),
            last_activity: fields::timestamp(object, "last_activity"),
        })
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.id
    }
}

/// Summary counts over the agent collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    /// Number of agents.
    pub total: usize,
    /// Agents with status `active`.
    pub active: usize,
    /// Agents with status `inactive`.
    pub inactive: usize,
    /// Agents with status `partial`.
    pub partial: usize,
    /// Agents with at least one unhealthy service.
    pub error: usize,
    /// Services across all agents.
    pub total_services: u64,
    /// Tools across all agents.
    pub total_tools: u64,
}

impl AgentStats {
    /// Counts `agents`.
    #[must_use]
    pub fn compute(agents: &[AgentRecord]) -> Self {
        agents.iter().fold(
            Self {
                total: agents.len(),
                ..Self::default()
            },
            |mut stats, agent| {
                match agent.status {
                    AgentStatus::Active => stats.active += 1,
                    AgentStatus::Partial => stats.partial += 1,
                    AgentStatus::Inactive => stats.inactive += 1,
                }
                stats.error += usize::from(agent.unhealthy_services > 0);
                stats.total_services = stats.total_services.saturating_add(agent.service_count);
                stats.total_tools = stats.total_tools.saturating_add(agent.tool_count);
                stats
            },
        )
    }
}
