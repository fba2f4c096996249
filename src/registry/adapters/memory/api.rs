//! In-memory registry API for tests and offline use.

use crate::errors::{ApiError, ApiResult};
use crate::registry::ports::RegistryApi;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

/// Operations exposed by [`RegistryApi`], used to script and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// `list_services`.
    ListServices,
    /// `list_tools`.
    ListTools,
    /// `list_agents`.
    ListAgents,
    /// `check_services`.
    CheckServices,
    /// `add_service`.
    AddService,
    /// `update_service`.
    UpdateService,
    /// `delete_service`.
    DeleteService,
    /// `restart_service`.
    RestartService,
    /// `batch_update_services`.
    BatchUpdateServices,
    /// `batch_delete_services`.
    BatchDeleteServices,
    /// `batch_restart_services`.
    BatchRestartServices,
    /// `call_tool`.
    CallTool,
    /// `tool_records`.
    ToolRecords,
    /// `system_resources`.
    SystemResources,
    /// `health_summary`.
    HealthSummary,
}

impl ApiOperation {
    /// Returns the operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListServices => "list_services",
            Self::ListTools => "list_tools",
            Self::ListAgents => "list_agents",
            Self::CheckServices => "check_services",
            Self::AddService => "add_service",
            Self::UpdateService => "update_service",
            Self::DeleteService => "delete_service",
            Self::RestartService => "restart_service",
            Self::BatchUpdateServices => "batch_update_services",
            Self::BatchDeleteServices => "batch_delete_services",
            Self::BatchRestartServices => "batch_restart_services",
            Self::CallTool => "call_tool",
            Self::ToolRecords => "tool_records",
            Self::SystemResources => "system_resources",
            Self::HealthSummary => "health_summary",
        }
    }
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry API backed by in-process collections.
///
/// Services added, updated and deleted through the API are reflected by
/// later `list_services` and `check_services` calls. Responses use the
/// `{ success, data }` envelope. Individual operations can be scripted with
/// [`Self::set_response`] and [`Self::fail_next`], and every call is counted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryApi {
    state: Arc<RwLock<InMemoryApiState>>,
}

#[derive(Debug, Default)]
struct InMemoryApiState {
    services: Vec<Value>,
    tools: Vec<Value>,
    agents: Vec<Value>,
    records: Vec<Value>,
    resources: Value,
    summary: Value,
    responses: HashMap<ApiOperation, Value>,
    failures: HashMap<ApiOperation, VecDeque<ApiError>>,
    calls: HashMap<ApiOperation, usize>,
    latency: Duration,
}

impl InMemoryRegistryApi {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, InMemoryApiState>> {
        self.state
            .write()
            .map_err(|err| ApiError::Request(format!("in-memory registry unavailable: {err}")))
    }

    /// Replaces the configured services.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn seed_services(&self, services: Vec<Value>) -> ApiResult<()> {
        self.write()?.services = services;
        Ok(())
    }

    /// Replaces the exposed tools.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn seed_tools(&self, tools: Vec<Value>) -> ApiResult<()> {
        self.write()?.tools = tools;
        Ok(())
    }

    /// Replaces the agent summaries.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn seed_agents(&self, agents: Vec<Value>) -> ApiResult<()> {
        self.write()?.agents = agents;
        Ok(())
    }

    /// Replaces the server-side execution records.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn seed_tool_records(&self, records: Vec<Value>) -> ApiResult<()> {
        self.write()?.records = records;
        Ok(())
    }

    /// Sets the system resources and health summary payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn seed_system(&self, resources: Value, summary: Value) -> ApiResult<()> {
        let mut state = self.write()?;
        state.resources = resources;
        state.summary = summary;
        Ok(())
    }

    /// Returns `body` verbatim for every later call of `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn set_response(&self, operation: ApiOperation, body: Value) -> ApiResult<()> {
        self.write()?.responses.insert(operation, body);
        Ok(())
    }

    /// Queues `error` as the outcome of the next call of `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn fail_next(&self, operation: ApiOperation, error: ApiError) -> ApiResult<()> {
        self.write()?
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
        Ok(())
    }

    /// Delays every call by `latency`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] when the state lock is poisoned.
    pub fn set_latency(&self, latency: Duration) -> ApiResult<()> {
        self.write()?.latency = latency;
        Ok(())
    }

    /// Returns how many times `operation` was called.
    #[must_use]
    pub fn calls(&self, operation: ApiOperation) -> usize {
        self.state
            .read()
            .map(|state| state.calls.get(&operation).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Returns the names of the configured services.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.state
            .read()
            .map(|state| state.services.iter().filter_map(service_name).collect())
            .unwrap_or_default()
    }

    async fn begin(&self, operation: ApiOperation) -> ApiResult<Option<Value>> {
        let latency = {
            let mut state = self.write()?;
            let count = state.calls.entry(operation).or_default();
            *count = count.saturating_add(1);
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.write()?;
        if let Some(error) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state.responses.get(&operation).cloned())
    }
}

fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

fn not_found(name: &str) -> ApiError {
    ApiError::Response {
        status: 404,
        message: format!("service '{name}' not found"),
        body: None,
    }
}

fn service_name(service: &Value) -> Option<String> {
    service.get("name").and_then(Value::as_str).map(str::to_owned)
}

fn position(services: &[Value], name: &str) -> Option<usize> {
    services
        .iter()
        .position(|service| service_name(service).as_deref() == Some(name))
}

fn upsert(services: &mut Vec<Value>, name: &str, entry: &Map<String, Value>) {
    let mut service = entry.clone();
    service.insert("name".to_owned(), Value::String(name.to_owned()));
    service
        .entry("status".to_owned())
        .or_insert_with(|| Value::String("init".to_owned()));
    let existing = services
        .iter_mut()
        .find(|candidate| service_name(candidate).as_deref() == Some(name));
    if let Some(slot) = existing {
        *slot = Value::Object(service);
        return;
    }
    services.push(Value::Object(service));
}

fn apply_config(services: &mut Vec<Value>, config: &Value) {
    let Some(object) = config.as_object() else {
        return;
    };
    if let Some(name) = object.get("name").and_then(Value::as_str) {
        upsert(services, name, object);
        return;
    }
    let entries = object
        .get("mcpServers")
        .and_then(Value::as_object)
        .unwrap_or(object);
    for (name, entry) in entries {
        if let Some(entry_object) = entry.as_object() {
            upsert(services, name, entry_object);
        }
    }
}

#[async_trait]
impl RegistryApi for InMemoryRegistryApi {
    async fn list_services(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::ListServices).await? {
            return Ok(body);
        }
        let services = self.write()?.services.clone();
        Ok(envelope(json!({ "services": services })))
    }

    async fn list_tools(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::ListTools).await? {
            return Ok(body);
        }
        let tools = self.write()?.tools.clone();
        Ok(envelope(json!({ "tools": tools })))
    }

    async fn list_agents(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::ListAgents).await? {
            return Ok(body);
        }
        let agents = self.write()?.agents.clone();
        Ok(envelope(json!({ "agents": agents })))
    }

    async fn check_services(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::CheckServices).await? {
            return Ok(body);
        }
        let snapshots: Vec<Value> = self
            .write()?
            .services
            .iter()
            .map(|service| {
                json!({
                    "name": service.get("name").cloned().unwrap_or(Value::Null),
                    "status": service.get("status").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        Ok(envelope(json!({ "services": snapshots })))
    }

    async fn add_service(&self, config: &Value) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::AddService).await? {
            return Ok(body);
        }
        apply_config(&mut self.write()?.services, config);
        Ok(envelope(config.clone()))
    }

    async fn update_service(&self, name: &str, config: &Value) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::UpdateService).await? {
            return Ok(body);
        }
        let mut state = self.write()?;
        position(&state.services, name).ok_or_else(|| not_found(name))?;
        let entry = config.as_object().cloned().unwrap_or_default();
        upsert(&mut state.services, name, &entry);
        Ok(envelope(json!({ "name": name })))
    }

    async fn delete_service(&self, name: &str) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::DeleteService).await? {
            return Ok(body);
        }
        let mut state = self.write()?;
        let index = position(&state.services, name).ok_or_else(|| not_found(name))?;
        state.services.remove(index);
        Ok(envelope(json!({ "name": name })))
    }

    async fn restart_service(&self, name: &str) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::RestartService).await? {
            return Ok(body);
        }
        position(&self.write()?.services, name).ok_or_else(|| not_found(name))?;
        Ok(envelope(json!({ "name": name })))
    }

    async fn batch_update_services(&self, updates: &Value) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::BatchUpdateServices).await? {
            return Ok(body);
        }
        let mut state = self.write()?;
        let mut updated = 0_usize;
        for update in updates.as_array().into_iter().flatten() {
            let Some(name) = update.get("name").and_then(Value::as_str) else {
                continue;
            };
            if position(&state.services, name).is_none() {
                continue;
            }
            let entry = update
                .get("config")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            upsert(&mut state.services, name, &entry);
            updated = updated.saturating_add(1);
        }
        Ok(envelope(json!({ "updated": updated })))
    }

    async fn batch_delete_services(&self, names: &[String]) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::BatchDeleteServices).await? {
            return Ok(body);
        }
        let mut state = self.write()?;
        let before = state.services.len();
        state.services.retain(|service| {
            service_name(service).is_none_or(|name| !names.contains(&name))
        });
        let deleted = before.saturating_sub(state.services.len());
        Ok(envelope(json!({ "deleted": deleted })))
    }

    async fn batch_restart_services(&self, names: &[String]) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::BatchRestartServices).await? {
            return Ok(body);
        }
        let state = self.write()?;
        let restarted = names
            .iter()
            .filter(|name| position(&state.services, name).is_some())
            .count();
        Ok(envelope(json!({ "restarted": restarted })))
    }

    async fn call_tool(&self, name: &str, args: &Value) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::CallTool).await? {
            return Ok(body);
        }
        let known = self
            .write()?
            .tools
            .iter()
            .any(|tool| tool.get("name").and_then(Value::as_str) == Some(name));
        if !known {
            return Err(ApiError::Response {
                status: 404,
                message: format!("tool '{name}' not found"),
                body: None,
            });
        }
        Ok(envelope(json!({ "tool_name": name, "args": args })))
    }

    async fn tool_records(&self, limit: usize) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::ToolRecords).await? {
            return Ok(body);
        }
        let records: Vec<Value> = self.write()?.records.iter().take(limit).cloned().collect();
        Ok(envelope(json!({ "executions": records })))
    }

    async fn system_resources(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::SystemResources).await? {
            return Ok(body);
        }
        Ok(envelope(self.write()?.resources.clone()))
    }

    async fn health_summary(&self) -> ApiResult<Value> {
        if let Some(body) = self.begin(ApiOperation::HealthSummary).await? {
            return Ok(body);
        }
        Ok(envelope(self.write()?.summary.clone()))
    }
}
