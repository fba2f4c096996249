//! Remote registry API port.

use crate::errors::ApiResult;
use async_trait::async_trait;
use serde_json::Value;

/// Remote registry contract.
///
/// Every method returns the raw response body. Callers open the envelope and
/// locate the payload with [`crate::registry::domain::envelope`]; transport
/// failures are already classified as [`crate::errors::ApiError`].
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Lists configured services.
    async fn list_services(&self) -> ApiResult<Value>;

    /// Lists tools exposed by all services.
    async fn list_tools(&self) -> ApiResult<Value>;

    /// Lists agent summaries.
    async fn list_agents(&self) -> ApiResult<Value>;

    /// Runs a health-check pass and returns one snapshot per service.
    async fn check_services(&self) -> ApiResult<Value>;

    /// Adds one or more services.
    async fn add_service(&self, config: &Value) -> ApiResult<Value>;

    /// Replaces the configuration of service `name`.
    async fn update_service(&self, name: &str, config: &Value) -> ApiResult<Value>;

    /// Removes service `name`.
    async fn delete_service(&self, name: &str) -> ApiResult<Value>;

    /// Restarts service `name`.
    async fn restart_service(&self, name: &str) -> ApiResult<Value>;

    /// Applies several configuration updates at once.
    async fn batch_update_services(&self, updates: &Value) -> ApiResult<Value>;

    /// Removes several services at once.
    async fn batch_delete_services(&self, names: &[String]) -> ApiResult<Value>;

    /// Restarts several services at once.
    async fn batch_restart_services(&self, names: &[String]) -> ApiResult<Value>;

    /// Calls tool `name` with `args`.
    async fn call_tool(&self, name: &str, args: &Value) -> ApiResult<Value>;

    /// Returns up to `limit` server-side execution records.
    async fn tool_records(&self, limit: usize) -> ApiResult<Value>;

    /// Returns host resource usage.
    async fn system_resources(&self) -> ApiResult<Value>;

    /// Returns the aggregate health summary.
    async fn health_summary(&self) -> ApiResult<Value>;
}
