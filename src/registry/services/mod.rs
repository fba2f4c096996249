//! Application services that keep the registry collections in sync.
//!
//! Each store owns one collection and reaches the network only through the
//! shared [`StoreContext`]: reads go through the request orchestrator with
//! retries, every action toggles its loading flag and failures are recorded
//! with the error aggregator. Local state survives a failed call.

mod agent_store;
mod context;
mod refresh;
mod service_store;
mod system_store;
mod tool_store;

pub use agent_store::AgentStore;
pub use context::{
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_HISTORY_LIMIT, DEFAULT_LIST_TTL, DEFAULT_NAMESPACE,
    StoreContext, StoreError, StoreResult, StoreSettings,
};
pub use refresh::{RefreshReport, RefreshScheduler};
pub use service_store::{ConnectionStatus, ServiceHealth, ServiceStore};
pub use system_store::{Snapshot, SystemStore};
pub use tool_store::{
    FAVORITES_KEY, HISTORY_KEY, POPULAR_TOOL_COUNT, RECENT_EXECUTION_COUNT, ToolStore,
};
