//! Console-sync: client-side state for a remote service registry console.
//!
//! This crate keeps local collections of the registry's services, tools and
//! agents in sync with the remote control plane. It caches and deduplicates
//! outbound reads, retries transient failures, tracks which operations are
//! busy, and keeps a bounded log of classified errors.
//!
//! # Architecture
//!
//! The registry module follows hexagonal architecture principles:
//!
//! - **Domain**: Payload normalisation with no infrastructure dependencies
//! - **Ports**: The remote API and local persistence as traits
//! - **Adapters**: `reqwest`, directory and in-memory implementations
//! - **Services**: The stores and the refresh scheduler
//!
//! # Modules
//!
//! - [`orchestrator`]: Cached, deduplicated and retried calls
//! - [`loading`]: Named busy flags
//! - [`errors`]: Error classification and the error log
//! - [`health`]: Status vocabularies and telemetry formatting
//! - [`notify`]: User-facing notifications
//! - [`registry`]: Stores for services, tools, agents and host resources
//! - [`config`]: Configuration and operator preferences
//! - [`console`]: Composition root

pub mod config;
pub mod console;
pub mod errors;
pub mod health;
pub mod loading;
pub mod notify;
pub mod orchestrator;
pub mod registry;

#[cfg(test)]
mod test_support;
