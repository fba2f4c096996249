//! Port contracts for the registry stores.
//!
//! Ports define the remote API and the local persistence the stores depend
//! on, independent of HTTP clients or filesystems.

pub mod api;
pub mod local_store;

pub use api::RegistryApi;
pub use local_store::{LocalStore, LocalStoreError, LocalStoreResult, namespaced_key};
