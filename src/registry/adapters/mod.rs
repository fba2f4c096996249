//! Adapter implementations for the registry ports.

pub mod http;
pub mod memory;

mod dir_store;

pub use dir_store::DirLocalStore;
pub use http::{HttpRegistryApi, HttpRegistryApiError};
pub use memory::{ApiOperation, InMemoryLocalStore, InMemoryRegistryApi};
