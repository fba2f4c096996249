//! In-memory adapters for tests and offline use.

mod api;
mod local_store;

pub use api::{ApiOperation, InMemoryRegistryApi};
pub use local_store::InMemoryLocalStore;
