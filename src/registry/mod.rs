//! Client-side state for the remote service registry.
//!
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Synchronisation services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
