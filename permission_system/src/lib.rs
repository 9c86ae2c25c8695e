//! Permission system - cached authorization sets
//!
//! This crate derives each user's permission set from group membership,
//! group rules and the menu tree, caches it in a [`cache_system::LayeredCache`],
//! and invalidates it per user or per group, in the background when driven
//! by auth events.

pub mod errors;
pub mod invalidation;
pub mod keys;
pub mod prelude;
pub mod service;
pub mod stats;

pub use errors::PermissionError;
pub use invalidation::{InvalidationDispatcher, InvalidationJob};
pub use keys::{normalize_path, user_key};
pub use service::{AuthStores, PermissionService};
pub use stats::{DispatcherStats, PermissionMetrics};

// Re-export centralized config
pub use config::{FailurePolicy, InvalidationConfig, PermissionConfig};
