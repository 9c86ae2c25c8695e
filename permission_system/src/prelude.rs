//! Convenience re-exports for common permission-system usage

pub use crate::errors::PermissionError;
pub use crate::invalidation::{InvalidationDispatcher, InvalidationJob};
pub use crate::service::{AuthStores, PermissionService};
pub use crate::stats::{DispatcherStats, PermissionMetrics};

pub use config::{FailurePolicy, InvalidationConfig, PermissionConfig};
