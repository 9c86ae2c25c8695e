//! Convenience re-exports for common PermHaus usage
//!
//! This prelude module re-exports the most commonly used items from the PermHaus crates,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use permhaus::prelude::*;
//!
//! let config = AppConfig::default();
//! assert_eq!(config.permission.super_user_id, 1);
//! ```

// Core PermHaus components
pub use crate::core::PermHaus;
pub use crate::errors::PermHausError;

// Re-export centralized config
pub use config::{
    AppConfig, CacheConfig, DatabaseConfig, FailurePolicy, InvalidationConfig, PermissionConfig,
};

// Collaborator stores
pub use store_object::prelude::*;

// Auth events
pub use signal_system::prelude::*;

// Cache tiers
pub use cache_system::prelude::*;

// Permission service and dispatcher
pub use permission_system::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;
