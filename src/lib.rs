//! # PermHaus
//!
//! A layered L1/L2 cache and the permission-authorization cache built on it,
//! with per-key load coordination, negative caching and cascading
//! invalidation driven by administrative auth events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use permhaus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let permhaus = PermHaus::new(config).await?;
//!     permhaus.health_check().await?;
//!
//!     let permissions = permhaus.permissions();
//!     if permissions.has_permission(42, "/admin/app/index").await {
//!         println!("user 42 may open the app list");
//!     }
//!
//!     // A rule of group 7 was edited: every member's cached set is dropped
//!     // in the background.
//!     permhaus
//!         .signals()
//!         .emit(AuthEvent::new(AuthEventKind::GroupRulesChanged { group_id: 7 }));
//!
//!     permhaus.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::PermHaus;
pub use errors::PermHausError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig, InvalidationConfig, PermissionConfig};

// Re-export member crates
pub use cache_system;
pub use permission_system;
pub use signal_system;
pub use store_object;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
