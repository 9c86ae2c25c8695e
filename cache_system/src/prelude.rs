//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::errors::CacheError;
pub use crate::jitter::jitter_ttl;
pub use crate::layered::{CacheLookup, LayeredCache};
pub use crate::local::LocalTierCache;
pub use crate::remote::RedisTierCache;
pub use crate::sentinel::{is_nil_sentinel, wrap_nil};
pub use crate::stats::LayeredMetrics;
pub use crate::store::CacheStore;

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use async_trait::async_trait;
pub use redis;
