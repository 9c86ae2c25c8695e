//! Cache system for layered L1/L2 caching
//!
//! This crate provides the [`CacheStore`] tier contract, an in-process L1
//! table, a Redis-backed L2 tier and the [`LayeredCache`] that composes them
//! with per-key load coordination, TTL jitter and negative caching.

pub mod errors;
pub mod flight;
pub mod jitter;
pub mod layered;
pub mod local;
pub mod prelude;
pub mod remote;
pub mod sentinel;
pub mod stats;
pub mod store;

// Re-export centralized config
pub use config::CacheConfig;

pub use errors::CacheError;
pub use flight::{Flight, FlightTable, FlightWaiter, LoadGuard};
pub use jitter::jitter_ttl;
pub use layered::{CacheLookup, LayeredCache};
pub use local::LocalTierCache;
pub use remote::RedisTierCache;
pub use sentinel::{NIL_SENTINEL, is_nil_sentinel, wrap_nil};
pub use stats::LayeredMetrics;
pub use store::CacheStore;
