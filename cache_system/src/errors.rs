//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! during cache tier operations and Redis interactions.

use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    ConnectionError(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    Connection(String),

    #[error("Cache operation timeout: {0}")]
    Timeout(&'static str),
}
