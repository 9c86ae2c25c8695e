//! Error types for the PermHaus crate
//!
//! This module contains all error types that can be returned by PermHaus operations.

use cache_system::CacheError;
use config::ConfigError;
use permission_system::PermissionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermHausError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),
}
