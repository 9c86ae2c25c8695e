//! # Configuration Management for PermHaus
//!
//! This crate provides centralized configuration structures for all PermHaus components,
//! including database, layered cache, permission service and invalidation settings.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{CacheConfig, DatabaseConfig, PermissionConfig};
//!
//! let db_config = DatabaseConfig::new(
//!     "localhost".to_string(), 5432, "apiadmin".to_string(),
//!     "postgres".to_string(), "password".to_string(),
//!     1, 10, 30, 600, 3600,
//! );
//!
//! let cache_config = CacheConfig::new("redis://localhost:6379".to_string(), "permhaus".to_string());
//! let permission_config = PermissionConfig::default();
//! assert_eq!(permission_config.key_prefix, "perm:user:");
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [database]
//! host = "localhost"
//! port = 5432
//! database = "apiadmin"
//! username = "postgres"
//! password = "password"
//!
//! [cache]
//! redis_url = "redis://localhost:6379"
//! key_prefix = "permhaus"
//! timeout_ms = 200
//! l1_default_ttl_seconds = 60
//! backfill_ttl_seconds = 30
//!
//! [permission]
//! ttl_seconds = 300
//! negative_ttl_seconds = 15
//! super_user_id = 1
//! failure_policy = "closed"
//!
//! [invalidation]
//! workers = 4
//! queue_capacity = 1024
//! batch_size = 256
//! ```
//!
//! Every field has a default, so a file only needs the values that differ.
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from the path in PERMHAUS_CONFIG or ./permhaus.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./permhaus.toml";
const CONFIG_PATH_ENV: &str = "PERMHAUS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub permission: PermissionConfig,
    pub invalidation: InvalidationConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

/// Layered cache configuration (L1 in-process table + L2 Redis)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection string (redis://localhost:6379)
    pub redis_url: String,
    /// Prefix prepended to every key stored in Redis
    pub key_prefix: String,
    /// Upper bound for a single Redis command
    pub timeout_ms: u64,
    /// Upper bound for establishing the Redis connection
    pub connection_timeout_ms: u64,
    /// TTL used by the L1 table when a caller stores without one
    pub l1_default_ttl_seconds: u64,
    /// L1 backfill TTL when L2 cannot report a remaining TTL
    pub backfill_ttl_seconds: u64,
    /// Interval of the L1 expired-entry sweeper, 0 disables it
    pub sweep_interval_seconds: u64,
    /// How long a caller waits for an in-flight load of the same key
    pub flight_wait_timeout_ms: u64,
}

/// What an authorization check answers when permissions cannot be loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Deny the request
    #[default]
    Closed,
    /// Allow the request
    Open,
}

/// Permission service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Cache key namespace, the user id is appended
    pub key_prefix: String,
    /// TTL of a computed permission set
    pub ttl_seconds: u64,
    /// TTL of a "no permissions" sentinel
    pub negative_ttl_seconds: u64,
    /// User id that bypasses group/rule resolution
    pub super_user_id: i64,
    pub failure_policy: FailurePolicy,
}

/// Background invalidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvalidationConfig {
    /// Number of worker tasks draining the queue
    pub workers: usize,
    /// Maximum number of queued jobs
    pub queue_capacity: usize,
    /// Maximum number of keys removed by one delete call
    pub batch_size: usize,
}

impl AppConfig {
    /// Load configuration from the TOML file named in .env / environment or the default path
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is not an error; the variable may come from the environment.
        let _ = dotenvy::dotenv();

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified as {} in .env/environment or in {} file",
                CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Database validations
        if self.database.host.is_empty() {
            return Err(ConfigError::Invalid(
                "Database host cannot be empty".to_string(),
            ));
        }
        if self.database.port == 0 {
            return Err(ConfigError::Invalid(
                "Database port cannot be zero".to_string(),
            ));
        }
        if self.database.database.is_empty() {
            return Err(ConfigError::Invalid(
                "Database name cannot be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "Database min_connections cannot be greater than max_connections".to_string(),
            ));
        }

        // Cache validations
        if self.cache.redis_url.is_empty() {
            return Err(ConfigError::Invalid(
                "Redis URL cannot be empty".to_string(),
            ));
        }
        if self.cache.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.cache.connection_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache connection_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.cache.flight_wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache flight_wait_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.cache.backfill_ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Cache backfill_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        // Permission validations
        if self.permission.key_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "Permission key_prefix cannot be empty".to_string(),
            ));
        }
        if self.permission.ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Permission ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.permission.negative_ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Permission negative_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.permission.negative_ttl_seconds >= self.permission.ttl_seconds {
            return Err(ConfigError::Invalid(
                "Permission negative_ttl_seconds must be shorter than ttl_seconds".to_string(),
            ));
        }

        // Invalidation validations
        if self.invalidation.workers == 0 {
            return Err(ConfigError::Invalid(
                "Invalidation workers must be greater than 0".to_string(),
            ));
        }
        if self.invalidation.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Invalidation queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.invalidation.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "Invalidation batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
        min_connections: u32,
        max_connections: u32,
        connection_timeout_seconds: u64,
        idle_timeout_seconds: u64,
        max_lifetime_seconds: u64,
    ) -> Self {
        Self {
            host,
            port,
            database,
            username,
            password,
            min_connections,
            max_connections,
            connection_timeout_seconds,
            idle_timeout_seconds,
            max_lifetime_seconds,
        }
    }

    /// Build connection string
    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "apiadmin".to_string(),
            username: "postgres".to_string(),
            password: String::new(),
            min_connections: 1,
            max_connections: 10,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
            max_lifetime_seconds: 3600,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default timings
    pub fn new(redis_url: String, key_prefix: String) -> Self {
        Self {
            redis_url,
            key_prefix,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_sweep_interval(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn l1_default_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_default_ttl_seconds)
    }

    pub fn backfill_ttl(&self) -> Duration {
        Duration::from_secs(self.backfill_ttl_seconds)
    }

    /// `None` when the sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    pub fn flight_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.flight_wait_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "permhaus".to_string(),
            timeout_ms: 200,
            connection_timeout_ms: 3000,
            l1_default_ttl_seconds: 60,
            backfill_ttl_seconds: 30,
            sweep_interval_seconds: 60,
            flight_wait_timeout_ms: 3000,
        }
    }
}

impl PermissionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_seconds)
    }

    pub fn with_super_user_id(mut self, super_user_id: i64) -> Self {
        self.super_user_id = super_user_id;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            key_prefix: "perm:user:".to_string(),
            ttl_seconds: 300,
            negative_ttl_seconds: 15,
            super_user_id: 1,
            failure_policy: FailurePolicy::Closed,
        }
    }
}

impl InvalidationConfig {
    pub fn new(workers: usize, queue_capacity: usize, batch_size: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            batch_size,
        }
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            batch_size: 256,
        }
    }
}
