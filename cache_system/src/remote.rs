//! Redis-backed shared tier (the L2 tier).
//!
//! Every command is bounded by the configured timeout so an unreachable
//! Redis fails fast instead of stalling request handling.

use crate::errors::CacheError;
use crate::store::CacheStore;
use async_trait::async_trait;
use config::CacheConfig;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Redis cache tier
#[derive(Clone)]
pub struct RedisTierCache {
    client: Arc<Client>,
    config: Arc<CacheConfig>,
    connection_pool: Arc<RwLock<Option<MultiplexedConnection>>>,
}

impl Debug for RedisTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = match self.connection_pool.try_read() {
            Ok(pool) => {
                if pool.is_some() {
                    "connected"
                } else {
                    "no_connection"
                }
            }
            Err(_) => "busy",
        };

        f.debug_struct("RedisTierCache")
            .field("redis_url", &self.config.redis_url)
            .field("key_prefix", &self.config.key_prefix)
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisTierCache {
    /// Create a new Redis tier; the connection is opened on first use
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client: Arc::new(client),
            config: Arc::new(config),
            connection_pool: Arc::new(RwLock::new(None)),
        })
    }

    /// Get or create Redis connection
    async fn get_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        if let Some(connection) = self.connection_pool.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let mut pool = self.connection_pool.write().await;
        if pool.is_none() {
            let connection = tokio::time::timeout(
                self.config.connection_timeout(),
                self.client.get_multiplexed_async_connection(),
            )
            .await
            .map_err(|_| CacheError::Timeout("connect"))??;
            *pool = Some(connection);
        }

        pool.as_ref()
            .cloned()
            .ok_or_else(|| CacheError::Connection("Failed to get connection from pool".into()))
    }

    /// Forget a broken connection so the next call reconnects
    async fn reset_connection(&self) {
        *self.connection_pool.write().await = None;
    }

    /// Run one command under the configured timeout
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let connection = self.get_connection().await?;
        match tokio::time::timeout(self.config.timeout(), command(connection)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    self.reset_connection().await;
                }
                Err(CacheError::ConnectionError(e))
            }
            Err(_) => Err(CacheError::Timeout(op)),
        }
    }

    /// Namespaced Redis key
    fn build_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<String, CacheError> {
        self.run("ping", |mut conn| async move {
            redis::cmd("PING").query_async(&mut conn).await
        })
        .await
    }

    /// Get current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[async_trait]
impl CacheStore for RedisTierCache {
    fn name(&self) -> &'static str {
        "l2"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let cache_key = self.build_key(key);
        let value: Option<String> = self
            .run("get", |mut conn| async move { conn.get(cache_key).await })
            .await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let cache_key = self.build_key(key);
        let value = value.to_string();
        // Sub-millisecond TTLs round up so the entry is not stored forever.
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if ttl.is_zero() {
            self.run("set", |mut conn| async move { conn.set(cache_key, value).await })
                .await
        } else {
            self.run("set_ex", |mut conn| async move {
                conn.pset_ex(cache_key, value, millis.max(1)).await
            })
            .await
        }
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let cache_keys: Vec<String> = keys.iter().map(|key| self.build_key(key)).collect();
        let _deleted: i64 = self
            .run("del", |mut conn| async move { conn.del(cache_keys).await })
            .await?;
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let cache_key = self.build_key(key);
        // PTTL answers -2 for a missing key and -1 for a key without expiry.
        match self
            .run("pttl", |mut conn| async move {
                let millis: i64 = conn.pttl(cache_key).await?;
                Ok(millis)
            })
            .await
        {
            Ok(millis) if millis > 0 => Some(Duration::from_millis(millis as u64)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(key, error = %e, "redis pttl failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        let tier = RedisTierCache::new(CacheConfig::new(
            "redis://localhost:6379".to_string(),
            "permhaus".to_string(),
        ))
        .unwrap();
        assert_eq!(tier.build_key("perm:user:42"), "permhaus:perm:user:42");
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = RedisTierCache::new(CacheConfig::new(
            "not a url".to_string(),
            "permhaus".to_string(),
        ));
        assert!(matches!(result, Err(CacheError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_fast() {
        // Nothing listens on port 1; the connect attempt errors or times out.
        let config = CacheConfig::new("redis://127.0.0.1:1".to_string(), "t".to_string());
        let tier = RedisTierCache::new(config).unwrap();
        assert!(tier.get("k").await.is_err());
        assert_eq!(tier.remaining_ttl("k").await, None);
    }
}
