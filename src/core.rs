//! Core PermHaus functionality
//!
//! This module contains the PermHaus coordinator: it builds the cache tiers,
//! the permission service, the signal manager and the invalidation
//! dispatcher once, wires them together and hands out shared handles.

use sqlx::PgPool;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::errors::PermHausError;
use cache_system::{CacheStore, LayeredCache, LocalTierCache, RedisTierCache};
use config::{AppConfig, DatabaseConfig};
use permission_system::{AuthStores, InvalidationDispatcher, PermissionService};
use signal_system::{CallbackId, SignalManager};
use store_object::PgAuthStore;

/// Main PermHaus coordinator
pub struct PermHaus {
    config: AppConfig,
    pool: Option<PgPool>,
    redis: Option<Arc<RedisTierCache>>,
    local: Arc<LocalTierCache>,
    cache: Arc<LayeredCache>,
    permissions: Arc<PermissionService>,
    signals: Arc<SignalManager>,
    dispatcher: Arc<InvalidationDispatcher>,
    subscription: CallbackId,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PermHaus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermHaus")
            .field("database", &self.pool.is_some())
            .field("redis", &self.redis)
            .field("local_entries", &self.local.len())
            .field("permissions", &self.permissions)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, PermHausError> {
    let mut pool_options = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

    // Set max lifetime if specified
    if config.max_lifetime_seconds > 0 {
        pool_options = pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
    }

    Ok(pool_options.connect(&config.connection_string()).await?)
}

impl PermHaus {
    /// Connect Postgres and Redis and build every component from `config`
    pub async fn new(config: AppConfig) -> Result<Self, PermHausError> {
        config.validate()?;

        let pool = connect_pool(&config.database).await?;
        let redis = Arc::new(RedisTierCache::new(config.cache.clone())?);
        let local = Arc::new(LocalTierCache::from_config(&config.cache));
        let stores = AuthStores::from_shared(Arc::new(PgAuthStore::new(pool.clone())));

        let remote: Arc<dyn CacheStore> = redis.clone();
        let mut permhaus = Self::from_parts(config, local, Some(remote), stores);
        permhaus.pool = Some(pool);
        permhaus.redis = Some(redis);
        tracing::info!("permhaus started");
        Ok(permhaus)
    }

    /// Build the same component graph over caller-supplied tiers and stores.
    ///
    /// Must be called inside a tokio runtime; the dispatcher workers and the
    /// L1 sweeper are spawned here.
    pub fn from_parts(
        config: AppConfig,
        local: Arc<LocalTierCache>,
        remote: Option<Arc<dyn CacheStore>>,
        stores: AuthStores,
    ) -> Self {
        let l1: Arc<dyn CacheStore> = local.clone();
        let cache = Arc::new(LayeredCache::from_config(Some(l1), remote, &config.cache));

        let permissions = Arc::new(
            PermissionService::new(cache.clone(), stores, config.permission.clone())
                .with_batch_size(config.invalidation.batch_size),
        );

        let signals = Arc::new(SignalManager::new());
        let dispatcher = Arc::new(InvalidationDispatcher::start(
            permissions.clone(),
            &config.invalidation,
        ));
        let subscription = dispatcher.subscribe(&signals);

        let sweeper = config
            .cache
            .sweep_interval()
            .map(|interval| local.spawn_sweeper(interval));

        crate::debug_log!(
            workers = config.invalidation.workers,
            sweeper = sweeper.is_some(),
            "permhaus components assembled"
        );

        Self {
            config,
            pool: None,
            redis: None,
            local,
            cache,
            permissions,
            signals,
            dispatcher,
            subscription,
            sweeper: Mutex::new(sweeper),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Database pool, when built by [`PermHaus::new`]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn cache(&self) -> &Arc<LayeredCache> {
        &self.cache
    }

    pub fn local_cache(&self) -> &Arc<LocalTierCache> {
        &self.local
    }

    pub fn permissions(&self) -> &Arc<PermissionService> {
        &self.permissions
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    pub fn dispatcher(&self) -> &Arc<InvalidationDispatcher> {
        &self.dispatcher
    }

    /// Check Postgres and Redis connectivity, where configured
    pub async fn health_check(&self) -> Result<(), PermHausError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").fetch_one(pool).await?;
        }
        if let Some(redis) = &self.redis {
            redis.ping().await?;
        }
        crate::trace_log!("health check passed");
        Ok(())
    }

    /// Drain queued invalidations and stop background tasks
    pub async fn shutdown(&self) {
        self.signals.remove_callback(self.subscription);
        self.dispatcher.shutdown().await;

        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        tracing::info!(stats = ?self.dispatcher.stats(), "permhaus stopped");
    }
}
