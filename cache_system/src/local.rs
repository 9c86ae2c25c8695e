//! In-process expiring key/value table (the L1 tier).
//!
//! Entries carry an absolute expiry instant and are treated as absent once
//! it passes; no sweeper is needed for correctness. [`LocalTierCache::spawn_sweeper`]
//! reclaims memory held by expired entries that are never read again.

use crate::errors::CacheError;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Lock-guarded expiring table implementing [`CacheStore`]
#[derive(Debug)]
pub struct LocalTierCache {
    entries: RwLock<HashMap<String, Entry>>,
    default_ttl: Duration,
}

impl LocalTierCache {
    /// Create an empty table; `default_ttl` applies to [`LocalTierCache::set`]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn from_config(config: &config::CacheConfig) -> Self {
        Self::new(config.l1_default_ttl())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live value for `key`; empty values read as absent
    pub fn get_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .filter(|value| !value.is_empty())
    }

    /// Store with the table's default TTL
    pub fn set(&self, key: &str, value: &str) {
        self.set_value(key, value, self.default_ttl);
    }

    /// Store with an explicit TTL; zero stores a non-expiring entry
    pub fn set_value(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub fn remove<K: AsRef<str>>(&self, keys: &[K]) {
        let mut entries = self.write();
        for key in keys {
            entries.remove(key.as_ref());
        }
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.read();
        let expires_at = entries.get(key)?.expires_at?;
        (now < expires_at).then(|| expires_at - now)
    }

    /// Drop every entry
    pub fn flush(&self) {
        self.write().clear();
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Periodically purge expired entries until the table is dropped or the handle aborted
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let table = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(table) = table.upgrade() else {
                    break;
                };
                let purged = table.purge_expired();
                if purged > 0 {
                    tracing::trace!(purged, remaining = table.len(), "l1 sweeper purged expired entries");
                }
            }
        })
    }
}

impl Default for LocalTierCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl CacheStore for LocalTierCache {
    fn name(&self) -> &'static str {
        "l1"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_value(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        self.remove(keys);
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.ttl_of(key)
    }
}
