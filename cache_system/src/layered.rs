//! Two-tier cache: in-process L1 in front of a shared L2.
//!
//! Reads walk L1 then L2, backfilling L1 on an L2 hit. Writes go to both
//! tiers with independently jittered TTLs. Tier errors never reach the
//! caller: a failed read is a miss, a failed write is logged and skipped,
//! and the tiers converge again on the next write or expiry.
//!
//! Concurrent misses on one key are coordinated through a [`FlightTable`]:
//! [`LayeredCache::lookup`] hands the first caller a [`LoadGuard`] and makes
//! the others wait until that guard is dropped, then look again. A delete
//! that lands while a load is in flight invalidates it, and
//! [`LayeredCache::set_ex_if_current`] then drops the loaded value.

use crate::errors::CacheError;
use crate::flight::{Flight, FlightTable, LoadGuard};
use crate::jitter::jitter_ttl;
use crate::sentinel::{NIL_SENTINEL, is_nil_sentinel};
use crate::stats::{LayeredCounters, LayeredMetrics};
use crate::store::CacheStore;
use async_trait::async_trait;
use config::CacheConfig;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BACKFILL_TTL: Duration = Duration::from_secs(30);
const DEFAULT_FLIGHT_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Result of [`LayeredCache::lookup`]
#[derive(Debug)]
pub enum CacheLookup {
    /// A cached payload
    Present(String),
    /// A cached "confirmed empty" marker
    Negative,
    /// Nothing cached. `Some(guard)` means this caller should load from the
    /// source, write back, then drop the guard; `None` means another caller's
    /// load finished (or the wait timed out) without producing a value.
    Miss(Option<LoadGuard>),
}

impl CacheLookup {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss(_))
    }

    /// Raw stored value, the sentinel included; drops any load guard
    pub fn into_raw(self) -> Option<String> {
        match self {
            CacheLookup::Present(value) => Some(value),
            CacheLookup::Negative => Some(NIL_SENTINEL.to_string()),
            CacheLookup::Miss(_) => None,
        }
    }
}

/// L1 + L2 cache with load coordination and metrics
#[derive(Debug)]
pub struct LayeredCache {
    l1: Option<Arc<dyn CacheStore>>,
    l2: Option<Arc<dyn CacheStore>>,
    backfill_ttl: Duration,
    flight_wait_timeout: Duration,
    flights: FlightTable,
    counters: LayeredCounters,
}

impl LayeredCache {
    /// Compose the tiers; either may be absent
    pub fn new(l1: Option<Arc<dyn CacheStore>>, l2: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            l1,
            l2,
            backfill_ttl: DEFAULT_BACKFILL_TTL,
            flight_wait_timeout: DEFAULT_FLIGHT_WAIT_TIMEOUT,
            flights: FlightTable::new(),
            counters: LayeredCounters::default(),
        }
    }

    pub fn from_config(
        l1: Option<Arc<dyn CacheStore>>,
        l2: Option<Arc<dyn CacheStore>>,
        config: &CacheConfig,
    ) -> Self {
        Self::new(l1, l2)
            .with_backfill_ttl(config.backfill_ttl())
            .with_flight_wait_timeout(config.flight_wait_timeout())
    }

    /// L1 TTL used on backfill when L2 cannot report a remaining TTL
    pub fn with_backfill_ttl(mut self, ttl: Duration) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    /// Upper bound on waiting for another caller's load of the same key
    pub fn with_flight_wait_timeout(mut self, timeout: Duration) -> Self {
        self.flight_wait_timeout = timeout;
        self
    }

    async fn read_tier(&self, tier: &Arc<dyn CacheStore>, key: &str) -> Option<String> {
        match tier.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                self.counters.record_tier_error(tier.name(), "get");
                tracing::warn!(tier = tier.name(), key, error = %e, "cache tier read failed, treating as miss");
                None
            }
        }
    }

    async fn write_tier(&self, tier: &Arc<dyn CacheStore>, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = tier.set_ex(key, value, ttl).await {
            self.counters.record_tier_error(tier.name(), "set");
            tracing::warn!(tier = tier.name(), key, error = %e, "cache tier write failed");
        }
    }

    async fn read_l1(&self, key: &str) -> Option<String> {
        let l1 = self.l1.as_ref()?;
        let value = self.read_tier(l1, key).await?;
        self.counters.record_hit("l1");
        Some(value)
    }

    async fn read_l2(&self, key: &str) -> Option<String> {
        let l2 = self.l2.as_ref()?;
        let value = self.read_tier(l2, key).await?;
        self.counters.record_hit("l2");

        if let Some(l1) = &self.l1 {
            let ttl = l2
                .remaining_ttl(key)
                .await
                .filter(|ttl| !ttl.is_zero())
                .unwrap_or(self.backfill_ttl);
            self.write_tier(l1, key, &value, jitter_ttl(ttl)).await;
            self.counters.record_backfill();
        }
        Some(value)
    }

    async fn read_through(&self, key: &str) -> Option<String> {
        match self.read_l1(key).await {
            Some(value) => Some(value),
            None => self.read_l2(key).await,
        }
    }

    fn classify(&self, value: String) -> CacheLookup {
        if is_nil_sentinel(&value) {
            self.counters.record_sentinel_hit();
            CacheLookup::Negative
        } else {
            CacheLookup::Present(value)
        }
    }

    async fn lookup_inner(&self, key: &str, recheck_l2: bool) -> CacheLookup {
        self.counters.record_request();
        if let Some(value) = self.read_through(key).await {
            return self.classify(value);
        }

        match self.flights.acquire(key) {
            Flight::Leader(guard) => {
                self.counters.record_miss();
                CacheLookup::Miss(Some(guard))
            }
            Flight::Follower(waiter) => {
                if tokio::time::timeout(self.flight_wait_timeout, waiter.wait())
                    .await
                    .is_err()
                {
                    tracing::debug!(key, timeout = ?self.flight_wait_timeout, "stopped waiting for in-flight load");
                }

                let value = if recheck_l2 {
                    self.read_through(key).await
                } else {
                    self.read_l1(key).await
                };
                match value {
                    Some(value) => self.classify(value),
                    None => {
                        self.counters.record_miss();
                        CacheLookup::Miss(None)
                    }
                }
            }
        }
    }

    /// Three-state lookup with load coordination.
    ///
    /// On a miss the first caller gets `Miss(Some(guard))` and is expected to
    /// load from the source and write the result back with
    /// [`set_ex_if_current`](Self::set_ex_if_current) before dropping the
    /// guard. Concurrent callers for the same key wait for that
    /// (bounded by the flight wait timeout) and then re-read both tiers.
    pub async fn lookup(&self, key: &str) -> CacheLookup {
        self.lookup_inner(key, true).await
    }

    /// Plain read: the raw value (sentinel included) or `None`.
    ///
    /// A miss only declares the load, it does not hold it: concurrent missing
    /// callers wait for the first caller's `get` to return, then re-check L1.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.lookup_inner(key, false).await.into_raw()
    }

    /// Write both tiers, each with its own jittered TTL
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(l1) = &self.l1 {
            self.write_tier(l1, key, value, jitter_ttl(ttl)).await;
        }
        if let Some(l2) = &self.l2 {
            self.write_tier(l2, key, value, jitter_ttl(ttl)).await;
        }
        self.counters.record_set();
    }

    /// Cache a "confirmed empty" marker for `key`
    pub async fn set_negative(&self, key: &str, ttl: Duration) {
        self.set_ex(key, NIL_SENTINEL, ttl).await;
    }

    /// Write back the result of the load `guard` stands for.
    ///
    /// Nothing is cached if the key was deleted after the guard was taken;
    /// a delete racing the write itself removes the written value again.
    /// Returns whether the value was left in the cache.
    pub async fn set_ex_if_current(&self, guard: &LoadGuard, value: &str, ttl: Duration) -> bool {
        let key = guard.key();
        if guard.is_invalidated() {
            self.counters.record_stale_write();
            tracing::debug!(key, "key deleted during load, result not cached");
            return false;
        }

        self.set_ex(key, value, ttl).await;
        if guard.is_invalidated() {
            self.del_tiers(&[key.to_string()]).await;
            self.counters.record_stale_write();
            tracing::debug!(key, "key deleted while writing load result, removed again");
            return false;
        }
        true
    }

    /// [`set_ex_if_current`](Self::set_ex_if_current) for a confirmed empty result
    pub async fn set_negative_if_current(&self, guard: &LoadGuard, ttl: Duration) -> bool {
        self.set_ex_if_current(guard, NIL_SENTINEL, ttl).await
    }

    async fn del_tiers(&self, keys: &[String]) {
        for tier in [&self.l1, &self.l2].into_iter().flatten() {
            if let Err(e) = tier.del(keys).await {
                self.counters.record_tier_error(tier.name(), "del");
                tracing::warn!(tier = tier.name(), keys = keys.len(), error = %e, "cache tier delete failed");
            }
        }
    }

    /// Delete from both tiers, best-effort.
    ///
    /// Loads in flight for any of `keys` are invalidated first.
    pub async fn del(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        self.flights.invalidate(keys);
        self.del_tiers(keys).await;
        self.counters.record_del();
    }

    pub fn snapshot_metrics(&self) -> LayeredMetrics {
        self.counters.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.counters.reset();
    }

    /// Number of keys with a load in flight
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }
}

#[async_trait]
impl CacheStore for LayeredCache {
    fn name(&self) -> &'static str {
        "layered"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(LayeredCache::get(self, key).await)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        LayeredCache::set_ex(self, key, value, ttl).await;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        LayeredCache::del(self, keys).await;
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        for tier in [&self.l2, &self.l1].into_iter().flatten() {
            if let Some(ttl) = tier.remaining_ttl(key).await {
                return Some(ttl);
            }
        }
        None
    }
}
