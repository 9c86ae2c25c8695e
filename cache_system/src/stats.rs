//! Layered cache counters.
//!
//! Each event bumps an in-process atomic (read back through
//! [`LayeredMetrics`]) and the matching `metrics` facade counter. The facade
//! is a no-op until the host installs a recorder.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_LAYER_HITS_TOTAL: &str = "cache_layer_hits_total";
    pub const CACHE_MISS_TOTAL: &str = "cache_miss_total";
    pub const CACHE_SET_TOTAL: &str = "cache_set_total";
    pub const CACHE_DEL_TOTAL: &str = "cache_del_total";
    pub const CACHE_BACKFILL_L1_TOTAL: &str = "cache_backfill_l1_total";
    pub const CACHE_NIL_SENTINEL_HIT_TOTAL: &str = "cache_nil_sentinel_hit_total";
    pub const CACHE_TIER_ERRORS_TOTAL: &str = "cache_tier_errors_total";
    pub const CACHE_STALE_WRITE_DROPPED_TOTAL: &str = "cache_stale_write_dropped_total";
}

/// Point-in-time copy of the layered cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayeredMetrics {
    pub hits_l1: u64,
    pub hits_l2: u64,
    pub miss: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub backfill_l1: u64,
    pub sentinel_hits: u64,
    /// Load results dropped because the key was deleted mid-load
    pub stale_writes_dropped: u64,
    pub req_total: u64,
    /// (hits_l1 + hits_l2) / req_total, 0 when nothing was requested
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct LayeredCounters {
    hits_l1: AtomicU64,
    hits_l2: AtomicU64,
    miss: AtomicU64,
    set_ops: AtomicU64,
    del_ops: AtomicU64,
    backfill_l1: AtomicU64,
    sentinel_hits: AtomicU64,
    stale_writes_dropped: AtomicU64,
    req_total: AtomicU64,
}

impl LayeredCounters {
    pub(crate) fn record_request(&self) {
        self.req_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self, layer: &'static str) {
        match layer {
            "l1" => self.hits_l1.fetch_add(1, Ordering::Relaxed),
            _ => self.hits_l2.fetch_add(1, Ordering::Relaxed),
        };
        counter!(names::CACHE_LAYER_HITS_TOTAL, "layer" => layer).increment(1);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_MISS_TOTAL).increment(1);
    }

    pub(crate) fn record_set(&self) {
        self.set_ops.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_SET_TOTAL).increment(1);
    }

    pub(crate) fn record_del(&self) {
        self.del_ops.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_DEL_TOTAL).increment(1);
    }

    pub(crate) fn record_backfill(&self) {
        self.backfill_l1.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_BACKFILL_L1_TOTAL).increment(1);
    }

    pub(crate) fn record_sentinel_hit(&self) {
        self.sentinel_hits.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_NIL_SENTINEL_HIT_TOTAL).increment(1);
    }

    pub(crate) fn record_stale_write(&self) {
        self.stale_writes_dropped.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_STALE_WRITE_DROPPED_TOTAL).increment(1);
    }

    pub(crate) fn record_tier_error(&self, tier: &'static str, op: &'static str) {
        counter!(names::CACHE_TIER_ERRORS_TOTAL, "tier" => tier, "op" => op).increment(1);
    }

    pub(crate) fn snapshot(&self) -> LayeredMetrics {
        let hits_l1 = self.hits_l1.load(Ordering::Relaxed);
        let hits_l2 = self.hits_l2.load(Ordering::Relaxed);
        let req_total = self.req_total.load(Ordering::Relaxed);
        let hit_rate = if req_total > 0 {
            (hits_l1 + hits_l2) as f64 / req_total as f64
        } else {
            0.0
        };

        LayeredMetrics {
            hits_l1,
            hits_l2,
            miss: self.miss.load(Ordering::Relaxed),
            set_ops: self.set_ops.load(Ordering::Relaxed),
            del_ops: self.del_ops.load(Ordering::Relaxed),
            backfill_l1: self.backfill_l1.load(Ordering::Relaxed),
            sentinel_hits: self.sentinel_hits.load(Ordering::Relaxed),
            stale_writes_dropped: self.stale_writes_dropped.load(Ordering::Relaxed),
            req_total,
            hit_rate,
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.hits_l1,
            &self.hits_l2,
            &self.miss,
            &self.set_ops,
            &self.del_ops,
            &self.backfill_l1,
            &self.sentinel_hits,
            &self.stale_writes_dropped,
            &self.req_total,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
