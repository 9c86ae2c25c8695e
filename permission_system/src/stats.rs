//! Permission service and dispatcher counters.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod names {
    pub const PERMISSION_CACHE_HIT_TOTAL: &str = "permission_cache_hit_total";
    pub const PERMISSION_SOURCE_LOAD_TOTAL: &str = "permission_source_load_total";
    pub const PERMISSION_LOAD_ERRORS_TOTAL: &str = "permission_load_errors_total";
    pub const PERMISSION_INVALIDATE_TOTAL: &str = "permission_invalidate_total";
    pub const PERMISSION_INVALIDATE_USERS_TOTAL: &str = "permission_invalidate_users_total";
    pub const PERMISSION_INVALIDATE_FANOUT: &str = "permission_invalidate_fanout";
    pub const INVALIDATION_JOBS_TOTAL: &str = "invalidation_jobs_total";
}

/// Point-in-time copy of the permission service counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionMetrics {
    pub cache_hits: u64,
    pub negative_hits: u64,
    pub source_loads: u64,
    pub load_errors: u64,
    /// Cached answers over all answers, 0 when nothing was answered
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct PermissionCounters {
    cache_hits: AtomicU64,
    negative_hits: AtomicU64,
    source_loads: AtomicU64,
    load_errors: AtomicU64,
}

impl PermissionCounters {
    pub(crate) fn record_hit(&self, negative: bool) {
        let (counter, kind) = if negative {
            (&self.negative_hits, "negative")
        } else {
            (&self.cache_hits, "present")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        counter!(names::PERMISSION_CACHE_HIT_TOTAL, "kind" => kind).increment(1);
    }

    pub(crate) fn record_source_load(&self) {
        self.source_loads.fetch_add(1, Ordering::Relaxed);
        counter!(names::PERMISSION_SOURCE_LOAD_TOTAL).increment(1);
    }

    pub(crate) fn record_load_error(&self) {
        self.load_errors.fetch_add(1, Ordering::Relaxed);
        counter!(names::PERMISSION_LOAD_ERRORS_TOTAL).increment(1);
    }

    pub(crate) fn record_invalidation(&self, scope: &'static str, users: usize) {
        counter!(names::PERMISSION_INVALIDATE_TOTAL, "scope" => scope).increment(1);
        if users > 0 {
            counter!(names::PERMISSION_INVALIDATE_USERS_TOTAL).increment(users as u64);
        }
        if scope == "group" {
            histogram!(names::PERMISSION_INVALIDATE_FANOUT).record(users as f64);
        }
    }

    pub(crate) fn snapshot(&self) -> PermissionMetrics {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let negative_hits = self.negative_hits.load(Ordering::Relaxed);
        let source_loads = self.source_loads.load(Ordering::Relaxed);
        let answered = cache_hits + negative_hits + source_loads;
        let hit_rate = if answered > 0 {
            (cache_hits + negative_hits) as f64 / answered as f64
        } else {
            0.0
        };

        PermissionMetrics {
            cache_hits,
            negative_hits,
            source_loads,
            load_errors: self.load_errors.load(Ordering::Relaxed),
            hit_rate,
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.negative_hits,
            &self.source_loads,
            &self.load_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of the dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatcherCounters {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl DispatcherCounters {
    pub(crate) fn record(&self, outcome: &'static str) {
        let counter = match outcome {
            "enqueued" => &self.enqueued,
            "rejected" => &self.rejected,
            "completed" => &self.completed,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        counter!(names::INVALIDATION_JOBS_TOTAL, "outcome" => outcome).increment(1);
    }

    pub(crate) fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
