//! Per-key load coordination ("singleflight").
//!
//! The first caller to miss on a key receives a [`LoadGuard`]. Later callers
//! receive a [`FlightWaiter`] that resolves when the guard is dropped, which
//! happens after the holder has written the reloaded value back, or on error,
//! panic or cancellation of the holder.
//!
//! Deleting a key while its load is in flight marks the flight invalidated, so
//! the holder can tell its result may predate the delete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
struct FlightRecord {
    id: u64,
    done: watch::Receiver<()>,
    invalidated: Arc<AtomicBool>,
}

type FlightMap = HashMap<String, FlightRecord>;

#[derive(Debug, Default)]
struct Inner {
    flights: Mutex<FlightMap>,
    next_id: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, FlightMap> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Table of in-flight loads keyed by cache key
#[derive(Debug, Default, Clone)]
pub struct FlightTable {
    inner: Arc<Inner>,
}

/// Outcome of [`FlightTable::acquire`]
#[derive(Debug)]
pub enum Flight {
    /// No load was in flight; the caller now owns it
    Leader(LoadGuard),
    /// Another caller is loading this key
    Follower(FlightWaiter),
}

/// Coordination record held by the caller responsible for reloading a key.
///
/// Dropping it wakes every waiter and removes the record.
#[derive(Debug)]
pub struct LoadGuard {
    key: String,
    id: u64,
    inner: Arc<Inner>,
    invalidated: Arc<AtomicBool>,
    _done: watch::Sender<()>,
}

impl LoadGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key was deleted after this guard was handed out
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        let mut flights = self.inner.lock();
        if flights.get(&self.key).is_some_and(|record| record.id == self.id) {
            flights.remove(&self.key);
        }
        // `_done` drops after this, closing the channel for every waiter.
    }
}

/// Completion handle of someone else's load
#[derive(Debug)]
pub struct FlightWaiter {
    done: watch::Receiver<()>,
}

impl FlightWaiter {
    /// Resolve once the leader's guard is dropped
    pub async fn wait(mut self) {
        // Nothing is ever sent; `changed` errors exactly when the sender is gone.
        while self.done.changed().await.is_ok() {}
    }
}

impl FlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader for `key`, or join the load already in flight
    pub fn acquire(&self, key: &str) -> Flight {
        let mut flights = self.inner.lock();
        if let Some(record) = flights.get(key) {
            return Flight::Follower(FlightWaiter {
                done: record.done.clone(),
            });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(());
        let invalidated = Arc::new(AtomicBool::new(false));
        flights.insert(
            key.to_string(),
            FlightRecord {
                id,
                done: rx,
                invalidated: Arc::clone(&invalidated),
            },
        );
        Flight::Leader(LoadGuard {
            key: key.to_string(),
            id,
            inner: Arc::clone(&self.inner),
            invalidated,
            _done: tx,
        })
    }

    /// Mark the in-flight loads of `keys` as invalidated.
    ///
    /// Returns how many of the keys had a load in flight.
    pub fn invalidate(&self, keys: &[String]) -> usize {
        let flights = self.inner.lock();
        let mut marked = 0;
        for record in keys.iter().filter_map(|key| flights.get(key)) {
            record.invalidated.store(true, Ordering::Release);
            marked += 1;
        }
        marked
    }

    /// Number of keys currently being loaded
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}
