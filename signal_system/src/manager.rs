use crate::event::AuthEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Event callback; an error is logged and counted, never returned to the emitter
pub type EventCallback = Box<dyn Fn(&AuthEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`SignalManager::add_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(Uuid);

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalStats {
    pub events_emitted: u64,
    pub callbacks_invoked: u64,
    pub callback_failures: u64,
}

/// Signal manager for auth event notifications
pub struct SignalManager {
    callbacks: RwLock<Vec<(CallbackId, EventCallback)>>,
    events_emitted: AtomicU64,
    callbacks_invoked: AtomicU64,
    callback_failures: AtomicU64,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("callback_count", &self.callback_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl SignalManager {
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            events_emitted: AtomicU64::new(0),
            callbacks_invoked: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
        }
    }

    /// Add event callback
    pub fn add_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&AuthEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = CallbackId(Uuid::new_v4());
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a callback; returns false if it was not registered
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != id);
        callbacks.len() != before
    }

    /// Emit event to all subscribers
    pub fn emit(&self, event: AuthEvent) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner);
        for (_, callback) in callbacks.iter() {
            self.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = callback(&event) {
                self.callback_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    event_id = %event.id,
                    kind = event.kind.name(),
                    error = %e,
                    "auth event callback failed"
                );
            }
        }
    }

    /// Clear all callbacks
    pub fn clear_callbacks(&self) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> SignalStats {
        SignalStats {
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            callbacks_invoked: self.callbacks_invoked.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}
