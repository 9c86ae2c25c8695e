//! Background invalidation off the request path.
//!
//! Jobs go into a bounded queue drained by a fixed set of worker tasks.
//! Enqueueing never waits: a full queue is reported to the caller. Shutdown
//! closes the queue and waits until the workers have run every queued job.

use crate::errors::PermissionError;
use crate::service::PermissionService;
use crate::stats::{DispatcherCounters, DispatcherStats};
use config::InvalidationConfig;
use signal_system::{AuthEvent, AuthEventKind, CallbackId, SignalManager};
use std::sync::{Arc, Mutex, PoisonError};
use store_object::{GroupId, UserId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Unit of invalidation work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationJob {
    User(UserId),
    Group(GroupId),
}

impl From<&AuthEventKind> for InvalidationJob {
    fn from(kind: &AuthEventKind) -> Self {
        match *kind {
            AuthEventKind::GroupRulesChanged { group_id }
            | AuthEventKind::GroupStatusChanged { group_id }
            | AuthEventKind::GroupDeleted { group_id }
            | AuthEventKind::RuleChanged { group_id } => InvalidationJob::Group(group_id),
            AuthEventKind::MembershipChanged { user_id, .. }
            | AuthEventKind::UserRolesChanged { user_id }
            | AuthEventKind::UserLoggedOut { user_id } => InvalidationJob::User(user_id),
        }
    }
}

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<InvalidationJob>>>;

pub struct InvalidationDispatcher {
    sender: Mutex<Option<mpsc::Sender<InvalidationJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    counters: Arc<DispatcherCounters>,
}

impl std::fmt::Debug for InvalidationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationDispatcher")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

impl InvalidationDispatcher {
    /// Spawn the workers on the current tokio runtime
    pub fn start(service: Arc<PermissionService>, config: &InvalidationConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver: JobReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(DispatcherCounters::default());

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&receiver),
                    Arc::clone(&service),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        tracing::debug!(workers = config.workers, capacity, "invalidation dispatcher started");
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            capacity,
            counters,
        }
    }

    /// Queue a job without waiting
    pub fn enqueue(&self, job: InvalidationJob) -> Result<(), PermissionError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(PermissionError::DispatcherClosed);
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.record("enqueued");
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                self.counters.record("rejected");
                tracing::warn!(?job, capacity = self.capacity, "invalidation queue full, job rejected");
                Err(PermissionError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(PermissionError::DispatcherClosed),
        }
    }

    pub fn invalidate_user(&self, uid: UserId) -> Result<(), PermissionError> {
        self.enqueue(InvalidationJob::User(uid))
    }

    pub fn invalidate_group(&self, gid: GroupId) -> Result<(), PermissionError> {
        self.enqueue(InvalidationJob::Group(gid))
    }

    /// Route auth events from `signals` into jobs.
    ///
    /// The callback holds a weak handle; once the dispatcher is dropped or
    /// shut down, events fail in the signal manager's stats.
    pub fn subscribe(self: &Arc<Self>, signals: &SignalManager) -> CallbackId {
        let dispatcher = Arc::downgrade(self);
        signals.add_callback(move |event: &AuthEvent| {
            let Some(dispatcher) = dispatcher.upgrade() else {
                anyhow::bail!("invalidation dispatcher dropped");
            };
            let job = InvalidationJob::from(&event.kind);
            dispatcher.enqueue(job)?;
            Ok(())
        })
    }

    /// Jobs queued and not yet picked up by a worker
    pub fn pending(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }

    /// Close the queue and wait for the workers to finish every queued job
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "invalidation worker panicked");
            }
        }
        tracing::debug!(stats = ?self.stats(), "invalidation dispatcher stopped");
    }
}

async fn run_worker(
    worker: usize,
    receiver: JobReceiver,
    service: Arc<PermissionService>,
    counters: Arc<DispatcherCounters>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        match job {
            InvalidationJob::User(uid) => {
                service.invalidate(uid).await;
                counters.record("completed");
            }
            InvalidationJob::Group(gid) => match service.invalidate_users_by_group(gid).await {
                Ok(_) => counters.record("completed"),
                Err(e) => {
                    counters.record("failed");
                    tracing::warn!(worker, gid, error = %e, "group invalidation failed");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AuthStores;
    use cache_system::{CacheStore, LayeredCache, LocalTierCache};
    use config::PermissionConfig;
    use std::time::Duration;
    use store_object::MemoryAuthStore;

    struct Fixture {
        store: Arc<MemoryAuthStore>,
        l1: Arc<LocalTierCache>,
        service: Arc<PermissionService>,
    }

    fn fixture(store: MemoryAuthStore) -> Fixture {
        let store = Arc::new(store);
        let l1 = Arc::new(LocalTierCache::default());
        let cache = Arc::new(LayeredCache::new(Some(l1.clone() as Arc<dyn CacheStore>), None));
        let service = Arc::new(PermissionService::new(
            cache,
            AuthStores::from_shared(store.clone()),
            PermissionConfig::default(),
        ));
        Fixture { store, l1, service }
    }

    fn seed(l1: &LocalTierCache, uid: UserId) {
        l1.set_value(&format!("perm:user:{uid}"), "[]", Duration::from_secs(60));
    }

    #[test]
    fn test_events_map_to_jobs() {
        assert_eq!(
            InvalidationJob::from(&AuthEventKind::GroupDeleted { group_id: 7 }),
            InvalidationJob::Group(7)
        );
        assert_eq!(
            InvalidationJob::from(&AuthEventKind::RuleChanged { group_id: 7 }),
            InvalidationJob::Group(7)
        );
        assert_eq!(
            InvalidationJob::from(&AuthEventKind::MembershipChanged {
                group_id: 7,
                user_id: 42
            }),
            InvalidationJob::User(42)
        );
        assert_eq!(
            InvalidationJob::from(&AuthEventKind::UserLoggedOut { user_id: 42 }),
            InvalidationJob::User(42)
        );
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let f = fixture(MemoryAuthStore::new().with_latency(Duration::from_millis(10)));
        for uid in 1..=6 {
            f.store.add_member(uid, 7);
            seed(&f.l1, uid);
        }
        seed(&f.l1, 100);

        let dispatcher = InvalidationDispatcher::start(
            f.service.clone(),
            &InvalidationConfig::new(2, 16, 4),
        );
        dispatcher.invalidate_group(7).unwrap();
        dispatcher.invalidate_user(100).unwrap();
        dispatcher.shutdown().await;

        assert!(f.l1.is_empty());
        assert_eq!(dispatcher.stats().completed, 2);
        assert!(matches!(
            dispatcher.invalidate_user(1),
            Err(PermissionError::DispatcherClosed)
        ));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_waiting() {
        let f = fixture(MemoryAuthStore::new());
        let dispatcher = InvalidationDispatcher::start(
            f.service.clone(),
            &InvalidationConfig::new(1, 2, 16),
        );

        // The worker cannot run before this task yields, so nothing is dequeued yet.
        dispatcher.invalidate_user(1).unwrap();
        dispatcher.invalidate_user(2).unwrap();
        assert_eq!(dispatcher.pending(), 2);
        assert!(matches!(
            dispatcher.invalidate_user(3),
            Err(PermissionError::QueueFull)
        ));
        assert_eq!(dispatcher.stats().rejected, 1);

        dispatcher.shutdown().await;
        assert_eq!(dispatcher.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_failed_group_job_is_counted() {
        let f = fixture(MemoryAuthStore::new());
        f.store.set_unavailable(true);
        let dispatcher =
            InvalidationDispatcher::start(f.service.clone(), &InvalidationConfig::default());

        dispatcher.invalidate_group(7).unwrap();
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_subscribed_events_invalidate() {
        let f = fixture(MemoryAuthStore::new());
        f.store.add_member(42, 7);
        f.store.add_member(43, 7);
        for uid in [42, 43, 50] {
            seed(&f.l1, uid);
        }

        let signals = SignalManager::new();
        let dispatcher = Arc::new(InvalidationDispatcher::start(
            f.service.clone(),
            &InvalidationConfig::default(),
        ));
        dispatcher.subscribe(&signals);

        signals.emit(AuthEvent::new(AuthEventKind::GroupRulesChanged { group_id: 7 }));
        signals.emit(AuthEvent::new(AuthEventKind::UserLoggedOut { user_id: 50 }));
        dispatcher.shutdown().await;

        assert!(f.l1.is_empty());
        assert_eq!(signals.stats().callback_failures, 0);

        // Events after shutdown are reported as callback failures.
        signals.emit(AuthEvent::new(AuthEventKind::UserLoggedOut { user_id: 50 }));
        assert_eq!(signals.stats().callback_failures, 1);
    }
}
