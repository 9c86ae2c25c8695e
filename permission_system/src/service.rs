//! Cache-aside loader of per-user permission sets.
//!
//! A user's permission set is the visible menu URLs that one of the user's
//! groups holds an enabled rule for. The super user skips the group join and
//! gets every visible menu URL plus every enabled rule URL. Sets are cached
//! under `perm:user:<uid>` as a JSON array; an empty set is cached as the
//! negative sentinel with a shorter TTL.

use crate::errors::PermissionError;
use crate::keys::{normalize_path, user_key};
use crate::stats::{PermissionCounters, PermissionMetrics};
use cache_system::{CacheLookup, LayeredCache, NIL_SENTINEL};
use config::{FailurePolicy, PermissionConfig};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use store_object::{GroupAccessStore, GroupId, MenuStore, RuleStore, UserId};

const DEFAULT_BATCH_SIZE: usize = 256;

/// The three read-only lookups a permission set is derived from
#[derive(Debug, Clone)]
pub struct AuthStores {
    pub groups: Arc<dyn GroupAccessStore>,
    pub rules: Arc<dyn RuleStore>,
    pub menus: Arc<dyn MenuStore>,
}

impl AuthStores {
    pub fn new(
        groups: Arc<dyn GroupAccessStore>,
        rules: Arc<dyn RuleStore>,
        menus: Arc<dyn MenuStore>,
    ) -> Self {
        Self {
            groups,
            rules,
            menus,
        }
    }

    /// Use one backend for all three lookups
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: GroupAccessStore + RuleStore + MenuStore + 'static,
    {
        Self {
            groups: store.clone(),
            rules: store.clone(),
            menus: store,
        }
    }
}

pub struct PermissionService {
    cache: Arc<LayeredCache>,
    stores: AuthStores,
    config: PermissionConfig,
    batch_size: usize,
    counters: PermissionCounters,
}

impl std::fmt::Debug for PermissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionService")
            .field("key_prefix", &self.config.key_prefix)
            .field("super_user_id", &self.config.super_user_id)
            .field("failure_policy", &self.config.failure_policy)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl PermissionService {
    pub fn new(cache: Arc<LayeredCache>, stores: AuthStores, config: PermissionConfig) -> Self {
        Self {
            cache,
            stores,
            config,
            batch_size: DEFAULT_BATCH_SIZE,
            counters: PermissionCounters::default(),
        }
    }

    /// Number of keys deleted per call during group fan-out
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn config(&self) -> &PermissionConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<LayeredCache> {
        &self.cache
    }

    fn key(&self, uid: UserId) -> String {
        user_key(&self.config.key_prefix, uid)
    }

    /// The user's normalized permission paths.
    ///
    /// Concurrent misses for one user share a single source load. Source
    /// failures are returned as [`PermissionError::Store`] and leave the
    /// cache untouched.
    pub async fn get_user_permissions(
        &self,
        uid: UserId,
    ) -> Result<HashSet<String>, PermissionError> {
        let key = self.key(uid);

        let guard = match self.cache.lookup(&key).await {
            CacheLookup::Negative => {
                self.counters.record_hit(true);
                return Ok(HashSet::new());
            }
            CacheLookup::Present(payload) => {
                match serde_json::from_str::<Vec<String>>(&payload) {
                    Ok(urls) => {
                        self.counters.record_hit(false);
                        return Ok(urls.into_iter().collect());
                    }
                    Err(e) => {
                        tracing::warn!(uid, key = %key, error = %e, "corrupt cached permission set, reloading");
                        None
                    }
                }
            }
            CacheLookup::Miss(guard) => guard,
        };

        let loaded = if uid == self.config.super_user_id {
            self.load_super_user().await
        } else {
            self.load_user(uid).await
        };
        let urls = match loaded {
            Ok(urls) => urls,
            Err(e) => {
                self.counters.record_load_error();
                tracing::warn!(uid, error = %e, "failed to load permissions");
                return Err(e.into());
            }
        };
        self.counters.record_source_load();

        let (payload, ttl) = if urls.is_empty() {
            (NIL_SENTINEL.to_string(), self.config.negative_ttl())
        } else {
            let urls: Vec<&String> = urls.iter().collect();
            match serde_json::to_string(&urls) {
                Ok(payload) => (payload, self.config.ttl()),
                Err(e) => {
                    tracing::warn!(uid, error = %e, "failed to serialize permission set");
                    return Ok(urls.into_iter().cloned().collect());
                }
            }
        };
        match &guard {
            // An invalidation during the load keeps its result out of the cache.
            Some(guard) => {
                self.cache.set_ex_if_current(guard, &payload, ttl).await;
            }
            None => self.cache.set_ex(&key, &payload, ttl).await,
        }
        // Followers re-read the cache once the guard is gone.
        drop(guard);

        Ok(urls.into_iter().collect())
    }

    async fn load_user(&self, uid: UserId) -> Result<BTreeSet<String>, store_object::StoreError> {
        let gids = self.stores.groups.list_group_ids_by_user(uid).await?;
        if gids.is_empty() {
            return Ok(BTreeSet::new());
        }

        let rules = self
            .stores
            .rules
            .list_enabled_rules_by_group_ids(&gids)
            .await?;
        let granted: HashSet<String> = rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .filter_map(|rule| normalize_path(&rule.url))
            .collect();
        if granted.is_empty() {
            return Ok(BTreeSet::new());
        }

        let menus = self.stores.menus.list_all_menu_entries().await?;
        Ok(menus
            .iter()
            .filter(|menu| menu.visible)
            .filter_map(|menu| normalize_path(&menu.url))
            .filter(|url| granted.contains(url))
            .collect())
    }

    async fn load_super_user(&self) -> Result<BTreeSet<String>, store_object::StoreError> {
        let (menus, rules) = tokio::try_join!(
            self.stores.menus.list_all_menu_entries(),
            self.stores.rules.list_enabled_rules(),
        )?;

        let visible = menus
            .iter()
            .filter(|menu| menu.visible)
            .filter_map(|menu| normalize_path(&menu.url));
        let enabled = rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .filter_map(|rule| normalize_path(&rule.url));
        Ok(visible.chain(enabled).collect())
    }

    fn apply_failure_policy(&self, uid: UserId, error: &PermissionError) -> bool {
        let allow = self.config.failure_policy == FailurePolicy::Open;
        tracing::warn!(uid, error = %error, allow, "permission check could not load permissions");
        allow
    }

    /// Whether `uid` holds `path`. Load failures follow the failure policy.
    pub async fn has_permission(&self, uid: UserId, path: &str) -> bool {
        self.has_any_permission(uid, [path]).await
    }

    /// Whether `uid` holds at least one of `paths`
    pub async fn has_any_permission<I, S>(&self, uid: UserId, paths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<String> = paths
            .into_iter()
            .filter_map(|path| normalize_path(path.as_ref()))
            .collect();
        if wanted.is_empty() {
            return false;
        }

        match self.get_user_permissions(uid).await {
            Ok(granted) => wanted.iter().any(|path| granted.contains(path)),
            Err(e) => self.apply_failure_policy(uid, &e),
        }
    }

    /// Drop one user's cached set
    pub async fn invalidate(&self, uid: UserId) {
        self.cache.del(&[self.key(uid)]).await;
        self.counters.record_invalidation("single", 1);
        #[cfg(feature = "debug-logging")]
        tracing::debug!(uid, "invalidated user permissions");
    }

    /// Drop the cached set of every current member of `gid`.
    ///
    /// Returns the number of members whose keys were deleted.
    pub async fn invalidate_users_by_group(&self, gid: GroupId) -> Result<usize, PermissionError> {
        let uids: BTreeSet<UserId> = self
            .stores
            .groups
            .list_user_ids_by_group(gid)
            .await?
            .into_iter()
            .collect();
        let keys: Vec<String> = uids.iter().map(|uid| self.key(*uid)).collect();

        for batch in keys.chunks(self.batch_size) {
            self.cache.del(batch).await;
        }
        self.counters.record_invalidation("group", keys.len());
        tracing::debug!(gid, users = keys.len(), "invalidated group members");
        Ok(keys.len())
    }

    /// Unsupported: keys can only be removed individually.
    ///
    /// Never touches the cache. Invalidate by user or group instead, or
    /// rotate the cache key prefix.
    pub fn invalidate_all(&self) -> Result<(), PermissionError> {
        self.counters.record_invalidation("all", 0);
        tracing::warn!("invalidate_all requested; not supported by the layered cache");
        Err(PermissionError::InvalidateAllUnsupported)
    }

    pub fn snapshot_metrics(&self) -> PermissionMetrics {
        self.counters.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.counters.reset();
    }
}
