//! In-memory collaborator tables.
//!
//! Backs tests and demos. Each lookup is counted, can be delayed to widen
//! race windows, and can be switched to fail like an unreachable database.

use crate::errors::StoreError;
use crate::models::{AuthRule, GroupId, MenuEntry, UserId, RULE_STATUS_ENABLED};
use crate::traits::{GroupAccessStore, MenuStore, RuleStore};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct Tables {
    memberships: BTreeSet<(UserId, GroupId)>,
    rules: Vec<AuthRule>,
    menus: Vec<MenuEntry>,
}

/// Number of calls made to each lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub group_ids_by_user: usize,
    pub user_ids_by_group: usize,
    pub rules_by_group_ids: usize,
    pub enabled_rules: usize,
    pub menu_entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    group_ids_by_user: AtomicUsize,
    user_ids_by_group: AtomicUsize,
    rules_by_group_ids: AtomicUsize,
    enabled_rules: AtomicUsize,
    menu_entries: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    tables: RwLock<Tables>,
    counters: Counters,
    unavailable: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every lookup by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_member(&self, uid: UserId, gid: GroupId) {
        self.write().memberships.insert((uid, gid));
    }

    pub fn remove_member(&self, uid: UserId, gid: GroupId) {
        self.write().memberships.remove(&(uid, gid));
    }

    pub fn add_rule(&self, gid: GroupId, url: &str) {
        self.write().rules.push(AuthRule::enabled(gid, url));
    }

    /// Enable or disable every rule of `gid` for `url`
    pub fn set_rule_enabled(&self, gid: GroupId, url: &str, enabled: bool) {
        let status = if enabled { RULE_STATUS_ENABLED } else { 0 };
        for rule in self
            .write()
            .rules
            .iter_mut()
            .filter(|rule| rule.group_id == gid && rule.url == url)
        {
            rule.status = status;
        }
    }

    /// Delete a group's rules and memberships
    pub fn remove_group(&self, gid: GroupId) {
        let mut tables = self.write();
        tables.rules.retain(|rule| rule.group_id != gid);
        tables.memberships.retain(|(_, group)| *group != gid);
    }

    pub fn add_menu(&self, url: &str, visible: bool) {
        self.write().menus.push(MenuEntry::new(url, visible));
    }

    /// Make every lookup fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            group_ids_by_user: self.counters.group_ids_by_user.load(Ordering::SeqCst),
            user_ids_by_group: self.counters.user_ids_by_group.load(Ordering::SeqCst),
            rules_by_group_ids: self.counters.rules_by_group_ids.load(Ordering::SeqCst),
            enabled_rules: self.counters.enabled_rules.load(Ordering::SeqCst),
            menu_entries: self.counters.menu_entries.load(Ordering::SeqCst),
        }
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupAccessStore for MemoryAuthStore {
    async fn list_group_ids_by_user(&self, uid: UserId) -> Result<Vec<GroupId>, StoreError> {
        self.enter(&self.counters.group_ids_by_user).await?;
        Ok(self
            .read()
            .memberships
            .iter()
            .filter(|(user, _)| *user == uid)
            .map(|(_, group)| *group)
            .collect())
    }

    async fn list_user_ids_by_group(&self, gid: GroupId) -> Result<Vec<UserId>, StoreError> {
        self.enter(&self.counters.user_ids_by_group).await?;
        Ok(self
            .read()
            .memberships
            .iter()
            .filter(|(_, group)| *group == gid)
            .map(|(user, _)| *user)
            .collect())
    }
}

#[async_trait]
impl RuleStore for MemoryAuthStore {
    async fn list_enabled_rules_by_group_ids(
        &self,
        gids: &[GroupId],
    ) -> Result<Vec<AuthRule>, StoreError> {
        self.enter(&self.counters.rules_by_group_ids).await?;
        Ok(self
            .read()
            .rules
            .iter()
            .filter(|rule| rule.is_enabled() && gids.contains(&rule.group_id))
            .cloned()
            .collect())
    }

    async fn list_enabled_rules(&self) -> Result<Vec<AuthRule>, StoreError> {
        self.enter(&self.counters.enabled_rules).await?;
        Ok(self
            .read()
            .rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MenuStore for MemoryAuthStore {
    async fn list_all_menu_entries(&self) -> Result<Vec<MenuEntry>, StoreError> {
        self.enter(&self.counters.menu_entries).await?;
        Ok(self.read().menus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_lookups_both_ways() {
        let store = MemoryAuthStore::new();
        store.add_member(42, 7);
        store.add_member(42, 8);
        store.add_member(43, 7);

        assert_eq!(store.list_group_ids_by_user(42).await.unwrap(), vec![7, 8]);
        assert_eq!(store.list_user_ids_by_group(7).await.unwrap(), vec![42, 43]);

        store.remove_member(43, 7);
        assert_eq!(store.list_user_ids_by_group(7).await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_disabled_rules_are_filtered() {
        let store = MemoryAuthStore::new();
        store.add_rule(7, "/admin/app/index");
        store.add_rule(8, "/admin/user/index");
        store.set_rule_enabled(7, "/admin/app/index", false);

        assert!(store.list_enabled_rules_by_group_ids(&[7]).await.unwrap().is_empty());
        assert_eq!(store.list_enabled_rules().await.unwrap().len(), 1);
        assert_eq!(store.calls().rules_by_group_ids, 1);
        assert_eq!(store.calls().enabled_rules, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryAuthStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_all_menu_entries().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.list_all_menu_entries().await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_group_drops_rules_and_members() {
        let store = MemoryAuthStore::new();
        store.add_member(1, 7);
        store.add_rule(7, "/a");
        store.remove_group(7);
        assert!(store.list_user_ids_by_group(7).await.unwrap().is_empty());
        assert!(store.list_enabled_rules().await.unwrap().is_empty());
    }
}
