//! Read-only lookups the permission service depends on.
//!
//! Implementations do not retry; latency and availability are theirs to own.

use crate::errors::StoreError;
use crate::models::{AuthRule, GroupId, MenuEntry, UserId};
use async_trait::async_trait;
use std::fmt::Debug;

/// User ↔ group membership
#[async_trait]
pub trait GroupAccessStore: Send + Sync + Debug {
    async fn list_group_ids_by_user(&self, uid: UserId) -> Result<Vec<GroupId>, StoreError>;

    async fn list_user_ids_by_group(&self, gid: GroupId) -> Result<Vec<UserId>, StoreError>;
}

/// Group rules
#[async_trait]
pub trait RuleStore: Send + Sync + Debug {
    /// Enabled rules belonging to any of `gids`
    async fn list_enabled_rules_by_group_ids(
        &self,
        gids: &[GroupId],
    ) -> Result<Vec<AuthRule>, StoreError>;

    /// Every enabled rule, regardless of group
    async fn list_enabled_rules(&self) -> Result<Vec<AuthRule>, StoreError>;
}

/// Menu tree, flattened
#[async_trait]
pub trait MenuStore: Send + Sync + Debug {
    async fn list_all_menu_entries(&self) -> Result<Vec<MenuEntry>, StoreError>;
}
