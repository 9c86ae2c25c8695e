//! PostgreSQL implementation of the collaborator lookups.
//!
//! Reads the admin tables of the API administration database:
//! `admin_auth_group_access`, `admin_auth_rule` and `admin_menu`.
//!
//! `admin_auth_group_access.group_id` is a text column holding decimal ids.
//! It is compared and read as text, so a BIGINT column works as well; values
//! that are empty or not an integer are skipped.

use crate::errors::StoreError;
use crate::models::{AuthRule, GroupId, MenuEntry, RULE_STATUS_ENABLED, UserId};
use crate::traits::{GroupAccessStore, MenuStore, RuleStore};
use crate::DbPool;
use async_trait::async_trait;

const GROUP_ACCESS_TABLE: &str = "admin_auth_group_access";
const RULE_TABLE: &str = "admin_auth_rule";
const MENU_TABLE: &str = "admin_menu";

const GROUP_IDS_BY_USER_SQL: &str =
    "SELECT group_id::text FROM admin_auth_group_access WHERE uid = $1";
const USER_IDS_BY_GROUP_SQL: &str =
    "SELECT DISTINCT uid FROM admin_auth_group_access WHERE group_id::text = $1 ORDER BY uid";
const RULES_BY_GROUP_IDS_SQL: &str =
    "SELECT url, group_id, status FROM admin_auth_rule WHERE group_id = ANY($1) AND status = $2";
const ENABLED_RULES_SQL: &str =
    "SELECT url, group_id, status FROM admin_auth_rule WHERE status = $1";
const MENU_ENTRIES_SQL: &str =
    "SELECT url, (show = 1) AS visible FROM admin_menu ORDER BY sort ASC";

/// Collaborator lookups backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgAuthStore {
    db_pool: DbPool,
}

impl PgAuthStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db_pool
    }
}

/// Parse stored group ids, dropping empty and non-numeric values
fn parse_group_ids(raw: Vec<Option<String>>) -> Vec<GroupId> {
    let mut gids: Vec<GroupId> = raw
        .into_iter()
        .flatten()
        .filter_map(|value| value.parse().ok())
        .collect();
    gids.sort_unstable();
    gids
}

#[async_trait]
impl GroupAccessStore for PgAuthStore {
    async fn list_group_ids_by_user(&self, uid: UserId) -> Result<Vec<GroupId>, StoreError> {
        let raw = sqlx::query_scalar::<_, Option<String>>(GROUP_IDS_BY_USER_SQL)
            .bind(uid)
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::database_operation(GROUP_ACCESS_TABLE, "list_group_ids_by_user", e))?;
        Ok(parse_group_ids(raw))
    }

    async fn list_user_ids_by_group(&self, gid: GroupId) -> Result<Vec<UserId>, StoreError> {
        sqlx::query_scalar::<_, UserId>(USER_IDS_BY_GROUP_SQL)
            .bind(gid.to_string())
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::database_operation(GROUP_ACCESS_TABLE, "list_user_ids_by_group", e))
    }
}

#[async_trait]
impl RuleStore for PgAuthStore {
    async fn list_enabled_rules_by_group_ids(
        &self,
        gids: &[GroupId],
    ) -> Result<Vec<AuthRule>, StoreError> {
        if gids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, AuthRule>(RULES_BY_GROUP_IDS_SQL)
            .bind(gids)
            .bind(RULE_STATUS_ENABLED)
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::database_operation(RULE_TABLE, "list_enabled_rules_by_group_ids", e))
    }

    async fn list_enabled_rules(&self) -> Result<Vec<AuthRule>, StoreError> {
        sqlx::query_as::<_, AuthRule>(ENABLED_RULES_SQL)
            .bind(RULE_STATUS_ENABLED)
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::database_operation(RULE_TABLE, "list_enabled_rules", e))
    }
}

#[async_trait]
impl MenuStore for PgAuthStore {
    async fn list_all_menu_entries(&self) -> Result<Vec<MenuEntry>, StoreError> {
        sqlx::query_as::<_, MenuEntry>(MENU_ENTRIES_SQL)
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::database_operation(MENU_TABLE, "list_all_menu_entries", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ids_skip_empty_and_malformed_values() {
        let raw = vec![
            Some("12".to_string()),
            Some(String::new()),
            None,
            Some("abc".to_string()),
            Some("7".to_string()),
        ];
        assert_eq!(parse_group_ids(raw), vec![7, 12]);
    }
}
