//! Row types read by the permission collaborators.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type GroupId = i64;

/// `admin_auth_rule.status` value of an enabled rule
pub const RULE_STATUS_ENABLED: i16 = 1;

/// One URL a group is granted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthRule {
    pub url: String,
    pub group_id: GroupId,
    pub status: i16,
}

impl AuthRule {
    pub fn enabled(group_id: GroupId, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            group_id,
            status: RULE_STATUS_ENABLED,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == RULE_STATUS_ENABLED
    }
}

/// Menu entry; only visible entries can carry a permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuEntry {
    pub url: String,
    pub visible: bool,
}

impl MenuEntry {
    pub fn new(url: impl Into<String>, visible: bool) -> Self {
        Self {
            url: url.into(),
            visible,
        }
    }
}
