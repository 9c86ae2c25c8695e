//! Auth event types and definitions
//!
//! This module defines the administrative changes that flow through the
//! signal system. Every kind names the user or group whose derived
//! permissions it affects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEventKind {
    /// The rule set granted to a group was edited
    GroupRulesChanged { group_id: i64 },
    /// A group was enabled or disabled
    GroupStatusChanged { group_id: i64 },
    GroupDeleted { group_id: i64 },
    /// A single rule owned by a group was edited or toggled
    RuleChanged { group_id: i64 },
    /// A user joined or left a group
    MembershipChanged { group_id: i64, user_id: i64 },
    UserRolesChanged { user_id: i64 },
    UserLoggedOut { user_id: i64 },
}

impl AuthEventKind {
    /// Group whose members are all affected, if the change is group-scoped
    pub fn group_id(&self) -> Option<i64> {
        match *self {
            Self::GroupRulesChanged { group_id }
            | Self::GroupStatusChanged { group_id }
            | Self::GroupDeleted { group_id }
            | Self::RuleChanged { group_id } => Some(group_id),
            Self::MembershipChanged { .. }
            | Self::UserRolesChanged { .. }
            | Self::UserLoggedOut { .. } => None,
        }
    }

    /// Single user affected, if the change is user-scoped
    pub fn user_id(&self) -> Option<i64> {
        match *self {
            Self::MembershipChanged { user_id, .. }
            | Self::UserRolesChanged { user_id }
            | Self::UserLoggedOut { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GroupRulesChanged { .. } => "group_rules_changed",
            Self::GroupStatusChanged { .. } => "group_status_changed",
            Self::GroupDeleted { .. } => "group_deleted",
            Self::RuleChanged { .. } => "rule_changed",
            Self::MembershipChanged { .. } => "membership_changed",
            Self::UserRolesChanged { .. } => "user_roles_changed",
            Self::UserLoggedOut { .. } => "user_logged_out",
        }
    }
}

/// Auth event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Unique event ID
    pub id: Uuid,
    pub kind: AuthEventKind,
    /// Tags for grouping related operations (request id, operator, ...)
    pub tags: Vec<String>,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            tags: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.add_tags(tags);
        self
    }

    pub fn add_tags(&mut self, tags: Vec<String>) {
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_scoped_kinds() {
        for kind in [
            AuthEventKind::GroupRulesChanged { group_id: 7 },
            AuthEventKind::GroupStatusChanged { group_id: 7 },
            AuthEventKind::GroupDeleted { group_id: 7 },
            AuthEventKind::RuleChanged { group_id: 7 },
        ] {
            assert_eq!(kind.group_id(), Some(7), "{}", kind.name());
            assert_eq!(kind.user_id(), None);
        }
    }

    #[test]
    fn test_user_scoped_kinds() {
        for kind in [
            AuthEventKind::MembershipChanged {
                group_id: 7,
                user_id: 42,
            },
            AuthEventKind::UserRolesChanged { user_id: 42 },
            AuthEventKind::UserLoggedOut { user_id: 42 },
        ] {
            assert_eq!(kind.user_id(), Some(42), "{}", kind.name());
            assert_eq!(kind.group_id(), None);
        }
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let event = AuthEvent::new(AuthEventKind::UserLoggedOut { user_id: 1 })
            .with_tags(vec!["req-1".into(), "admin".into()])
            .with_tags(vec!["admin".into()]);
        assert_eq!(event.tags, vec!["req-1", "admin"]);
    }

    #[test]
    fn test_event_serializes_with_tagged_kind() {
        let event = AuthEvent::new(AuthEventKind::RuleChanged { group_id: 3 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "rule_changed");
        assert_eq!(json["kind"]["group_id"], 3);

        let back: AuthEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
