//! Store Object - collaborator lookups for the permission cache
//!
//! Read-only access to group membership, group rules and the menu tree,
//! with a Postgres backend and an in-memory backend for tests.

pub mod errors;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod prelude;
pub mod traits;

pub use errors::StoreError;
pub use memory::{CallCounts, MemoryAuthStore};
pub use models::{AuthRule, GroupId, MenuEntry, RULE_STATUS_ENABLED, UserId};
pub use postgres::PgAuthStore;
pub use traits::{GroupAccessStore, MenuStore, RuleStore};

use sqlx::PgPool;

pub type DbPool = PgPool;
