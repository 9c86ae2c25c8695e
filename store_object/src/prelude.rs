//! Convenience re-exports for common store-object usage

// Collaborator traits
pub use crate::traits::{GroupAccessStore, MenuStore, RuleStore};

// Row types
pub use crate::models::{AuthRule, GroupId, MenuEntry, UserId};

// Error types
pub use crate::errors::StoreError;

// Backends
pub use crate::memory::MemoryAuthStore;
pub use crate::postgres::PgAuthStore;
pub use crate::DbPool;

pub use async_trait::async_trait;
