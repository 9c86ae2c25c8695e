//! The capability contract shared by every cache tier.

use crate::errors::CacheError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// String key/value store with per-entry expiry.
///
/// `get` returning `Ok(None)` and `Ok(Some(""))` both mean "not found"; a
/// legitimately empty result has to be cached with the nil sentinel instead
/// (see [`crate::sentinel`]).
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Short tier name used in logs and metric labels
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`; a zero TTL means no expiry
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Remaining lifetime of `key`, when the tier can tell.
    ///
    /// `None` covers missing keys, keys without expiry and tiers that do not
    /// support the query.
    async fn remaining_ttl(&self, _key: &str) -> Option<Duration> {
        None
    }
}
