//! TTL jitter to keep entries written together from expiring together.

use rand::Rng;
use std::time::Duration;

/// Extend `ttl` by a random amount in `[0, ttl / 10)`.
///
/// The result is never shorter than `ttl`. Durations too small to spread
/// (under 10ns, including zero) are returned unchanged.
pub fn jitter_ttl(ttl: Duration) -> Duration {
    let spread = ttl.as_nanos() / 10;
    if spread == 0 {
        return ttl;
    }
    let spread = u64::try_from(spread).unwrap_or(u64::MAX);
    let extra = rand::rng().random_range(0..spread);
    ttl.saturating_add(Duration::from_nanos(extra))
}
