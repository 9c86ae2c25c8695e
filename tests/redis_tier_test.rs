//! Integration tests for the Redis tier
//!
//! These run against a live Redis and are skipped unless `REDIS_URL` is set,
//! e.g. `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_tier_test`.

use permhaus::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn redis_tier(test: &str) -> Option<RedisTierCache> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set, skipping {test}");
        return None;
    };
    // A unique prefix keeps parallel runs from seeing each other's keys.
    let prefix = format!("permhaus-test-{test}-{}", std::process::id());
    Some(RedisTierCache::new(CacheConfig::new(url, prefix)).expect("valid REDIS_URL"))
}

#[tokio::test]
async fn test_redis_round_trip_and_delete() {
    let Some(tier) = redis_tier("round_trip") else {
        return;
    };
    assert_eq!(tier.ping().await.unwrap(), "PONG");

    tier.set_ex("k", "v", Duration::from_secs(30)).await.unwrap();
    assert_eq!(tier.get("k").await.unwrap().as_deref(), Some("v"));

    tier.del(&["k".to_string()]).await.unwrap();
    assert_eq!(tier.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_redis_reports_remaining_ttl() {
    let Some(tier) = redis_tier("ttl") else {
        return;
    };

    tier.set_ex("k", "v", Duration::from_secs(30)).await.unwrap();
    let ttl = tier.remaining_ttl("k").await.unwrap();
    assert!(ttl > Duration::from_secs(25) && ttl <= Duration::from_secs(30));

    assert_eq!(tier.remaining_ttl("missing").await, None);
    tier.del(&["k".to_string()]).await.unwrap();
}

#[tokio::test]
async fn test_layered_cache_backfills_from_redis() {
    let Some(tier) = redis_tier("backfill") else {
        return;
    };
    let remote = Arc::new(tier);
    let writer_l1 = Arc::new(LocalTierCache::default());
    let writer = LayeredCache::new(
        Some(writer_l1 as Arc<dyn CacheStore>),
        Some(remote.clone() as Arc<dyn CacheStore>),
    );
    writer.set_ex("perm:user:42", r#"["/admin/app/index"]"#, Duration::from_secs(60)).await;

    // A second process sharing Redis starts with an empty L1.
    let reader_l1 = Arc::new(LocalTierCache::default());
    let reader = LayeredCache::new(
        Some(reader_l1.clone() as Arc<dyn CacheStore>),
        Some(remote.clone() as Arc<dyn CacheStore>),
    );
    assert!(matches!(reader.lookup("perm:user:42").await, CacheLookup::Present(_)));

    let backfilled = reader_l1.ttl_of("perm:user:42").unwrap();
    assert!(backfilled > Duration::from_secs(50));
    assert_eq!(reader.snapshot_metrics().backfill_l1, 1);

    reader.del(&["perm:user:42".to_string()]).await;
}
