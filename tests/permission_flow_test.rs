//! Integration tests for the permission cache
//!
//! Drives the full component graph (layered cache, permission service,
//! signal manager, invalidation dispatcher) over in-memory collaborators.

use permhaus::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<MemoryAuthStore>,
    remote: Arc<LocalTierCache>,
    permhaus: PermHaus,
}

fn harness_with(config: AppConfig, store: MemoryAuthStore) -> Harness {
    let store = Arc::new(store);
    // A second in-process table stands in for Redis.
    let remote = Arc::new(LocalTierCache::default());
    let remote_tier: Arc<dyn CacheStore> = remote.clone();
    let permhaus = PermHaus::from_parts(
        config,
        Arc::new(LocalTierCache::default()),
        Some(remote_tier),
        AuthStores::from_shared(store.clone()),
    );
    Harness {
        store,
        remote,
        permhaus,
    }
}

fn harness() -> Harness {
    harness_with(AppConfig::default(), MemoryAuthStore::new())
}

fn seed_admin_tables(store: &MemoryAuthStore) {
    store.add_member(42, 7);
    store.add_rule(7, "/admin/app/index");
    store.add_menu("/admin/app/index", true);
    store.add_menu("/admin/user/index", true);
}

#[tokio::test]
async fn test_rule_disabled_and_group_invalidated_yields_empty_set() {
    let h = harness();
    seed_admin_tables(&h.store);
    let permissions = h.permhaus.permissions();

    let perms = permissions.get_user_permissions(42).await.unwrap();
    assert_eq!(perms, HashSet::from(["/admin/app/index".to_string()]));
    assert!(permissions.has_permission(42, "/admin/app/index").await);

    h.store.set_rule_enabled(7, "/admin/app/index", false);
    assert_eq!(permissions.invalidate_users_by_group(7).await.unwrap(), 1);

    assert!(permissions.get_user_permissions(42).await.unwrap().is_empty());
    assert!(!permissions.has_permission(42, "/admin/app/index").await);
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_auth_event_invalidates_through_dispatcher() {
    let h = harness();
    seed_admin_tables(&h.store);
    let permissions = h.permhaus.permissions();
    assert!(permissions.has_permission(42, "/admin/app/index").await);

    h.store.set_rule_enabled(7, "/admin/app/index", false);
    h.permhaus
        .signals()
        .emit(AuthEvent::new(AuthEventKind::RuleChanged { group_id: 7 }).with_tags(vec!["req-1".into()]));
    // Draining the dispatcher guarantees the queued group job ran.
    h.permhaus.dispatcher().shutdown().await;

    assert!(!permissions.has_permission(42, "/admin/app/index").await);
    assert_eq!(h.permhaus.dispatcher().stats().completed, 1);
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_logout_event_drops_only_that_user() {
    let h = harness();
    seed_admin_tables(&h.store);
    h.store.add_member(43, 7);
    let permissions = h.permhaus.permissions();
    permissions.get_user_permissions(42).await.unwrap();
    permissions.get_user_permissions(43).await.unwrap();

    h.permhaus
        .signals()
        .emit(AuthEvent::new(AuthEventKind::UserLoggedOut { user_id: 42 }));
    h.permhaus.shutdown().await;

    let local = h.permhaus.local_cache();
    assert_eq!(local.get_value("perm:user:42"), None);
    assert!(local.get_value("perm:user:43").is_some());
    assert_eq!(h.remote.get_value("perm:user:42"), None);
}

#[tokio::test]
async fn test_remote_tier_backfills_a_fresh_local_tier() {
    let h = harness();
    seed_admin_tables(&h.store);
    h.permhaus.permissions().get_user_permissions(42).await.unwrap();

    // Simulate another process: the local tier is empty, the shared one is not.
    h.permhaus.local_cache().flush();
    let again = h.permhaus.permissions().get_user_permissions(42).await.unwrap();

    assert_eq!(again.len(), 1);
    assert_eq!(h.store.calls().group_ids_by_user, 1);
    let metrics = h.permhaus.cache().snapshot_metrics();
    assert_eq!(metrics.hits_l2, 1);
    assert_eq!(metrics.backfill_l1, 1);
    assert!(h.permhaus.local_cache().get_value("perm:user:42").is_some());
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_negative_caching_shields_source() {
    let h = harness();
    let permissions = h.permhaus.permissions();

    for _ in 0..5 {
        assert!(permissions.get_user_permissions(404).await.unwrap().is_empty());
    }
    assert_eq!(h.store.calls().group_ids_by_user, 1);
    assert_eq!(h.permhaus.cache().snapshot_metrics().sentinel_hits, 4);
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_super_user_sees_everything_enabled() {
    let h = harness();
    seed_admin_tables(&h.store);
    h.store.add_rule(9, "/admin/interface/index");

    let perms = h.permhaus.permissions().get_user_permissions(1).await.unwrap();
    assert_eq!(
        perms,
        HashSet::from([
            "/admin/app/index".to_string(),
            "/admin/user/index".to_string(),
            "/admin/interface/index".to_string(),
        ])
    );
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_failure_policy_from_config() {
    let config = AppConfig::from_toml_str(
        r#"
        [permission]
        failure_policy = "open"
        "#,
    )
    .unwrap();
    let h = harness_with(config, MemoryAuthStore::new());
    h.store.set_unavailable(true);

    let permissions = h.permhaus.permissions();
    assert!(permissions.get_user_permissions(42).await.is_err());
    assert!(permissions.has_permission(42, "/admin/app/index").await);
    h.permhaus.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stampede_on_cold_key_loads_once() {
    let h = harness_with(
        AppConfig::default(),
        MemoryAuthStore::new().with_latency(Duration::from_millis(30)),
    );
    seed_admin_tables(&h.store);
    let permissions = h.permhaus.permissions().clone();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let permissions = permissions.clone();
            tokio::spawn(async move { permissions.has_permission(42, "/admin/app/index").await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }

    assert_eq!(h.store.calls().group_ids_by_user, 1);
    assert_eq!(h.store.calls().menu_entries, 1);
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_metrics_snapshots_serialize() {
    let h = harness();
    seed_admin_tables(&h.store);
    let permissions = h.permhaus.permissions();
    permissions.get_user_permissions(42).await.unwrap();
    permissions.get_user_permissions(42).await.unwrap();

    let service = serde_json::to_value(permissions.snapshot_metrics()).unwrap();
    assert_eq!(service["cache_hits"], 1);
    assert_eq!(service["source_loads"], 1);

    let cache = serde_json::to_value(h.permhaus.cache().snapshot_metrics()).unwrap();
    assert_eq!(cache["hits_l1"], 1);
    assert_eq!(cache["req_total"], 2);
    h.permhaus.shutdown().await;
}

#[tokio::test]
async fn test_invalidate_all_reports_unsupported() {
    let h = harness();
    assert!(matches!(
        h.permhaus.permissions().invalidate_all(),
        Err(PermissionError::InvalidateAllUnsupported)
    ));
    h.permhaus.shutdown().await;
}
