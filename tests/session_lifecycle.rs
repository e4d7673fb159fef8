use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sessiondb::store::{KeyValueStore, MemoryStore};
use sessiondb::{Metadata, MetadataValue, SessionManager, SessionStats};

fn setup() -> (SessionManager, MemoryStore) {
    let store = MemoryStore::new();
    (SessionManager::new(Arc::new(store.clone())), store)
}

#[tokio::test]
async fn test_create_read_expire_and_sweep() {
    let (manager, _) = setup();

    let session = manager
        .create("user_1", 60, Metadata::new())
        .await
        .unwrap();
    assert_eq!(session.expires_at - session.created_at, Duration::seconds(60));

    let stats = manager.stats().await;
    assert_eq!(stats.active, 1);
    assert_eq!(stats.expired, 0);

    let later = Utc::now() + Duration::seconds(61);
    assert_eq!(manager.cleanup_expired(later).await.unwrap(), 1);
    assert_eq!(manager.stats().await.total, 0);
    assert_eq!(manager.get(&session.session_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_metadata_survives_storage() {
    let (manager, _) = setup();

    let mut metadata = Metadata::new();
    metadata.insert("ip".into(), "192.168.1.100".into());
    metadata.insert("user_agent".into(), "Mozilla/5.0 (Example Browser)".into());
    metadata.insert("login_count".into(), MetadataValue::Integer(7));
    metadata.insert("remember_me".into(), MetadataValue::Bool(false));

    let created = manager
        .create("example_user_123", 3600, metadata.clone())
        .await
        .unwrap();
    let read = manager.get(&created.session_id).await.unwrap().unwrap();

    assert_eq!(read.metadata, metadata);
    assert_eq!(read.created_at, created.created_at);
    assert_eq!(read.expires_at, created.expires_at);
}

#[tokio::test]
async fn test_sensitive_metadata_is_only_advisory() {
    let (manager, _) = setup();

    let mut metadata = Metadata::new();
    metadata.insert("csrf_token".into(), "abc".into());

    let session = manager.create("user_1", 60, metadata).await.unwrap();
    assert!(manager.get(&session.session_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_revoke_user_removes_listed_sessions() {
    let (manager, store) = setup();

    for _ in 0..4 {
        manager.create("user_1", 300, Metadata::new()).await.unwrap();
    }

    let listed: HashSet<String> = manager
        .list_active_for_user("user_1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(listed.len(), 4);

    assert_eq!(manager.invalidate_all_for_user("user_1").await.unwrap(), 4);
    for id in &listed {
        assert_eq!(manager.get(id).await.unwrap(), None);
    }
    assert!(manager.list_active_for_user("user_1").await.unwrap().is_empty());
    assert_eq!(store.zcard("session_cleanup").await.unwrap(), 0);
}

#[tokio::test]
async fn test_listing_skips_natively_expired_records() {
    let (manager, store) = setup();

    let short = manager.create("user_1", 30, Metadata::new()).await.unwrap();
    let long = manager.create("user_1", 300, Metadata::new()).await.unwrap();

    store.advance(Duration::seconds(31)).await;

    let listed = manager.list_active_for_user("user_1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, long.session_id);
    assert_eq!(manager.get(&short.session_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_user_set_rolls_forward_with_new_sessions() {
    let (manager, store) = setup();

    manager.create("user_1", 60, Metadata::new()).await.unwrap();
    store.advance(Duration::seconds(50)).await;
    manager.create("user_1", 60, Metadata::new()).await.unwrap();
    store.advance(Duration::seconds(20)).await;

    // The first record is gone but the set lives on with both ids.
    assert_eq!(store.smembers("user_sessions:user_1").await.unwrap().len(), 2);
    assert_eq!(manager.list_active_for_user("user_1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_degrade_to_zero_when_store_is_down() {
    let (manager, store) = setup();
    manager.create("user_1", 60, Metadata::new()).await.unwrap();

    store.set_unavailable(true);
    assert_eq!(manager.stats().await, SessionStats::default());
    assert!(manager.cleanup_expired(Utc::now()).await.is_err());

    store.set_unavailable(false);
    assert_eq!(manager.stats().await.total, 1);
}

#[tokio::test]
async fn test_concurrent_reads_keep_expiry() {
    let (manager, store) = setup();
    let session = manager.create("user_1", 120, Metadata::new()).await.unwrap();

    let reads = (0..8).map(|_| manager.get(&session.session_id));
    let results = futures::future::try_join_all(reads).await.unwrap();
    assert!(results.iter().all(|r| r.as_ref().map(|s| s.expires_at) == Some(session.expires_at)));

    let ttl = store
        .pttl(&format!("session:{}", session.session_id))
        .await
        .unwrap();
    assert!(ttl > 110_000 && ttl <= 120_000);
}
