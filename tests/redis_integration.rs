//! Runs against a live Redis. Start one with
//! `docker run -p 6380:6379 redis:7` and run `cargo test -- --ignored`.

use once_cell::sync::Lazy;
use std::sync::Arc;

use chrono::{Duration, Utc};
use redis::aio::ConnectionManager;
use sessiondb::store::RedisStore;
use sessiondb::{Metadata, SessionManager};

static REDIS_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6380/".to_string())
});

async fn get_redis_conn() -> ConnectionManager {
    redis::Client::open(REDIS_URL.as_str())
        .unwrap()
        .get_connection_manager()
        .await
        .unwrap()
}

async fn setup() -> SessionManager {
    let mut con = get_redis_conn().await;
    let _: () = redis::cmd("FLUSHDB").query_async(&mut con).await.unwrap();
    SessionManager::new(Arc::new(RedisStore::from_manager(con)))
}

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_TEST_URL"]
async fn test_redis_session_lifecycle() {
    let manager = setup().await;

    let session = manager.create("user_1", 60, Metadata::new()).await.unwrap();
    let read = manager.get(&session.session_id).await.unwrap().unwrap();
    assert_eq!(read.user_id, "user_1");
    assert!(read.last_activity >= read.created_at);

    let stats = manager.stats().await;
    assert_eq!((stats.active, stats.expired), (1, 0));

    let later = Utc::now() + Duration::seconds(61);
    assert_eq!(manager.cleanup_expired(later).await.unwrap(), 1);
    assert_eq!(manager.stats().await.total, 0);
    assert_eq!(manager.get(&session.session_id).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_TEST_URL"]
async fn test_redis_read_preserves_ttl() {
    let manager = setup().await;
    let session = manager.create("user_2", 120, Metadata::new()).await.unwrap();

    let mut con = get_redis_conn().await;
    let key = format!("session:{}", session.session_id);
    let before: i64 = redis::cmd("PTTL").arg(&key).query_async(&mut con).await.unwrap();
    manager.get(&session.session_id).await.unwrap().unwrap();
    let after: i64 = redis::cmd("PTTL").arg(&key).query_async(&mut con).await.unwrap();

    assert!(after <= before);
    assert!(after > 110_000);
}

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_TEST_URL"]
async fn test_redis_revoke_user() {
    let manager = setup().await;
    manager.create("user_3", 60, Metadata::new()).await.unwrap();
    manager.create("user_3", 60, Metadata::new()).await.unwrap();

    assert_eq!(manager.invalidate_all_for_user("user_3").await.unwrap(), 2);
    assert!(manager.list_active_for_user("user_3").await.unwrap().is_empty());
}
