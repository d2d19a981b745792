use boss_scheduler::{RedisStore, SchedulerError, StateStore};
use std::time::Duration;

use crate::helpers::TestHarness;

#[tokio::test]
#[ignore] // Run with --ignored flag since it requires containers
async fn test_redis_store_roundtrip_and_expiry() {
    let harness = TestHarness::new().await.unwrap();
    let store = RedisStore::connect(&harness.redis_url, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(store.get("last_boss_response").await.unwrap(), None);

    store
        .set("last_boss_response", "Boosted boss: Ferumbras", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        store.get("last_boss_response").await.unwrap().as_deref(),
        Some("Boosted boss: Ferumbras")
    );

    store
        .set("short_lived", "value", Duration::from_secs(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(store.get("short_lived").await.unwrap(), None);
}

#[tokio::test]
async fn test_redis_connect_fails_without_server() {
    // Nothing listens on port 1
    let result = RedisStore::connect("redis://127.0.0.1:1/0", Duration::from_secs(2)).await;

    assert!(matches!(
        result,
        Err(SchedulerError::Redis(_)) | Err(SchedulerError::Connection(_)) | Err(SchedulerError::Timeout(_))
    ));
}
