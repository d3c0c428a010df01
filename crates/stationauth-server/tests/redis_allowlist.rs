//! Redis-backed allowlist and pool creation against a real Redis instance.

use stationauth_server::config::RedisConfig;
use stationauth_server::{AllowlistStore, RedisAllowlist, create_redis_pool};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use uuid::Uuid;

static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn redis_config() -> RedisConfig {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");
            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            (container, format!("redis://127.0.0.1:{host_port}"))
        })
        .await;
    RedisConfig {
        enabled: true,
        url: url.clone(),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_allowlist_membership() {
    let pool = create_redis_pool(&redis_config().await)
        .await
        .unwrap()
        .expect("redis enabled");
    let store = RedisAllowlist::new(pool);
    let station = Uuid::new_v4();
    let token = "valid_driver_token_12345";

    assert!(!store.contains(station, token).await.unwrap());
    assert_eq!(store.add(station, token).await.unwrap(), 1);
    assert_eq!(store.add(station, token).await.unwrap(), 0);
    assert!(store.contains(station, token).await.unwrap());
    assert_eq!(store.remove(station, token).await.unwrap(), 1);
    assert!(!store.contains(station, token).await.unwrap());
}

#[tokio::test]
async fn test_disabled_redis_yields_no_pool() {
    let pool = create_redis_pool(&RedisConfig::default()).await.unwrap();
    assert!(pool.is_none());
}

#[tokio::test]
async fn test_unreachable_redis_fails_fast() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        timeout_ms: 500,
        ..Default::default()
    };
    assert!(create_redis_pool(&config).await.is_err());
}
