use std::time::Duration;

use deadpool_redis::{Pool, PoolConfig, Runtime};

use crate::config::RedisConfig;
use crate::error::ServerError;

/// Create the shared Redis pool, or `None` when Redis is disabled.
///
/// Fails when Redis is enabled but unreachable; every Redis-backed component
/// is selected explicitly, so there is nothing to fall back to.
pub async fn create_redis_pool(config: &RedisConfig) -> Result<Option<Pool>, ServerError> {
    if !config.enabled {
        tracing::info!("Redis disabled");
        return Ok(None);
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Some(Duration::from_millis(config.timeout_ms));
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = timeout;
    pool_config.timeouts.create = timeout;
    pool_config.timeouts.recycle = timeout;

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| ServerError::Redis(e.to_string()))?;

    // Fail fast on a bad URL or unreachable server
    pool.get()
        .await
        .map_err(|e| ServerError::Redis(format!("cannot connect to {}: {e}", config.url)))?;

    tracing::info!("Connected to Redis");
    Ok(Some(pool))
}
