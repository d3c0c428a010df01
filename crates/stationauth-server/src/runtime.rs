//! Process wiring: turns an [`AppConfig`] into running components.

use std::sync::Arc;

use deadpool_redis::Pool;
use stationauth_audit::create_audit_logger;
use stationauth_core::SystemClock;
use stationauth_worker::{
    AccessControlStore, AuthorizationTask, ChannelTaskQueue, DecisionResolver,
    HttpAccessControlStore, HttpCallbackDispatcher, RedisTaskQueue, TaskProcessor, TaskQueue,
};

use crate::allowlist::{AllowlistAccessControl, AllowlistStore, InMemoryAllowlist, RedisAllowlist};
use crate::config::{AppConfig, StoreBackend};
use crate::error::ServerError;
use crate::redis_pool::create_redis_pool;
use crate::server::{AppState, ServerBuilder, shutdown_signal};

fn require_pool(redis: Option<&Pool>, what: &str) -> Result<Pool, ServerError> {
    redis
        .cloned()
        .ok_or_else(|| ServerError::Config(format!("{what}=redis requires redis.enabled=true")))
}

pub fn build_allowlist(
    cfg: &AppConfig,
    redis: Option<&Pool>,
) -> Result<Arc<dyn AllowlistStore>, ServerError> {
    let store: Arc<dyn AllowlistStore> = match cfg.allowlist.backend {
        StoreBackend::Memory => Arc::new(InMemoryAllowlist::new()),
        StoreBackend::Redis => Arc::new(RedisAllowlist::new(require_pool(
            redis,
            "allowlist.backend",
        )?)),
    };
    tracing::info!(backend = store.name(), "Allowlist store selected");
    Ok(store)
}

/// Build the worker's consumer loop.
///
/// `acl` is the access-control store the resolver queries; the audit backend
/// is chosen once here and shared by every invocation.
pub async fn build_processor(
    cfg: &AppConfig,
    acl: Arc<dyn AccessControlStore>,
    queue: Arc<dyn TaskQueue>,
    redis: Option<Pool>,
) -> Result<TaskProcessor, ServerError> {
    let clock = Arc::new(SystemClock);
    let resolver = DecisionResolver::new(acl, clock.clone())
        .with_query_timeout(cfg.worker.acl.query_timeout());
    let dispatcher = HttpCallbackDispatcher::new(cfg.worker.callback_timeout())?;
    let audit = create_audit_logger(&cfg.audit, redis).await?;

    let task = AuthorizationTask::new(resolver, Arc::new(dispatcher), audit, clock);
    Ok(
        TaskProcessor::new(queue, Arc::new(task), cfg.worker.concurrency)
            .with_poll_interval(cfg.queue.poll_timeout()),
    )
}

/// Serve the HTTP API until Ctrl+C.
///
/// With an in-memory queue the worker runs in this process and reads the
/// local allowlist directly; it drains pending requests before returning.
pub async fn run_server(cfg: AppConfig) -> anyhow::Result<()> {
    let redis = create_redis_pool(&cfg.redis).await?;
    let allowlist = build_allowlist(&cfg, redis.as_ref())?;

    let (queue, local_worker): (Arc<dyn TaskQueue>, _) = match cfg.queue.backend {
        StoreBackend::Redis => {
            let pool = require_pool(redis.as_ref(), "queue.backend")?;
            let queue = Arc::new(RedisTaskQueue::new(pool, cfg.queue.key.clone()));
            (queue as Arc<dyn TaskQueue>, None)
        }
        StoreBackend::Memory => {
            let channel = Arc::new(ChannelTaskQueue::new(cfg.queue.capacity));
            let acl = Arc::new(AllowlistAccessControl::new(allowlist.clone()));
            let processor = build_processor(&cfg, acl, channel.clone(), redis.clone()).await?;
            let handle = tokio::spawn(async move {
                processor.run_until(std::future::pending()).await
            });
            tracing::info!("Worker running in-process");
            (channel.clone() as Arc<dyn TaskQueue>, Some((channel, handle)))
        }
    };

    let state = AppState::new(&cfg, allowlist, queue);
    ServerBuilder::new()
        .with_config(cfg)
        .build(state)
        .run()
        .await?;

    if let Some((channel, handle)) = local_worker {
        channel.close();
        match handle.await {
            Ok(completed) => tracing::info!(completed, "In-process worker finished"),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Consume the shared Redis queue until Ctrl+C, querying the ACL service over HTTP.
pub async fn run_worker(cfg: AppConfig) -> anyhow::Result<()> {
    if cfg.queue.backend != StoreBackend::Redis {
        anyhow::bail!("a standalone worker requires queue.backend=redis");
    }
    let redis = create_redis_pool(&cfg.redis).await?;
    let pool = require_pool(redis.as_ref(), "queue.backend")?;
    let queue = Arc::new(RedisTaskQueue::new(pool, cfg.queue.key.clone()));
    let acl = Arc::new(HttpAccessControlStore::new(cfg.worker.acl.url.clone()));

    tracing::info!(queue = %queue.key(), acl = %cfg.worker.acl.url, "Starting worker");
    let processor = build_processor(&cfg, acl, queue, redis).await?;
    processor.run_until(shutdown_signal()).await;
    Ok(())
}
