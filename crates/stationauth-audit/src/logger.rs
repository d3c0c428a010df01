//! The audit logger and its backend capability.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::Pool;
use stationauth_core::AuditRecord;

use crate::config::{AuditBackendKind, AuditConfig};
use crate::error::AuditError;
use crate::redis_backend::RedisAuditBackend;
use crate::search_index::SearchIndexAuditBackend;

/// Storage for audit records.
///
/// Implementations may fail; [`AuditLogger`] contains those failures.
#[async_trait]
pub trait AuditBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Persist one record
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Backend used when no audit storage is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditBackend;

#[async_trait]
impl AuditBackend for NoopAuditBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Best-effort audit logger shared by all task invocations.
#[derive(Clone)]
pub struct AuditLogger {
    backend: Arc<dyn AuditBackend>,
}

impl AuditLogger {
    pub fn new(backend: Arc<dyn AuditBackend>) -> Self {
        Self { backend }
    }

    /// Logger that discards every record.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopAuditBackend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Record the outcome of one task. Never fails.
    pub async fn log(&self, record: &AuditRecord) {
        match self.backend.write(record).await {
            Ok(()) => {
                tracing::debug!(
                    backend = self.backend.name(),
                    key = %record.key(),
                    status = %record.status,
                    "Audit record written"
                );
            }
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    key = %record.key(),
                    status = %record.status,
                    callback_status = %record.callback_status,
                    "Failed to write audit record"
                );
            }
        }
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Build the audit logger selected by configuration.
///
/// `redis` is the shared Redis pool; it is required when the Redis backend is
/// selected and ignored otherwise.
pub async fn create_audit_logger(
    config: &AuditConfig,
    redis: Option<Pool>,
) -> Result<AuditLogger, AuditError> {
    config.validate().map_err(AuditError::InvalidConfig)?;

    let backend: Arc<dyn AuditBackend> = match config.backend {
        AuditBackendKind::None => Arc::new(NoopAuditBackend),
        AuditBackendKind::Redis => {
            let pool = redis.ok_or_else(|| {
                AuditError::InvalidConfig("audit.backend=redis requires redis.enabled=true".into())
            })?;
            Arc::new(RedisAuditBackend::new(pool))
        }
        AuditBackendKind::SearchIndex => {
            Arc::new(SearchIndexAuditBackend::connect(&config.search_index).await?)
        }
    };

    tracing::info!(backend = backend.name(), "Audit backend selected");
    Ok(AuditLogger::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationauth_core::{
        AuthorizationRequest, CallbackReceipt, DecisionOutcome, DecisionPayload,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use uuid::Uuid;

    struct FailingBackend {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AuditBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AuditError::WriteFailed("disk on fire".into()))
        }
    }

    fn sample_record() -> AuditRecord {
        let now = OffsetDateTime::now_utc();
        let request = AuthorizationRequest::new(
            Uuid::new_v4(),
            "valid_driver_token_12345",
            "http://callback.url",
            now,
        );
        AuditRecord::new(
            now,
            DecisionPayload::new(&request, DecisionOutcome::Unknown),
            &CallbackReceipt::Delivered(200),
            &request.callback_url,
        )
    }

    #[tokio::test]
    async fn test_disabled_logger_accepts_records() {
        let logger = AuditLogger::disabled();
        assert_eq!(logger.backend_name(), "none");
        logger.log(&sample_record()).await;
    }

    #[tokio::test]
    async fn test_backend_failure_is_contained() {
        let backend = Arc::new(FailingBackend {
            attempts: AtomicUsize::new(0),
        });
        let logger = AuditLogger::new(backend.clone());

        logger.log(&sample_record()).await;
        logger.log(&sample_record()).await;

        assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_factory_defaults_to_noop() {
        let logger = create_audit_logger(&AuditConfig::default(), None)
            .await
            .unwrap();
        assert_eq!(logger.backend_name(), "none");
    }

    #[tokio::test]
    async fn test_factory_redis_without_pool_is_rejected() {
        let config = AuditConfig {
            backend: AuditBackendKind::Redis,
            ..Default::default()
        };
        let err = create_audit_logger(&config, None).await.unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }
}
