//! Key-value audit backend: one Redis hash per record.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use stationauth_core::AuditRecord;

use crate::error::AuditError;
use crate::logger::AuditBackend;

/// Writes each record with `HSET log:authorize:{start_nanos}:{station}:{token}`.
#[derive(Clone)]
pub struct RedisAuditBackend {
    pool: Pool,
}

impl RedisAuditBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditBackend for RedisAuditBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        let fields = record.fields();
        let _: () = conn
            .hset_multiple(record.key(), fields.as_slice())
            .await
            .map_err(|e| AuditError::WriteFailed(e.to_string()))?;

        Ok(())
    }
}
