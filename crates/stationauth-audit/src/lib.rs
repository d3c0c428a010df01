//! Audit logging for authorization tasks.
//!
//! Every task invocation produces exactly one [`AuditRecord`], handed to an
//! [`AuditLogger`]. The logger never fails: backend errors are logged and
//! dropped so they cannot alter a decision or callback that already happened.
//!
//! | Backend | Storage |
//! |---------|---------|
//! | [`NoopAuditBackend`] | discards records |
//! | [`RedisAuditBackend`] | Redis hash per record (`log:authorize:{start}:{station}:{token}`) |
//! | [`SearchIndexAuditBackend`] | one document per record in an Elasticsearch-compatible index |
//!
//! The backend is chosen once at process start from [`AuditConfig`].
//!
//! [`AuditRecord`]: stationauth_core::AuditRecord

pub mod config;
pub mod error;
pub mod logger;
pub mod redis_backend;
pub mod search_index;

pub use config::{AuditBackendKind, AuditConfig, SearchIndexConfig};
pub use error::AuditError;
pub use logger::{AuditBackend, AuditLogger, NoopAuditBackend, create_audit_logger};
pub use redis_backend::RedisAuditBackend;
pub use search_index::{AuthorizationLogEntry, SearchIndexAuditBackend};
