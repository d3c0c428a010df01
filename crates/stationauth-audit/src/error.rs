use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid audit configuration: {0}")]
    InvalidConfig(String),

    #[error("Audit backend connection failed: {0}")]
    Connection(String),

    #[error("Audit write failed: {0}")]
    WriteFailed(String),

    #[error("Audit backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
