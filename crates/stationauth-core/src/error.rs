use thiserror::Error;

/// Core error types for authorization requests
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid station id: {0}")]
    InvalidStationId(#[from] uuid::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Decision outcome not recognized: {0}")]
    UnknownOutcome(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
