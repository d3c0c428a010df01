use thiserror::Error;

/// Failure talking to the access-control store.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("ACL query timed out")]
    Timeout,

    #[error("ACL service unreachable: {0}")]
    Transport(String),

    #[error("ACL service answered with status {0}")]
    Status(u16),

    #[error("ACL response could not be decoded: {0}")]
    Decode(String),

    #[error("ACL store error: {0}")]
    Store(String),
}

impl AclError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AclError::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Task queue is closed")]
    Closed,

    #[error("Task queue is full")]
    Full,

    #[error("Task queue connection error: {0}")]
    Connection(String),

    #[error("Task queue command failed: {0}")]
    Command(String),

    #[error("Task could not be encoded: {0}")]
    Encode(#[from] stationauth_core::CoreError),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
