use thiserror::Error;

/// Failures while wiring up a process from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error(transparent)]
    Audit(#[from] stationauth_audit::AuditError),

    #[error(transparent)]
    Worker(#[from] stationauth_worker::WorkerError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failure of the allowlist backing store.
#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("Allowlist connection error: {0}")]
    Connection(String),

    #[error("Allowlist command failed: {0}")]
    Command(String),
}
