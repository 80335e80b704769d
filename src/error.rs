use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// The four error kinds of spec.md §7. Every error is local to the
/// offending request; none propagate across jobs or workers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Missing required field or undecodable payload.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Referenced job_id does not exist.
    #[error("job not found")]
    NotFound,

    /// Precondition violated: stale fencing token, non-owning worker,
    /// expired lease, or a duplicate idempotency key currently in flight.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    /// Poll deadline expired without an eligible job.
    #[error("no job available")]
    NoJobAvailable,
}
