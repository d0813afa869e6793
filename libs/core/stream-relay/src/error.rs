//! Relay error types and transient-failure classification.
//!
//! Whether an error is worth retrying is decided in exactly one place:
//! [`SinkError::is_transient`]. The retry layer takes that predicate as a
//! parameter, so tests (and future sinks) can swap it out.

use thiserror::Error;

/// Errors surfaced by a sink client.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connectivity failure from a non-Redis transport (and test doubles)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Anything the sink cannot attribute to the connection
    #[error("Internal sink error: {0}")]
    Internal(String),
}

impl SinkError {
    /// Connectivity and timeout failures qualify for backoff-and-retry;
    /// everything else (type errors, auth failures, bugs) does not.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Redis(e) => matches!(
                e.kind(),
                redis::ErrorKind::IoError
                    | redis::ErrorKind::BusyLoadingError
                    | redis::ErrorKind::TryAgain
                    | redis::ErrorKind::ClusterDown
                    | redis::ErrorKind::MasterDown
            ),
            SinkError::Connection(_) => true,
            SinkError::Internal(_) => false,
        }
    }
}

/// Errors from the relay's Redis-facing plumbing outside the sink seam
/// (source consumer, readiness checks).
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}
