//! Error types for request execution.

use nimbus_codec::CodecError;
use nimbus_query::QueryError;
use nimbus_routing::{RequestFailure, RoutingError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The request could not be framed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The retry policy or endpoint directory failed.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Cross-partition results could not be ordered.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// The last attempt failed and the policy declined to retry.
    #[error("{0}")]
    Request(#[from] RequestFailure),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// A response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A background task died.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl ClientError {
    /// Returns the surfaced attempt failure, if that is what this is.
    pub fn failure(&self) -> Option<&RequestFailure> {
        match self {
            ClientError::Request(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns true if the caller cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// Returns true if this indicates a bug or a client/server mismatch
    /// that no retry can fix.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Codec(_) | ClientError::Query(_) | ClientError::InvalidResponse(_) => true,
            ClientError::Routing(err) => !err.is_retryable(),
            _ => false,
        }
    }
}
