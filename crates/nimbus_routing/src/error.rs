//! Error types for routing and retry decisions.

use thiserror::Error;

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Errors raised by the endpoint directory or the retry policy itself.
///
/// These are distinct from [`RequestFailure`](crate::RequestFailure), which
/// describes why an attempt failed on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A retry decision was requested before any endpoint was resolved,
    /// which means the request was never dispatched.
    #[error("request was never dispatched: no endpoint was resolved")]
    EndpointNotResolved,

    /// The directory has no endpoint to offer.
    #[error("no {direction} endpoint available")]
    NoEndpointAvailable {
        /// "read" or "write".
        direction: &'static str,
    },

    /// Refreshing the endpoint directory failed.
    #[error("endpoint directory refresh failed: {0}")]
    RefreshFailed(String),
}

impl RoutingError {
    /// Returns true if the request may still succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::RefreshFailed(_))
    }
}
