//! Classification of failed attempts.

use std::time::Duration;
use thiserror::Error;

/// Status codes the policy reacts to.
pub mod status_codes {
    /// Forbidden.
    pub const FORBIDDEN: u16 = 403;
    /// Not found.
    pub const NOT_FOUND: u16 = 404;
    /// Request timeout.
    pub const REQUEST_TIMEOUT: u16 = 408;
    /// Conflict.
    pub const CONFLICT: u16 = 409;
    /// Throttled.
    pub const TOO_MANY_REQUESTS: u16 = 429;
    /// Transient unavailability.
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// Sub-status codes the policy reacts to.
pub mod sub_status_codes {
    /// No sub-status.
    pub const UNKNOWN: u32 = 0;
    /// The region is read-only.
    pub const WRITE_FORBIDDEN: u32 = 3;
    /// The replica has not caught up with the session token.
    pub const READ_SESSION_NOT_AVAILABLE: u32 = 1002;
    /// The account is not yet provisioned in this region.
    pub const DATABASE_ACCOUNT_NOT_FOUND: u32 = 1008;
}

/// Header carrying the server-suggested retry delay in milliseconds.
pub const RETRY_AFTER_MS_HEADER: &str = "x-ms-retry-after-ms";

/// Older spelling of [`RETRY_AFTER_MS_HEADER`].
pub const LEGACY_RETRY_AFTER_MS_HEADER: &str = "retry-after-ms";

/// Why one attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The server answered with an error status.
    #[error("request failed with status {status}/{sub_status}: {message}")]
    Status {
        /// Status code.
        status: u16,
        /// Sub-status code.
        sub_status: u32,
        /// Server-suggested delay before retrying.
        retry_after: Option<Duration>,
        /// Server message.
        message: String,
    },

    /// The host could not be reached.
    #[error("endpoint unreachable: {message}")]
    Network {
        /// Underlying error text.
        message: String,
    },

    /// No connection could be taken from the pool.
    #[error("connection pool exhausted: {message}")]
    ConnectionPoolExhausted {
        /// Underlying error text.
        message: String,
    },
}

/// How the retry policy treats a [`RequestFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Local resource exhaustion; retried on the same endpoint.
    ConnectionExhaustion,
    /// 403 / 3: the region no longer accepts writes.
    WriteForbidden,
    /// 403 / 1008: the account is not provisioned in this region yet.
    ReadRegionNotProvisioned,
    /// Host unreachable.
    Network,
    /// 404 / 1002: session token not yet available at this replica.
    SessionNotAvailable,
    /// 429 or 503.
    Throttled,
    /// Everything else; surfaced unchanged.
    Terminal,
}

impl RequestFailure {
    /// Creates a status failure without a retry-after hint.
    pub fn status(status: u16, sub_status: u32, message: impl Into<String>) -> Self {
        RequestFailure::Status {
            status,
            sub_status,
            retry_after: None,
            message: message.into(),
        }
    }

    /// 403 / 3.
    pub fn write_forbidden() -> Self {
        Self::status(
            status_codes::FORBIDDEN,
            sub_status_codes::WRITE_FORBIDDEN,
            "the requested region is not writable",
        )
    }

    /// 403 / 1008.
    pub fn read_region_not_provisioned() -> Self {
        Self::status(
            status_codes::FORBIDDEN,
            sub_status_codes::DATABASE_ACCOUNT_NOT_FOUND,
            "the account is not available in the requested region",
        )
    }

    /// 404 / 1002.
    pub fn session_not_available() -> Self {
        Self::status(
            status_codes::NOT_FOUND,
            sub_status_codes::READ_SESSION_NOT_AVAILABLE,
            "the read session is not available for the input session token",
        )
    }

    /// 429 with an optional server delay.
    pub fn throttled(retry_after: Option<Duration>) -> Self {
        RequestFailure::Status {
            status: status_codes::TOO_MANY_REQUESTS,
            sub_status: sub_status_codes::UNKNOWN,
            retry_after,
            message: "request rate is large".to_string(),
        }
    }

    /// 503 with an optional server delay.
    pub fn service_unavailable(retry_after: Option<Duration>) -> Self {
        RequestFailure::Status {
            status: status_codes::SERVICE_UNAVAILABLE,
            sub_status: sub_status_codes::UNKNOWN,
            retry_after,
            message: "service is currently unavailable".to_string(),
        }
    }

    /// Host unreachable.
    pub fn network(message: impl Into<String>) -> Self {
        RequestFailure::Network {
            message: message.into(),
        }
    }

    /// Connection pool exhausted.
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        RequestFailure::ConnectionPoolExhausted {
            message: message.into(),
        }
    }

    /// Builds a failure from a response's status line and headers.
    ///
    /// A retry-after header is honoured only for 429 and 503; header names
    /// compare case-insensitively and values are milliseconds.
    pub fn from_response<I, K, V>(
        status: u16,
        sub_status: u32,
        headers: I,
        message: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let honours_retry_after = matches!(
            status,
            status_codes::TOO_MANY_REQUESTS | status_codes::SERVICE_UNAVAILABLE
        );

        let mut retry_after = None;
        if honours_retry_after {
            for (name, value) in headers {
                let name = name.as_ref();
                if name.eq_ignore_ascii_case(RETRY_AFTER_MS_HEADER)
                    || name.eq_ignore_ascii_case(LEGACY_RETRY_AFTER_MS_HEADER)
                {
                    if let Ok(ms) = value.as_ref().trim().parse::<u64>() {
                        retry_after = Some(Duration::from_millis(ms));
                        break;
                    }
                }
            }
        }

        RequestFailure::Status {
            status,
            sub_status,
            retry_after,
            message: message.into(),
        }
    }

    /// Returns the status code, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the sub-status code, if the server answered.
    pub fn sub_status_code(&self) -> Option<u32> {
        match self {
            RequestFailure::Status { sub_status, .. } => Some(*sub_status),
            _ => None,
        }
    }

    /// Returns the server-suggested delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RequestFailure::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Classifies the failure.
    pub fn category(&self) -> FailureCategory {
        use status_codes::*;
        use sub_status_codes::*;

        match self {
            RequestFailure::ConnectionPoolExhausted { .. } => FailureCategory::ConnectionExhaustion,
            RequestFailure::Network { .. } => FailureCategory::Network,
            RequestFailure::Status {
                status, sub_status, ..
            } => match (*status, *sub_status) {
                (FORBIDDEN, WRITE_FORBIDDEN) => FailureCategory::WriteForbidden,
                (FORBIDDEN, DATABASE_ACCOUNT_NOT_FOUND) => {
                    FailureCategory::ReadRegionNotProvisioned
                }
                (NOT_FOUND, READ_SESSION_NOT_AVAILABLE) => FailureCategory::SessionNotAvailable,
                (TOO_MANY_REQUESTS, _) | (SERVICE_UNAVAILABLE, _) => FailureCategory::Throttled,
                _ => FailureCategory::Terminal,
            },
        }
    }
}
