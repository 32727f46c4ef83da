//! Retry decisions.
//!
//! [`ClientRetryPolicy`] is the per-request decision engine. It owns two
//! sub-policies: [`ResourceThrottleRetryPolicy`] for 429/503 responses and
//! [`ConnectionPoolExhaustedRetry`] for local connection exhaustion.

mod client;
mod pool_exhausted;
mod throttle;

pub use client::ClientRetryPolicy;
pub use pool_exhausted::ConnectionPoolExhaustedRetry;
pub use throttle::ResourceThrottleRetryPolicy;

use crate::endpoint::Endpoint;
use crate::error::RoutingError;
use std::time::Duration;

/// Outcome of evaluating one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShouldRetryResult {
    /// Surface the original failure.
    NoRetry,
    /// Retry after waiting this long.
    RetryAfter(Duration),
    /// The policy itself failed; surface this error.
    Error(RoutingError),
}

impl ShouldRetryResult {
    /// Returns true for [`ShouldRetryResult::RetryAfter`].
    pub fn is_retry(&self) -> bool {
        matches!(self, ShouldRetryResult::RetryAfter(_))
    }

    /// Returns the delay if this is a retry.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            ShouldRetryResult::RetryAfter(delay) => Some(*delay),
            _ => None,
        }
    }
}

/// Where the next attempt of a retried request should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// Position of the location to route to.
    pub attempt_index: usize,
    /// Whether to route within the preferred-ordered list.
    pub prefer_routed_locations: bool,
}

impl RetryContext {
    /// Creates a retry context.
    pub fn new(attempt_index: usize, prefer_routed_locations: bool) -> Self {
        Self {
            attempt_index,
            prefer_routed_locations,
        }
    }
}

/// Counters kept by one [`ClientRetryPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStatistics {
    /// Failovers to another endpoint.
    pub failover_retries: u32,
    /// Session-token retries.
    pub session_token_retries: u32,
    /// Throttling retries granted.
    pub throttle_retries: u32,
    /// Connection pool retries granted.
    pub pool_exhausted_retries: u32,
    /// Endpoints contacted, one entry per attempt.
    pub contacted_endpoints: Vec<Endpoint>,
}

impl RetryStatistics {
    /// Returns the total number of retries granted.
    pub fn total_retries(&self) -> u32 {
        self.failover_retries
            + self.session_token_retries
            + self.throttle_retries
            + self.pool_exhausted_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_retry_result_helpers() {
        let retry = ShouldRetryResult::RetryAfter(Duration::from_millis(5));
        assert!(retry.is_retry());
        assert_eq!(retry.delay(), Some(Duration::from_millis(5)));

        assert!(!ShouldRetryResult::NoRetry.is_retry());
        assert_eq!(
            ShouldRetryResult::Error(RoutingError::EndpointNotResolved).delay(),
            None
        );
    }

    #[test]
    fn statistics_total() {
        let stats = RetryStatistics {
            failover_retries: 2,
            session_token_retries: 1,
            throttle_retries: 3,
            pool_exhausted_retries: 0,
            contacted_endpoints: Vec::new(),
        };
        assert_eq!(stats.total_retries(), 6);
    }
}
