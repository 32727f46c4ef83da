//! Retry on local connection pool exhaustion.

use super::ShouldRetryResult;
use crate::config::RetryOptions;
use std::time::Duration;
use tracing::debug;

/// Retries attempts that failed because no connection could be acquired.
///
/// The endpoint is left unchanged; the pool is expected to free up shortly.
#[derive(Debug, Clone)]
pub struct ConnectionPoolExhaustedRetry {
    max_retries: u32,
    interval: Duration,
    retry_count: u32,
}

impl ConnectionPoolExhaustedRetry {
    /// Creates the sub-policy from retry options.
    pub fn new(options: &RetryOptions) -> Self {
        Self {
            max_retries: options.max_connection_pool_retries,
            interval: options.connection_pool_retry_interval,
            retry_count: 0,
        }
    }

    /// Decides on one more exhaustion failure.
    pub fn should_retry(&mut self) -> ShouldRetryResult {
        self.retry_count += 1;
        if self.retry_count > self.max_retries {
            debug!(retries = self.max_retries, "connection pool retries exhausted");
            return ShouldRetryResult::NoRetry;
        }
        ShouldRetryResult::RetryAfter(self.interval)
    }

    /// Returns how many retries were granted.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.min(self.max_retries)
    }
}
