//! Backoff for throttled responses.

use super::ShouldRetryResult;
use crate::config::RetryOptions;
use crate::failure::{FailureCategory, RequestFailure};
use std::time::Duration;
use tracing::debug;

/// Backoff for throttled (429) and transiently unavailable (503) responses.
///
/// The server's retry-after hint wins over the computed delay. Retries stop
/// after `max_retry_attempts_on_throttled_requests`, or as soon as the next
/// wait would take the cumulative wait past `max_retry_wait_time`.
#[derive(Debug, Clone)]
pub struct ResourceThrottleRetryPolicy {
    options: RetryOptions,
    attempt_count: u32,
    cumulative_wait: Duration,
}

impl ResourceThrottleRetryPolicy {
    /// Creates the sub-policy.
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options,
            attempt_count: 0,
            cumulative_wait: Duration::ZERO,
        }
    }

    /// Decides on a failure that no other rule claimed.
    pub fn should_retry(&mut self, failure: &RequestFailure) -> ShouldRetryResult {
        if failure.category() != FailureCategory::Throttled {
            return ShouldRetryResult::NoRetry;
        }

        if self.attempt_count >= self.options.max_retry_attempts_on_throttled_requests {
            debug!(
                attempts = self.attempt_count,
                "throttling retry attempts exhausted"
            );
            return ShouldRetryResult::NoRetry;
        }

        let delay = failure
            .retry_after()
            .unwrap_or_else(|| self.options.delay_for_attempt(self.attempt_count + 1));

        let total = self.cumulative_wait + delay;
        if total > self.options.max_retry_wait_time {
            debug!(
                cumulative_ms = total.as_millis() as u64,
                max_ms = self.options.max_retry_wait_time.as_millis() as u64,
                "throttling wait budget exhausted"
            );
            return ShouldRetryResult::NoRetry;
        }

        self.attempt_count += 1;
        self.cumulative_wait = total;
        debug!(
            attempt = self.attempt_count,
            delay_ms = delay.as_millis() as u64,
            "retrying throttled request"
        );
        ShouldRetryResult::RetryAfter(delay)
    }

    /// Returns how many throttling retries were granted.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Returns the total wait granted so far.
    pub fn cumulative_wait(&self) -> Duration {
        self.cumulative_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_retry_after_is_used_verbatim() {
        let mut policy = ResourceThrottleRetryPolicy::new(RetryOptions::default());
        let failure = RequestFailure::throttled(Some(Duration::from_millis(250)));
        assert_eq!(
            policy.should_retry(&failure),
            ShouldRetryResult::RetryAfter(Duration::from_millis(250))
        );
    }

    #[test]
    fn computed_backoff_without_hint() {
        let mut policy = ResourceThrottleRetryPolicy::new(RetryOptions::default());
        let failure = RequestFailure::service_unavailable(None);
        assert_eq!(
            policy.should_retry(&failure),
            ShouldRetryResult::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            policy.should_retry(&failure),
            ShouldRetryResult::RetryAfter(Duration::from_millis(200))
        );
    }

    #[test]
    fn attempt_limit() {
        let mut policy = ResourceThrottleRetryPolicy::new(RetryOptions::new(2));
        let failure = RequestFailure::throttled(Some(Duration::from_millis(1)));
        assert!(policy.should_retry(&failure).is_retry());
        assert!(policy.should_retry(&failure).is_retry());
        assert_eq!(policy.should_retry(&failure), ShouldRetryResult::NoRetry);
        assert_eq!(policy.attempt_count(), 2);
    }

    #[test]
    fn cumulative_wait_limit() {
        let options = RetryOptions::default().with_max_retry_wait_time(Duration::from_secs(1));
        let mut policy = ResourceThrottleRetryPolicy::new(options);
        let failure = RequestFailure::throttled(Some(Duration::from_millis(600)));

        assert!(policy.should_retry(&failure).is_retry());
        assert_eq!(policy.should_retry(&failure), ShouldRetryResult::NoRetry);
        assert_eq!(policy.cumulative_wait(), Duration::from_millis(600));
    }

    #[test]
    fn no_retry_options() {
        let mut policy = ResourceThrottleRetryPolicy::new(RetryOptions::no_retry());
        let failure = RequestFailure::throttled(None);
        assert_eq!(policy.should_retry(&failure), ShouldRetryResult::NoRetry);
    }

    #[test]
    fn terminal_failures_are_not_retried() {
        let mut policy = ResourceThrottleRetryPolicy::new(RetryOptions::default());
        let failure = RequestFailure::status(409, 0, "conflict");
        assert_eq!(policy.should_retry(&failure), ShouldRetryResult::NoRetry);
    }
}
