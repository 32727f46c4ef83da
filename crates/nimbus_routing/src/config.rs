//! Configuration for routing and retries.

use rand::Rng;
use std::time::Duration;

/// Maximum number of endpoint failovers for one logical request.
pub const MAX_FAILOVER_RETRY_COUNT: u32 = 120;

/// Wait between failover attempts after the first one.
pub const FAILOVER_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries on throttled (429/503) responses.
    pub max_retry_attempts_on_throttled_requests: u32,
    /// Maximum cumulative wait across throttling retries.
    pub max_retry_wait_time: Duration,
    /// Initial delay when the server gives no retry-after hint.
    pub initial_backoff: Duration,
    /// Maximum delay between throttling retries.
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to computed delays.
    pub add_jitter: bool,
    /// Maximum retries when the connection pool is exhausted.
    pub max_connection_pool_retries: u32,
    /// Wait between connection pool retries.
    pub connection_pool_retry_interval: Duration,
}

impl RetryOptions {
    /// Creates retry options with the given throttling attempt limit.
    pub fn new(max_retry_attempts_on_throttled_requests: u32) -> Self {
        Self {
            max_retry_attempts_on_throttled_requests,
            max_retry_wait_time: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: false,
            max_connection_pool_retries: 10,
            connection_pool_retry_interval: Duration::from_millis(10),
        }
    }

    /// Creates options that never retry throttled requests.
    pub fn no_retry() -> Self {
        Self {
            max_retry_attempts_on_throttled_requests: 0,
            max_retry_wait_time: Duration::ZERO,
            ..Self::new(0)
        }
    }

    /// Sets the maximum cumulative throttling wait.
    pub fn with_max_retry_wait_time(mut self, wait: Duration) -> Self {
        self.max_retry_wait_time = wait;
        self
    }

    /// Sets the initial backoff.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Sets the maximum backoff.
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Sets the connection pool retry limit.
    pub fn with_max_connection_pool_retries(mut self, retries: u32) -> Self {
        self.max_connection_pool_retries = retries;
        self
    }

    /// Calculates the default delay for a given retry (1-based; 0 means the
    /// first attempt and has no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_backoff.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);

        let delay_secs = base_delay.min(self.max_backoff.as_secs_f64());

        if self.add_jitter {
            // Up to 25% extra
            let jitter = delay_secs * rand::thread_rng().gen_range(0.0..0.25);
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new(9)
    }
}

/// How the driver discovers and uses regional endpoints.
#[derive(Debug, Clone)]
pub struct ConnectionPolicy {
    /// Whether to follow the account's regional topology. When disabled,
    /// every request goes to the default endpoint and failovers are not
    /// attempted.
    pub enable_endpoint_discovery: bool,
    /// Whether writes may go to any write region of a multi-master account.
    pub use_multiple_write_locations: bool,
    /// Region names in order of preference.
    pub preferred_locations: Vec<String>,
    /// How long an endpoint stays marked unavailable.
    pub unavailability_ttl: Duration,
}

impl ConnectionPolicy {
    /// Creates the default connection policy.
    pub fn new() -> Self {
        Self {
            enable_endpoint_discovery: true,
            use_multiple_write_locations: false,
            preferred_locations: Vec::new(),
            unavailability_ttl: Duration::from_secs(5 * 60),
        }
    }

    /// Enables or disables endpoint discovery.
    pub fn with_endpoint_discovery(mut self, enabled: bool) -> Self {
        self.enable_endpoint_discovery = enabled;
        self
    }

    /// Enables or disables multi-region writes.
    pub fn with_multiple_write_locations(mut self, enabled: bool) -> Self {
        self.use_multiple_write_locations = enabled;
        self
    }

    /// Sets the preferred regions.
    pub fn with_preferred_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how long unavailability marks last.
    pub fn with_unavailability_ttl(mut self, ttl: Duration) -> Self {
        self.unavailability_ttl = ttl;
        self
    }
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}
