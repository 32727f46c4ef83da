//! Client configuration.

use nimbus_codec::MAX_MESSAGE_SIZE;
use nimbus_routing::{ConnectionPolicy, RetryOptions};

/// Configuration for a [`RequestExecutor`](crate::RequestExecutor).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint discovery and multi-region settings.
    pub connection_policy: ConnectionPolicy,
    /// Throttling and pool-exhaustion retry settings.
    pub retry_options: RetryOptions,
    /// Upper bound on an encoded request.
    pub max_message_size: usize,
}

impl ClientConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            connection_policy: ConnectionPolicy::default(),
            retry_options: RetryOptions::default(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Sets the connection policy.
    pub fn with_connection_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.connection_policy = policy;
        self
    }

    /// Sets the retry options.
    pub fn with_retry_options(mut self, options: RetryOptions) -> Self {
        self.retry_options = options;
        self
    }

    /// Sets the maximum message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ClientConfig::new()
            .with_retry_options(RetryOptions::no_retry())
            .with_connection_policy(ConnectionPolicy::new().with_endpoint_discovery(false))
            .with_max_message_size(1024);

        assert_eq!(config.retry_options.max_retry_attempts_on_throttled_requests, 0);
        assert!(!config.connection_policy.enable_endpoint_discovery);
        assert_eq!(config.max_message_size, 1024);
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_message_size, MAX_MESSAGE_SIZE);
        assert!(config.connection_policy.enable_endpoint_discovery);
    }
}
