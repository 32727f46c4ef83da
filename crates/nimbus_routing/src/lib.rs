//! # Nimbus Routing
//!
//! Endpoint routing and the retry/failover policy for the Nimbus driver.
//!
//! Every logical request gets its own [`ClientRetryPolicy`]. Before each
//! attempt the policy asks the shared [`EndpointDirectory`] where to send it;
//! after each failed attempt it classifies the [`RequestFailure`] and answers
//! with a [`ShouldRetryResult`]:
//!
//! - regional failures (read-only region, region not provisioned, network)
//!   demote the endpoint, refresh the directory and fail over, at most 120
//!   times per request
//! - session-token misses retry on another location
//! - throttling backs off, preferring the server's retry-after hint
//! - connection pool exhaustion retries in place
//! - everything else is surfaced unchanged
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use nimbus_codec::{OperationType, ResourceType};
//! use nimbus_routing::{
//!     AccountTopology, ClientRetryPolicy, ConnectionPolicy, GlobalEndpointDirectory,
//!     RequestFailure, RetryOptions, ServiceRequest, ShouldRetryResult,
//! };
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let connection_policy = ConnectionPolicy::new();
//!     let directory = Arc::new(GlobalEndpointDirectory::new(
//!         "https://account.example",
//!         connection_policy.clone(),
//!         AccountTopology::new().with_write_location("East US", "https://east.example"),
//!     ));
//!
//!     let mut policy =
//!         ClientRetryPolicy::new(directory, &connection_policy, &RetryOptions::default());
//!     let mut request = ServiceRequest::new(OperationType::Read, ResourceType::Document);
//!     policy.on_before_send(&mut request).unwrap();
//!
//!     let decision = policy.should_retry(&RequestFailure::throttled(None)).await;
//!     assert!(matches!(decision, ShouldRetryResult::RetryAfter(_)));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod directory;
mod endpoint;
mod error;
mod failure;
mod policy;
mod request;

pub use config::{ConnectionPolicy, RetryOptions, FAILOVER_RETRY_INTERVAL, MAX_FAILOVER_RETRY_COUNT};
pub use directory::{AccountTopology, GlobalEndpointDirectory, RegionalEndpoint};
pub use endpoint::{Endpoint, EndpointDirectory};
pub use error::{RoutingError, RoutingResult};
pub use failure::{
    status_codes, sub_status_codes, FailureCategory, RequestFailure, LEGACY_RETRY_AFTER_MS_HEADER,
    RETRY_AFTER_MS_HEADER,
};
pub use policy::{
    ClientRetryPolicy, ConnectionPoolExhaustedRetry, ResourceThrottleRetryPolicy, RetryContext,
    RetryStatistics, ShouldRetryResult,
};
pub use request::{LocationRoute, RequestContext, ServiceRequest};
