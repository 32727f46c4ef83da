//! # Nimbus Client
//!
//! Request execution for the Nimbus driver.
//!
//! A [`RequestExecutor`] runs one logical request as a series of attempts.
//! Each attempt is framed with a fresh activity id, routed by a per-request
//! [`ClientRetryPolicy`](nimbus_routing::ClientRetryPolicy) and handed to a
//! [`Transport`]. Failures go back to the policy, which decides whether to
//! wait and try again.
//!
//! [`CrossPartitionQuery`] fans an ORDER BY query out over partition key
//! ranges and merges the server-sorted pages into one ordered stream.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use nimbus_client::{CancellationFlag, ClientConfig, MockTransport, RequestExecutor};
//! use nimbus_codec::{OperationType, ResourceType};
//! use nimbus_routing::{AccountTopology, GlobalEndpointDirectory, ServiceRequest};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let config = ClientConfig::default();
//!     let directory = Arc::new(GlobalEndpointDirectory::new(
//!         "https://account.example",
//!         config.connection_policy.clone(),
//!         AccountTopology::new().with_write_location("East US", "https://east.example"),
//!     ));
//!     let transport = Arc::new(MockTransport::new());
//!     transport.push_ok("https://east.example", "{}");
//!
//!     let executor = RequestExecutor::new(directory, transport, config);
//!     let request = ServiceRequest::new(OperationType::Read, ResourceType::Document);
//!     let response = executor
//!         .execute(request, b"", &CancellationFlag::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(&response.body[..], b"{}");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod query;
mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use executor::{AttemptState, CancellationFlag, ExecutorStats, RequestExecutor, Response};
pub use query::{
    CrossPartitionQuery, ExecutorPageSource, OrderByItem, OrderByRow, PageSource, QueryPageBody,
};
pub use transport::{MockTransport, SentRequest, Transport};
