//! # Nimbus Testkit
//!
//! Test utilities for the Nimbus driver.
//!
//! This crate provides:
//! - Account topologies and a scripted [`TestCluster`]
//! - Canned partition pages for cross-partition queries
//! - Property-based test generators using proptest
//! - Wire test vectors for the request envelope
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nimbus_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn failover() {
//!     let cluster = TestCluster::two_region();
//!     cluster.transport.push_failure(EAST_US, RequestFailure::write_forbidden());
//!     // ... execute through cluster.executor
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::scenarios::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
