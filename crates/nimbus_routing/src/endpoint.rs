//! Regional endpoints and the directory that orders them.

use crate::error::RoutingResult;
use crate::request::ServiceRequest;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The address of one regional service endpoint.
///
/// Cloning is cheap; the URL is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Creates an endpoint from its URL.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(Arc::from(url.as_ref()))
    }

    /// Returns the URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(Arc::from(url))
    }
}

/// Process-wide view of the account's regional endpoints.
///
/// One directory is shared by every in-flight request. Implementations must
/// make updates atomic: a reader sees either the list before a change or the
/// list after it, never a mix.
pub trait EndpointDirectory: Send + Sync + 'static {
    /// Picks the endpoint for the request's next attempt, honouring any
    /// routing directive in its context.
    fn resolve_endpoint(&self, request: &ServiceRequest) -> RoutingResult<Endpoint>;

    /// Read endpoints in preference order, available ones first.
    fn read_endpoints(&self) -> Vec<Endpoint>;

    /// Write endpoints in preference order, available ones first.
    fn write_endpoints(&self) -> Vec<Endpoint>;

    /// Returns true if the request may be written to any write region.
    fn can_use_multiple_write_locations(&self, request: &ServiceRequest) -> bool;

    /// Demotes an endpoint for reads.
    fn mark_unavailable_for_read(&self, endpoint: &Endpoint);

    /// Demotes an endpoint for writes.
    fn mark_unavailable_for_write(&self, endpoint: &Endpoint);

    /// Re-reads the account topology.
    fn refresh(&self) -> impl Future<Output = RoutingResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_conversions() {
        let a = Endpoint::from("https://west.example");
        let b = Endpoint::from(String::from("https://west.example"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://west.example");
        assert_eq!(a.to_string(), "https://west.example");
    }
}
