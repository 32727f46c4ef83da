//! The request model seen by routing.

use crate::endpoint::Endpoint;
use nimbus_codec::{OperationType, ResourceType};
use uuid::Uuid;

/// A routing directive by position in the directory's ordered lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRoute {
    /// Position in the candidate list (taken modulo its length).
    pub index: usize,
    /// Route within the preferred-ordered list. When false, writes flip
    /// between the account's first two write regions.
    pub use_preferred_locations: bool,
}

/// Per-request routing state, reset before every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    route: Option<LocationRoute>,
    location_endpoint: Option<Endpoint>,
}

impl RequestContext {
    /// Clears every routing directive.
    pub fn clear_route_to_location(&mut self) {
        self.route = None;
        self.location_endpoint = None;
    }

    /// Routes the next attempt by position.
    pub fn route_to_location_index(&mut self, index: usize, use_preferred_locations: bool) {
        self.route = Some(LocationRoute {
            index,
            use_preferred_locations,
        });
        self.location_endpoint = None;
    }

    /// Pins the attempt to an already resolved endpoint.
    pub fn route_to_location(&mut self, endpoint: Endpoint) {
        self.location_endpoint = Some(endpoint);
        self.route = None;
    }

    /// Returns the positional directive, if any.
    pub fn route(&self) -> Option<LocationRoute> {
        self.route
    }

    /// Returns the pinned endpoint, if any.
    pub fn location_endpoint(&self) -> Option<&Endpoint> {
        self.location_endpoint.as_ref()
    }
}

/// One logical request as seen by the routing layer.
///
/// The body is not part of this type; the executor owns it and frames it
/// for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    /// What the request does.
    pub operation_type: OperationType,
    /// What the request targets.
    pub resource_type: ResourceType,
    /// Correlation id of the current attempt.
    pub activity_id: Uuid,
    /// Routing directives.
    pub context: RequestContext,
}

impl ServiceRequest {
    /// Creates a request with a fresh activity id.
    pub fn new(operation_type: OperationType, resource_type: ResourceType) -> Self {
        Self {
            operation_type,
            resource_type,
            activity_id: Uuid::new_v4(),
            context: RequestContext::default(),
        }
    }

    /// Returns true if the request only reads.
    pub fn is_read_only(&self) -> bool {
        self.operation_type.is_read_only()
    }

    /// Returns true if the request modifies state.
    pub fn is_write(&self) -> bool {
        !self.is_read_only()
    }

    /// Assigns a new activity id for the next attempt.
    pub fn renew_activity_id(&mut self) -> Uuid {
        self.activity_id = Uuid::new_v4();
        self.activity_id
    }
}
