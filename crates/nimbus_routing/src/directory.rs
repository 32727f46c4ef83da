//! Reference endpoint directory.
//!
//! [`GlobalEndpointDirectory`] keeps the account topology together with the
//! endpoints currently marked unavailable, and derives from them the ordered
//! read and write lists. All of that lives in one immutable snapshot behind
//! an `Arc`; every change builds a new snapshot and swaps it in under a write
//! lock, so readers only ever clone the `Arc`.

use crate::config::ConnectionPolicy;
use crate::endpoint::{Endpoint, EndpointDirectory};
use crate::error::{RoutingError, RoutingResult};
use crate::request::ServiceRequest;
use nimbus_codec::{OperationType, ResourceType};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An endpoint together with the region it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalEndpoint {
    /// Region name, e.g. "West US".
    pub region: String,
    /// Service endpoint for the region.
    pub endpoint: Endpoint,
}

impl RegionalEndpoint {
    /// Creates a regional endpoint.
    pub fn new(region: impl Into<String>, endpoint: impl Into<Endpoint>) -> Self {
        Self {
            region: region.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// The regions an account is replicated to, as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountTopology {
    /// Writable regions, in the account's failover priority order.
    pub write_locations: Vec<RegionalEndpoint>,
    /// Readable regions.
    pub read_locations: Vec<RegionalEndpoint>,
    /// Whether the account accepts writes in every write region.
    pub enable_multiple_write_locations: bool,
}

impl AccountTopology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a write region.
    pub fn with_write_location(
        mut self,
        region: impl Into<String>,
        endpoint: impl Into<Endpoint>,
    ) -> Self {
        self.write_locations
            .push(RegionalEndpoint::new(region, endpoint));
        self
    }

    /// Adds a read region.
    pub fn with_read_location(
        mut self,
        region: impl Into<String>,
        endpoint: impl Into<Endpoint>,
    ) -> Self {
        self.read_locations
            .push(RegionalEndpoint::new(region, endpoint));
        self
    }

    /// Sets whether the account is multi-master.
    pub fn with_multiple_write_locations(mut self, enabled: bool) -> Self {
        self.enable_multiple_write_locations = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UnavailabilityMark {
    read: Option<Instant>,
    write: Option<Instant>,
}

impl UnavailabilityMark {
    fn expire(&mut self, now: Instant, ttl: Duration) {
        let live = |since: Option<Instant>| since.filter(|t| now.duration_since(*t) < ttl);
        self.read = live(self.read);
        self.write = live(self.write);
    }

    fn is_empty(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    topology: AccountTopology,
    unavailable: HashMap<Endpoint, UnavailabilityMark>,
    read_endpoints: Vec<Endpoint>,
    write_endpoints: Vec<Endpoint>,
}

/// Thread-safe directory over an account topology.
///
/// Ordered lists put preferred regions first (in the order the connection
/// policy lists them), then the remaining account regions. Endpoints marked
/// unavailable keep their relative order but move behind every available
/// one. A mark lasts for the policy's `unavailability_ttl`; expired marks
/// are dropped on the next [`refresh`](EndpointDirectory::refresh).
#[derive(Debug)]
pub struct GlobalEndpointDirectory {
    default_endpoint: Endpoint,
    policy: ConnectionPolicy,
    snapshot: RwLock<Arc<Snapshot>>,
    staged: Mutex<Option<AccountTopology>>,
    refresh_count: AtomicU64,
}

impl GlobalEndpointDirectory {
    /// Creates a directory. `default_endpoint` is used whenever discovery is
    /// disabled or the topology offers nothing.
    pub fn new(
        default_endpoint: impl Into<Endpoint>,
        policy: ConnectionPolicy,
        topology: AccountTopology,
    ) -> Self {
        let directory = Self {
            default_endpoint: default_endpoint.into(),
            policy,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            staged: Mutex::new(None),
            refresh_count: AtomicU64::new(0),
        };
        directory.update(|snapshot| snapshot.topology = topology);
        directory
    }

    /// Returns the fallback endpoint.
    pub fn default_endpoint(&self) -> &Endpoint {
        &self.default_endpoint
    }

    /// Returns the connection policy.
    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// Returns the current topology.
    pub fn topology(&self) -> AccountTopology {
        self.current().topology.clone()
    }

    /// Queues a topology to be applied by the next refresh.
    pub fn stage_topology(&self, topology: AccountTopology) {
        *self.staged.lock() = Some(topology);
    }

    /// Returns how many refreshes have completed.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Returns true if the endpoint carries a live read mark.
    pub fn is_unavailable_for_read(&self, endpoint: &Endpoint) -> bool {
        self.is_marked(endpoint, true)
    }

    /// Returns true if the endpoint carries a live write mark.
    pub fn is_unavailable_for_write(&self, endpoint: &Endpoint) -> bool {
        self.is_marked(endpoint, false)
    }

    fn is_marked(&self, endpoint: &Endpoint, read: bool) -> bool {
        let snapshot = self.current();
        let now = Instant::now();
        snapshot.unavailable.get(endpoint).is_some_and(|mark| {
            let since = if read { mark.read } else { mark.write };
            since.is_some_and(|t| now.duration_since(t) < self.policy.unavailability_ttl)
        })
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Applies `change` to a copy of the snapshot, recomputes the ordered
    /// lists and publishes the copy.
    fn update(&self, change: impl FnOnce(&mut Snapshot)) {
        let mut guard = self.snapshot.write();
        let mut next = Snapshot::clone(&guard);
        change(&mut next);

        let now = Instant::now();
        let read_source = if next.topology.read_locations.is_empty() {
            &next.topology.write_locations
        } else {
            &next.topology.read_locations
        };
        next.read_endpoints = self.ordered(read_source, &next.unavailable, now, true);
        next.write_endpoints =
            self.ordered(&next.topology.write_locations, &next.unavailable, now, false);

        *guard = Arc::new(next);
    }

    fn ordered(
        &self,
        locations: &[RegionalEndpoint],
        unavailable: &HashMap<Endpoint, UnavailabilityMark>,
        now: Instant,
        read: bool,
    ) -> Vec<Endpoint> {
        if !self.policy.enable_endpoint_discovery || locations.is_empty() {
            return vec![self.default_endpoint.clone()];
        }

        let mut candidates: Vec<&RegionalEndpoint> = self
            .policy
            .preferred_locations
            .iter()
            .filter_map(|region| locations.iter().find(|l| &l.region == region))
            .collect();
        for location in locations {
            if !candidates.iter().any(|c| c.region == location.region) {
                candidates.push(location);
            }
        }

        let ttl = self.policy.unavailability_ttl;
        let is_marked = |endpoint: &Endpoint| {
            unavailable.get(endpoint).is_some_and(|mark| {
                let since = if read { mark.read } else { mark.write };
                since.is_some_and(|t| now.duration_since(t) < ttl)
            })
        };

        let (mut available, demoted): (Vec<Endpoint>, Vec<Endpoint>) = candidates
            .into_iter()
            .map(|c| c.endpoint.clone())
            .partition(|endpoint| !is_marked(endpoint));
        available.extend(demoted);
        available
    }

    fn supports_multiple_writes(&self, snapshot: &Snapshot, request: &ServiceRequest) -> bool {
        self.policy.use_multiple_write_locations
            && snapshot.topology.enable_multiple_write_locations
            && (request.resource_type == ResourceType::Document
                || (request.resource_type == ResourceType::StoredProcedure
                    && request.operation_type == OperationType::ExecuteJavaScript))
    }
}

impl EndpointDirectory for GlobalEndpointDirectory {
    fn resolve_endpoint(&self, request: &ServiceRequest) -> RoutingResult<Endpoint> {
        if let Some(endpoint) = request.context.location_endpoint() {
            return Ok(endpoint.clone());
        }

        let snapshot = self.current();
        let route = request.context.route();
        let index = route.map_or(0, |r| r.index);
        let use_preferred = route.map_or(true, |r| r.use_preferred_locations);

        if !use_preferred
            || (request.is_write() && !self.supports_multiple_writes(&snapshot, request))
        {
            // Single write region, or failing over: flip between the first
            // two write regions in account order.
            let writes = &snapshot.topology.write_locations;
            if self.policy.enable_endpoint_discovery && !writes.is_empty() {
                let position = (index % 2).min(writes.len() - 1);
                return Ok(writes[position].endpoint.clone());
            }
            return Ok(self.default_endpoint.clone());
        }

        let (endpoints, direction) = if request.is_write() {
            (&snapshot.write_endpoints, "write")
        } else {
            (&snapshot.read_endpoints, "read")
        };
        if endpoints.is_empty() {
            return Err(RoutingError::NoEndpointAvailable { direction });
        }
        Ok(endpoints[index % endpoints.len()].clone())
    }

    fn read_endpoints(&self) -> Vec<Endpoint> {
        self.current().read_endpoints.clone()
    }

    fn write_endpoints(&self) -> Vec<Endpoint> {
        self.current().write_endpoints.clone()
    }

    fn can_use_multiple_write_locations(&self, request: &ServiceRequest) -> bool {
        self.supports_multiple_writes(&self.current(), request)
    }

    fn mark_unavailable_for_read(&self, endpoint: &Endpoint) {
        warn!(endpoint = %endpoint, "marking endpoint unavailable for read");
        let now = Instant::now();
        self.update(|snapshot| {
            snapshot.unavailable.entry(endpoint.clone()).or_default().read = Some(now);
        });
    }

    fn mark_unavailable_for_write(&self, endpoint: &Endpoint) {
        warn!(endpoint = %endpoint, "marking endpoint unavailable for write");
        let now = Instant::now();
        self.update(|snapshot| {
            snapshot.unavailable.entry(endpoint.clone()).or_default().write = Some(now);
        });
    }

    async fn refresh(&self) -> RoutingResult<()> {
        let staged = self.staged.lock().take();
        let now = Instant::now();
        let ttl = self.policy.unavailability_ttl;

        self.update(|snapshot| {
            if let Some(topology) = staged {
                snapshot.topology = topology;
            }
            snapshot.unavailable.retain(|_, mark| {
                mark.expire(now, ttl);
                !mark.is_empty()
            });
        });

        let count = self.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(refresh_count = count, "endpoint directory refreshed");
        Ok(())
    }
}
