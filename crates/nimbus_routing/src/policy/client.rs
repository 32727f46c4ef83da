//! The per-request retry and failover policy.

use super::{
    ConnectionPoolExhaustedRetry, ResourceThrottleRetryPolicy, RetryContext, RetryStatistics,
    ShouldRetryResult,
};
use crate::config::{
    ConnectionPolicy, RetryOptions, FAILOVER_RETRY_INTERVAL, MAX_FAILOVER_RETRY_COUNT,
};
use crate::endpoint::{Endpoint, EndpointDirectory};
use crate::error::{RoutingError, RoutingResult};
use crate::failure::{FailureCategory, RequestFailure};
use crate::request::ServiceRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-request retry and failover policy.
///
/// One instance serves exactly one logical request and is driven by the
/// attempt loop through `&mut self`: [`on_before_send`] before every attempt,
/// [`should_retry`] after every failed one. Only the [`EndpointDirectory`] is
/// shared with other requests.
///
/// Failures are evaluated in a fixed priority order:
///
/// 1. no endpoint was ever resolved: the request was not dispatched
/// 2. connection pool exhaustion: bounded retry on the same endpoint
/// 3. write forbidden (403/3): mark for write, refresh, fail over
/// 4. region not provisioned (403/1008), on a read-eligible request:
///    mark for read, refresh, fail over
/// 5. network failure: mark in the request's direction, refresh, fail over
/// 6. session token not available (404/1002): location-aware retry
/// 7. anything else: the throttling sub-policy
///
/// [`on_before_send`]: ClientRetryPolicy::on_before_send
/// [`should_retry`]: ClientRetryPolicy::should_retry
#[derive(Debug)]
pub struct ClientRetryPolicy<D: EndpointDirectory> {
    directory: Arc<D>,
    enable_endpoint_discovery: bool,
    throttling_retry: ResourceThrottleRetryPolicy,
    pool_exhausted_retry: ConnectionPoolExhaustedRetry,
    failover_retry_count: u32,
    session_token_retry_count: u32,
    is_read_request: bool,
    can_use_multiple_write_locations: bool,
    location_endpoint: Option<Endpoint>,
    retry_context: Option<RetryContext>,
    contacted_endpoints: Vec<Endpoint>,
}

impl<D: EndpointDirectory> ClientRetryPolicy<D> {
    /// Creates a policy for one logical request.
    pub fn new(
        directory: Arc<D>,
        connection_policy: &ConnectionPolicy,
        options: &RetryOptions,
    ) -> Self {
        Self {
            directory,
            enable_endpoint_discovery: connection_policy.enable_endpoint_discovery,
            throttling_retry: ResourceThrottleRetryPolicy::new(options.clone()),
            pool_exhausted_retry: ConnectionPoolExhaustedRetry::new(options),
            failover_retry_count: 0,
            session_token_retry_count: 0,
            is_read_request: false,
            can_use_multiple_write_locations: false,
            location_endpoint: None,
            retry_context: None,
            contacted_endpoints: Vec::new(),
        }
    }

    /// Binds the request to the endpoint its next attempt will target.
    ///
    /// Clears any earlier routing directive, re-applies the one computed by
    /// the last retry decision, resolves the endpoint and pins the request
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns the directory's error if no endpoint can be resolved; the
    /// previously bound endpoint, if any, is kept.
    pub fn on_before_send(&mut self, request: &mut ServiceRequest) -> RoutingResult<Endpoint> {
        self.is_read_request = request.is_read_only();
        self.can_use_multiple_write_locations =
            self.directory.can_use_multiple_write_locations(request);

        request.context.clear_route_to_location();
        if let Some(ctx) = self.retry_context {
            request
                .context
                .route_to_location_index(ctx.attempt_index, ctx.prefer_routed_locations);
        }

        let endpoint = self.directory.resolve_endpoint(request)?;
        request.context.route_to_location(endpoint.clone());

        debug!(
            endpoint = %endpoint,
            activity_id = %request.activity_id,
            is_read = self.is_read_request,
            "attempt bound to endpoint"
        );
        self.contacted_endpoints.push(endpoint.clone());
        self.location_endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Decides what to do about one failed attempt.
    ///
    /// May suspend while the endpoint directory refreshes. The refresh runs
    /// as its own task, so dropping this future leaves it to finish in the
    /// background.
    pub async fn should_retry(&mut self, failure: &RequestFailure) -> ShouldRetryResult {
        let Some(endpoint) = self.location_endpoint.clone() else {
            error!(failure = %failure, "retry evaluated for a request that was never dispatched");
            return ShouldRetryResult::Error(RoutingError::EndpointNotResolved);
        };

        let category = failure.category();
        if category == FailureCategory::ConnectionExhaustion {
            return self.pool_exhausted_retry.should_retry();
        }

        self.retry_context = None;

        match category {
            FailureCategory::WriteForbidden => {
                warn!(endpoint = %endpoint, "endpoint rejected write; failing over");
                self.should_retry_on_endpoint_failure(&endpoint, false)
                    .await
            }
            FailureCategory::ReadRegionNotProvisioned
                if self.is_read_request || self.can_use_multiple_write_locations =>
            {
                warn!(endpoint = %endpoint, "account not provisioned in region; failing over");
                self.should_retry_on_endpoint_failure(&endpoint, true)
                    .await
            }
            FailureCategory::Network => {
                warn!(
                    endpoint = %endpoint,
                    failure = %failure,
                    "endpoint unreachable; failing over"
                );
                self.should_retry_on_endpoint_failure(&endpoint, self.is_read_request)
                    .await
            }
            FailureCategory::SessionNotAvailable => self.should_retry_on_session_not_available(),
            _ => self.throttling_retry.should_retry(failure),
        }
    }

    /// Returns the endpoint bound by the last successful `on_before_send`.
    pub fn location_endpoint(&self) -> Option<&Endpoint> {
        self.location_endpoint.as_ref()
    }

    /// Returns the routing directive for the next attempt.
    pub fn retry_context(&self) -> Option<RetryContext> {
        self.retry_context
    }

    /// Returns the number of failovers so far.
    pub fn failover_retry_count(&self) -> u32 {
        self.failover_retry_count
    }

    /// Returns a snapshot of the policy's counters.
    pub fn statistics(&self) -> RetryStatistics {
        RetryStatistics {
            failover_retries: self.failover_retry_count,
            session_token_retries: self.session_token_retry_count,
            throttle_retries: self.throttling_retry.attempt_count(),
            pool_exhausted_retries: self.pool_exhausted_retry.retry_count(),
            contacted_endpoints: self.contacted_endpoints.clone(),
        }
    }

    async fn should_retry_on_endpoint_failure(
        &mut self,
        endpoint: &Endpoint,
        mark_for_read: bool,
    ) -> ShouldRetryResult {
        if !self.enable_endpoint_discovery || self.failover_retry_count >= MAX_FAILOVER_RETRY_COUNT
        {
            warn!(
                failover_retries = self.failover_retry_count,
                discovery = self.enable_endpoint_discovery,
                "not failing over"
            );
            return ShouldRetryResult::NoRetry;
        }

        self.failover_retry_count += 1;

        if mark_for_read {
            self.directory.mark_unavailable_for_read(endpoint);
        } else {
            self.directory.mark_unavailable_for_write(endpoint);
        }

        let delay = if self.failover_retry_count > 1 {
            FAILOVER_RETRY_INTERVAL
        } else {
            Duration::ZERO
        };

        self.retry_context = Some(RetryContext::new(self.failover_retry_count as usize, false));

        if let Err(err) = self.refresh_directory().await {
            error!(error = %err, "endpoint directory refresh failed");
            return ShouldRetryResult::Error(err);
        }

        debug!(
            failover_retries = self.failover_retry_count,
            delay_ms = delay.as_millis() as u64,
            "failing over to another endpoint"
        );
        ShouldRetryResult::RetryAfter(delay)
    }

    fn should_retry_on_session_not_available(&mut self) -> ShouldRetryResult {
        self.session_token_retry_count += 1;

        if !self.enable_endpoint_discovery {
            // Nowhere else to send it.
            return ShouldRetryResult::NoRetry;
        }

        let count = self.session_token_retry_count;
        if self.can_use_multiple_write_locations {
            let candidates = if self.is_read_request {
                self.directory.read_endpoints().len()
            } else {
                self.directory.write_endpoints().len()
            };

            if count as usize > candidates {
                debug!(
                    session_retries = count,
                    candidates, "session token retries exhausted"
                );
                return ShouldRetryResult::NoRetry;
            }

            self.retry_context = Some(RetryContext::new(count as usize - 1, count > 1));
        } else {
            if count > 1 {
                debug!(session_retries = count, "session token retry already used");
                return ShouldRetryResult::NoRetry;
            }

            // Go to the write region, which has every write.
            self.retry_context = Some(RetryContext::new(0, false));
        }

        debug!(session_retries = count, "retrying for session token");
        ShouldRetryResult::RetryAfter(Duration::ZERO)
    }

    async fn refresh_directory(&self) -> RoutingResult<()> {
        let directory = Arc::clone(&self.directory);
        let handle = tokio::spawn(async move { directory.refresh().await });
        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(RoutingError::RefreshFailed(join_error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AccountTopology, GlobalEndpointDirectory};
    use nimbus_codec::{OperationType, ResourceType};

    fn topology() -> AccountTopology {
        AccountTopology::new()
            .with_write_location("East US", "https://east.example")
            .with_write_location("West US", "https://west.example")
            .with_write_location("North EU", "https://north.example")
            .with_read_location("East US", "https://east.example")
            .with_read_location("West US", "https://west.example")
            .with_read_location("North EU", "https://north.example")
    }

    fn setup(
        connection_policy: ConnectionPolicy,
        topology: AccountTopology,
    ) -> (Arc<GlobalEndpointDirectory>, ClientRetryPolicy<GlobalEndpointDirectory>) {
        let directory = Arc::new(GlobalEndpointDirectory::new(
            "https://global.example",
            connection_policy.clone(),
            topology,
        ));
        let policy = ClientRetryPolicy::new(
            Arc::clone(&directory),
            &connection_policy,
            &RetryOptions::default(),
        );
        (directory, policy)
    }

    fn read_request() -> ServiceRequest {
        ServiceRequest::new(OperationType::Read, ResourceType::Document)
    }

    fn write_request() -> ServiceRequest {
        ServiceRequest::new(OperationType::Create, ResourceType::Document)
    }

    #[tokio::test]
    async fn undispatched_request_is_an_error() {
        let (_, mut policy) = setup(ConnectionPolicy::new(), topology());
        let result = policy.should_retry(&RequestFailure::network("down")).await;
        assert_eq!(
            result,
            ShouldRetryResult::Error(RoutingError::EndpointNotResolved)
        );
    }

    #[tokio::test]
    async fn pool_exhaustion_keeps_endpoint() {
        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        let first = policy.on_before_send(&mut request).unwrap();

        let result = policy
            .should_retry(&RequestFailure::pool_exhausted("busy"))
            .await;
        assert_eq!(result, ShouldRetryResult::RetryAfter(Duration::from_millis(10)));

        let second = policy.on_before_send(&mut request).unwrap();
        assert_eq!(first, second);
        assert_eq!(directory.refresh_count(), 0);
    }

    #[tokio::test]
    async fn failover_is_bounded_at_120() {
        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        let failure = RequestFailure::network("connection refused");

        for decision in 1..=120u32 {
            policy.on_before_send(&mut request).unwrap();
            let result = policy.should_retry(&failure).await;
            let expected = if decision == 1 {
                Duration::ZERO
            } else {
                FAILOVER_RETRY_INTERVAL
            };
            assert_eq!(result, ShouldRetryResult::RetryAfter(expected), "decision {decision}");
        }

        policy.on_before_send(&mut request).unwrap();
        assert_eq!(policy.should_retry(&failure).await, ShouldRetryResult::NoRetry);
        assert_eq!(policy.failover_retry_count(), 120);
        assert_eq!(directory.refresh_count(), 120);
    }

    #[tokio::test]
    async fn network_failure_marks_in_request_direction() {
        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        let endpoint = policy.on_before_send(&mut request).unwrap();

        policy.should_retry(&RequestFailure::network("reset")).await;
        assert!(directory.is_unavailable_for_read(&endpoint));
        assert!(!directory.is_unavailable_for_write(&endpoint));

        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = write_request();
        let endpoint = policy.on_before_send(&mut request).unwrap();

        policy.should_retry(&RequestFailure::network("reset")).await;
        assert!(directory.is_unavailable_for_write(&endpoint));
        assert!(!directory.is_unavailable_for_read(&endpoint));
    }

    #[tokio::test]
    async fn write_forbidden_fails_over_to_new_write_region() {
        let (directory, mut policy) = setup(
            ConnectionPolicy::new(),
            AccountTopology::new().with_write_location("East US", "https://east.example"),
        );
        let mut request = write_request();
        let first = policy.on_before_send(&mut request).unwrap();
        assert_eq!(first.as_str(), "https://east.example");

        // The region was demoted; the service now reports West US as the
        // write region.
        directory.stage_topology(
            AccountTopology::new()
                .with_write_location("West US", "https://west.example")
                .with_write_location("East US", "https://east.example"),
        );

        let result = policy.should_retry(&RequestFailure::write_forbidden()).await;
        assert_eq!(result, ShouldRetryResult::RetryAfter(Duration::ZERO));
        assert!(directory.is_unavailable_for_write(&first));
        assert_eq!(directory.refresh_count(), 1);

        // Retry context (1, false) flips to the second write region.
        let second = policy.on_before_send(&mut request).unwrap();
        assert_eq!(second.as_str(), "https://east.example");

        let result = policy.should_retry(&RequestFailure::write_forbidden()).await;
        assert_eq!(result, ShouldRetryResult::RetryAfter(FAILOVER_RETRY_INTERVAL));
        let third = policy.on_before_send(&mut request).unwrap();
        assert_eq!(third.as_str(), "https://west.example");
    }

    #[tokio::test]
    async fn region_not_provisioned_only_fails_over_read_eligible_requests() {
        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        let endpoint = policy.on_before_send(&mut request).unwrap();
        let result = policy
            .should_retry(&RequestFailure::read_region_not_provisioned())
            .await;
        assert!(result.is_retry());
        assert!(directory.is_unavailable_for_read(&endpoint));

        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = write_request();
        let endpoint = policy.on_before_send(&mut request).unwrap();
        let result = policy
            .should_retry(&RequestFailure::read_region_not_provisioned())
            .await;
        assert_eq!(result, ShouldRetryResult::NoRetry);
        assert!(!directory.is_unavailable_for_read(&endpoint));
        assert_eq!(directory.refresh_count(), 0);
    }

    #[tokio::test]
    async fn discovery_disabled_never_fails_over() {
        let (_, mut policy) = setup(
            ConnectionPolicy::new().with_endpoint_discovery(false),
            topology(),
        );
        let mut request = read_request();
        policy.on_before_send(&mut request).unwrap();

        assert_eq!(
            policy.should_retry(&RequestFailure::network("down")).await,
            ShouldRetryResult::NoRetry
        );
        assert_eq!(
            policy
                .should_retry(&RequestFailure::session_not_available())
                .await,
            ShouldRetryResult::NoRetry
        );
    }

    #[tokio::test]
    async fn single_write_session_retry_is_used_once() {
        let (_, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        let failure = RequestFailure::session_not_available();

        policy.on_before_send(&mut request).unwrap();
        assert_eq!(
            policy.should_retry(&failure).await,
            ShouldRetryResult::RetryAfter(Duration::ZERO)
        );
        assert_eq!(policy.retry_context(), Some(RetryContext::new(0, false)));

        let endpoint = policy.on_before_send(&mut request).unwrap();
        assert_eq!(endpoint.as_str(), "https://east.example");
        assert_eq!(policy.should_retry(&failure).await, ShouldRetryResult::NoRetry);
    }

    #[tokio::test]
    async fn multi_write_session_retries_walk_every_endpoint() {
        let (_, mut policy) = setup(
            ConnectionPolicy::new()
                .with_multiple_write_locations(true)
                .with_preferred_locations(["West US", "North EU", "East US"]),
            topology().with_multiple_write_locations(true),
        );
        let mut request = write_request();
        let failure = RequestFailure::session_not_available();

        let first = policy.on_before_send(&mut request).unwrap();
        assert_eq!(first.as_str(), "https://west.example");

        let mut routed = Vec::new();
        for _ in 0..3 {
            assert_eq!(
                policy.should_retry(&failure).await,
                ShouldRetryResult::RetryAfter(Duration::ZERO)
            );
            routed.push(policy.on_before_send(&mut request).unwrap());
        }

        // The 4th retry exceeds the three candidate write endpoints.
        assert_eq!(policy.should_retry(&failure).await, ShouldRetryResult::NoRetry);

        let routed: Vec<&str> = routed.iter().map(Endpoint::as_str).collect();
        assert_eq!(
            routed,
            vec![
                // (0, false): first write region in account order
                "https://east.example",
                // (1, true), (2, true): preferred-ordered write list
                "https://north.example",
                "https://east.example",
            ]
        );
        assert_eq!(policy.statistics().session_token_retries, 4);
    }

    #[tokio::test]
    async fn throttling_honours_retry_after() {
        let (_, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        policy.on_before_send(&mut request).unwrap();

        let failure = RequestFailure::from_response(
            429,
            0,
            [("x-ms-retry-after-ms", "250")],
            "request rate is large",
        );
        assert_eq!(
            policy.should_retry(&failure).await,
            ShouldRetryResult::RetryAfter(Duration::from_millis(250))
        );
        assert_eq!(policy.statistics().throttle_retries, 1);
    }

    #[tokio::test]
    async fn terminal_failures_surface() {
        let (directory, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = write_request();
        policy.on_before_send(&mut request).unwrap();

        let failure = RequestFailure::status(409, 0, "conflict");
        assert_eq!(policy.should_retry(&failure).await, ShouldRetryResult::NoRetry);
        assert_eq!(directory.refresh_count(), 0);
    }

    #[tokio::test]
    async fn retry_context_is_cleared_by_non_routing_decisions() {
        let (_, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = read_request();
        policy.on_before_send(&mut request).unwrap();

        policy.should_retry(&RequestFailure::network("down")).await;
        assert!(policy.retry_context().is_some());

        policy.on_before_send(&mut request).unwrap();
        policy.should_retry(&RequestFailure::throttled(None)).await;
        assert_eq!(policy.retry_context(), None);
    }

    /// Delegates to a [`GlobalEndpointDirectory`], but takes a while to refresh.
    struct SlowRefreshDirectory {
        inner: GlobalEndpointDirectory,
        refresh_delay: Duration,
    }

    impl EndpointDirectory for SlowRefreshDirectory {
        fn resolve_endpoint(&self, request: &ServiceRequest) -> RoutingResult<Endpoint> {
            self.inner.resolve_endpoint(request)
        }

        fn read_endpoints(&self) -> Vec<Endpoint> {
            self.inner.read_endpoints()
        }

        fn write_endpoints(&self) -> Vec<Endpoint> {
            self.inner.write_endpoints()
        }

        fn can_use_multiple_write_locations(&self, request: &ServiceRequest) -> bool {
            self.inner.can_use_multiple_write_locations(request)
        }

        fn mark_unavailable_for_read(&self, endpoint: &Endpoint) {
            self.inner.mark_unavailable_for_read(endpoint)
        }

        fn mark_unavailable_for_write(&self, endpoint: &Endpoint) {
            self.inner.mark_unavailable_for_write(endpoint)
        }

        async fn refresh(&self) -> RoutingResult<()> {
            tokio::time::sleep(self.refresh_delay).await;
            self.inner.refresh().await
        }
    }

    #[tokio::test]
    async fn dropped_decision_lets_refresh_finish() {
        let connection_policy = ConnectionPolicy::new();
        let directory = Arc::new(SlowRefreshDirectory {
            inner: GlobalEndpointDirectory::new(
                "https://global.example",
                connection_policy.clone(),
                topology(),
            ),
            refresh_delay: Duration::from_millis(50),
        });
        let mut policy = ClientRetryPolicy::new(
            Arc::clone(&directory),
            &connection_policy,
            &RetryOptions::default(),
        );
        let mut request = write_request();
        policy.on_before_send(&mut request).unwrap();

        let failure = RequestFailure::write_forbidden();
        let decision =
            tokio::time::timeout(Duration::from_millis(5), policy.should_retry(&failure)).await;
        assert!(decision.is_err());
        assert_eq!(directory.inner.refresh_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(directory.inner.refresh_count(), 1);
    }

    #[tokio::test]
    async fn statistics_record_contacted_endpoints() {
        let (_, mut policy) = setup(ConnectionPolicy::new(), topology());
        let mut request = write_request();

        policy.on_before_send(&mut request).unwrap();
        policy.should_retry(&RequestFailure::write_forbidden()).await;
        policy.on_before_send(&mut request).unwrap();

        let stats = policy.statistics();
        assert_eq!(stats.failover_retries, 1);
        assert_eq!(
            stats
                .contacted_endpoints
                .iter()
                .map(Endpoint::as_str)
                .collect::<Vec<_>>(),
            vec!["https://east.example", "https://west.example"]
        );
    }
}
