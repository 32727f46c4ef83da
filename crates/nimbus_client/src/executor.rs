//! Retry-wrapped request execution.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;
use bytes::Bytes;
use nimbus_codec::{encode_message, RequestFrame};
use nimbus_routing::{
    ClientRetryPolicy, Endpoint, EndpointDirectory, RetryStatistics, ServiceRequest,
    ShouldRetryResult,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Nothing sent yet.
    Idle,
    /// An attempt is in flight.
    AttemptSent,
    /// The last attempt failed; the policy is deciding.
    EvaluatingFailure,
    /// Waiting before the next attempt.
    Retrying,
    /// An attempt succeeded.
    Succeeded,
    /// The request failed for good.
    Failed,
}

impl AttemptState {
    /// Returns true once the request has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::Failed)
    }
}

/// Cooperative cancellation for one or more logical requests.
///
/// Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> ClientResult<()> {
        if self.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Counters across every request run by one executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Logical requests started.
    pub requests: u64,
    /// Attempts sent.
    pub attempts: u64,
    /// Retries granted by the policy.
    pub retries: u64,
    /// Logical requests that failed, including cancellations.
    pub failures: u64,
}

/// The successful outcome of a logical request.
#[derive(Debug, Clone)]
pub struct Response {
    /// Response body of the successful attempt.
    pub body: Bytes,
    /// Activity id of the successful attempt.
    pub activity_id: Uuid,
    /// Endpoint that answered.
    pub endpoint: Endpoint,
    /// Number of attempts sent, including the successful one.
    pub attempts: u32,
    /// The retry policy's counters.
    pub retry_statistics: RetryStatistics,
}

/// Runs logical requests through the retry policy and the transport.
///
/// Attempts of one request are strictly sequential. Each attempt gets a
/// fresh activity id and is framed anew.
#[derive(Debug)]
pub struct RequestExecutor<D: EndpointDirectory, T: Transport> {
    directory: Arc<D>,
    transport: Arc<T>,
    config: ClientConfig,
    stats: RwLock<ExecutorStats>,
}

impl<D: EndpointDirectory, T: Transport> RequestExecutor<D, T> {
    /// Creates an executor.
    pub fn new(directory: Arc<D>, transport: Arc<T>, config: ClientConfig) -> Self {
        Self {
            directory,
            transport,
            config,
            stats: RwLock::new(ExecutorStats::default()),
        }
    }

    /// Returns the endpoint directory.
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.read().clone()
    }

    /// Executes one logical request.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Request`] with the last attempt's failure when the
    ///   policy declines to retry
    /// - [`ClientError::Routing`] when the policy itself fails
    /// - [`ClientError::Codec`] when the request cannot be framed
    /// - [`ClientError::Cancelled`] when `cancel` is set before an attempt
    ///   or after a wait
    pub async fn execute(
        &self,
        mut request: ServiceRequest,
        payload: &[u8],
        cancel: &CancellationFlag,
    ) -> ClientResult<Response> {
        self.stats.write().requests += 1;
        let mut policy = ClientRetryPolicy::new(
            Arc::clone(&self.directory),
            &self.config.connection_policy,
            &self.config.retry_options,
        );
        let mut state = AttemptState::Idle;

        let result = self
            .run_attempts(&mut request, payload, cancel, &mut policy, &mut state)
            .await;

        if result.is_err() {
            self.transition(&mut state, AttemptState::Failed, &request);
            self.stats.write().failures += 1;
        }
        result
    }

    async fn run_attempts(
        &self,
        request: &mut ServiceRequest,
        payload: &[u8],
        cancel: &CancellationFlag,
        policy: &mut ClientRetryPolicy<D>,
        state: &mut AttemptState,
    ) -> ClientResult<Response> {
        let mut attempts = 0u32;

        loop {
            cancel.check()?;

            let activity_id = request.renew_activity_id();
            let endpoint = policy.on_before_send(request)?;
            let frame =
                RequestFrame::new(activity_id, request.operation_type, request.resource_type)?;
            let message = encode_message(&frame, payload, self.config.max_message_size)?;

            attempts += 1;
            self.stats.write().attempts += 1;
            self.transition(state, AttemptState::AttemptSent, request);

            let failure = match self.transport.send(&endpoint, message).await {
                Ok(body) => {
                    self.transition(state, AttemptState::Succeeded, request);
                    return Ok(Response {
                        body,
                        activity_id,
                        endpoint,
                        attempts,
                        retry_statistics: policy.statistics(),
                    });
                }
                Err(failure) => failure,
            };

            self.transition(state, AttemptState::EvaluatingFailure, request);
            match policy.should_retry(&failure).await {
                ShouldRetryResult::RetryAfter(delay) => {
                    self.transition(state, AttemptState::Retrying, request);
                    self.stats.write().retries += 1;
                    debug!(
                        activity_id = %activity_id,
                        endpoint = %endpoint,
                        failure = %failure,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed; retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    cancel.check()?;
                }
                ShouldRetryResult::NoRetry => {
                    warn!(
                        activity_id = %activity_id,
                        endpoint = %endpoint,
                        attempts,
                        failure = %failure,
                        "request failed"
                    );
                    return Err(ClientError::Request(failure));
                }
                ShouldRetryResult::Error(err) => return Err(err.into()),
            }
        }
    }

    fn transition(&self, state: &mut AttemptState, next: AttemptState, request: &ServiceRequest) {
        debug!(
            activity_id = %request.activity_id,
            from = ?*state,
            to = ?next,
            "request state"
        );
        if next.is_terminal() {
            info!(
                operation = %request.operation_type,
                resource = %request.resource_type,
                outcome = ?next,
                "request finished"
            );
        }
        *state = next;
    }
}
