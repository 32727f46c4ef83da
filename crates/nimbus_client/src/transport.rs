//! Transport layer abstraction.

use bytes::Bytes;
use nimbus_codec::{decode_message, Message, MAX_MESSAGE_SIZE};
use nimbus_routing::{Endpoint, RequestFailure};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;

/// Sends framed requests to an endpoint.
///
/// This trait abstracts the connection layer so that the executor can run
/// over real connections or a scripted mock.
pub trait Transport: Send + Sync + 'static {
    /// Sends one encoded message and returns the response body.
    ///
    /// Every failure must be reported as a [`RequestFailure`] so the retry
    /// policy can classify it.
    fn send(
        &self,
        endpoint: &Endpoint,
        message: Bytes,
    ) -> impl Future<Output = Result<Bytes, RequestFailure>> + Send;
}

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    /// Where it was sent.
    pub endpoint: Endpoint,
    /// The decoded message.
    pub message: Message,
}

type Handler = Box<dyn Fn(&Endpoint, &Message) -> Result<Bytes, RequestFailure> + Send + Sync>;

/// A scripted transport for testing.
///
/// Replies are taken, in order, from the queue scripted for the target
/// endpoint. When that queue is empty the handler is asked, if one is set;
/// otherwise the send fails as a network error.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<Endpoint, VecDeque<Result<Bytes, RequestFailure>>>>,
    handler: Mutex<Option<Handler>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl MockTransport {
    /// Creates a mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the endpoint.
    pub fn push_reply(&self, endpoint: impl Into<Endpoint>, reply: Result<Bytes, RequestFailure>) {
        self.scripts
            .lock()
            .entry(endpoint.into())
            .or_default()
            .push_back(reply);
    }

    /// Queues a successful reply.
    pub fn push_ok(&self, endpoint: impl Into<Endpoint>, body: impl Into<Bytes>) {
        self.push_reply(endpoint, Ok(body.into()));
    }

    /// Queues a failure.
    pub fn push_failure(&self, endpoint: impl Into<Endpoint>, failure: RequestFailure) {
        self.push_reply(endpoint, Err(failure));
    }

    /// Sets the fallback used once an endpoint's script runs out.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&Endpoint, &Message) -> Result<Bytes, RequestFailure> + Send + Sync + 'static,
    {
        *self.handler.lock() = Some(Box::new(handler));
    }

    /// Returns every request sent so far.
    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    /// Returns how many requests were sent.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn reply(&self, endpoint: &Endpoint, message: Bytes) -> Result<Bytes, RequestFailure> {
        let message = decode_message(&message, MAX_MESSAGE_SIZE)
            .map_err(|err| RequestFailure::status(400, 0, err.to_string()))?;
        self.sent.lock().push(SentRequest {
            endpoint: endpoint.clone(),
            message: message.clone(),
        });

        let scripted = self
            .scripts
            .lock()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = scripted {
            return reply;
        }

        match self.handler.lock().as_ref() {
            Some(handler) => handler(endpoint, &message),
            None => Err(RequestFailure::network(format!(
                "no scripted reply for {endpoint}"
            ))),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("sent", &self.sent.lock().len())
            .field("has_handler", &self.handler.lock().is_some())
            .finish()
    }
}

impl Transport for MockTransport {
    async fn send(&self, endpoint: &Endpoint, message: Bytes) -> Result<Bytes, RequestFailure> {
        self.reply(endpoint, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_codec::{encode_message, OperationType, RequestFrame, ResourceType};
    use uuid::Uuid;

    fn message(payload: &[u8]) -> Bytes {
        let frame =
            RequestFrame::new(Uuid::new_v4(), OperationType::Read, ResourceType::Document).unwrap();
        encode_message(&frame, payload, MAX_MESSAGE_SIZE).unwrap()
    }

    #[tokio::test]
    async fn scripted_replies_in_order() {
        let transport = MockTransport::new();
        let east = Endpoint::new("https://east.example");
        transport.push_failure(east.clone(), RequestFailure::throttled(None));
        transport.push_ok(east.clone(), "done");

        let first = transport.send(&east, message(b"1")).await;
        assert_eq!(first, Err(RequestFailure::throttled(None)));
        let second = transport.send(&east, message(b"2")).await;
        assert_eq!(second, Ok(Bytes::from("done")));

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[1].message.payload[..], b"2");
    }

    #[tokio::test]
    async fn unscripted_endpoint_is_unreachable() {
        let transport = MockTransport::new();
        let result = transport
            .send(&Endpoint::new("https://nowhere.example"), message(b""))
            .await;
        assert!(matches!(result, Err(RequestFailure::Network { .. })));
    }

    #[tokio::test]
    async fn handler_used_after_script() {
        let transport = MockTransport::new();
        transport.set_handler(|endpoint, message| {
            Ok(Bytes::from(format!(
                "{endpoint}:{}",
                message.payload.len()
            )))
        });

        let reply = transport
            .send(&Endpoint::new("https://any.example"), message(b"abc"))
            .await
            .unwrap();
        assert_eq!(reply, Bytes::from("https://any.example:3"));
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn malformed_message_rejected() {
        let transport = MockTransport::new();
        let result = transport
            .send(&Endpoint::new("https://east.example"), Bytes::from_static(b"xx"))
            .await;
        assert_eq!(result.unwrap_err().status_code(), Some(400));
        assert_eq!(transport.sent_count(), 0);
    }
}
