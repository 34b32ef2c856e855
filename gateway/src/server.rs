//! gRPC service implementation
//!
//! Terminates `SendEvent` and `SendEvents`. Partial failure of a batch is
//! reported through `failure_indexes`, never as a non-OK status; only
//! validation and infrastructure faults surface as RPC errors.

use crate::interceptor::{link_remote_trace, RpcObservation};
use crate::sender::Sender;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{info_span, Instrument};
use virta_core::proto::events_forwarder_server::{EventsForwarder, EventsForwarderServer};
use virta_core::{Event, SendEventResponse, SendEventsRequest, SendEventsResponse};

/// The `EventsForwarder` service backed by a [`Sender`]
pub struct EventsForwarderService {
    sender: Arc<dyn Sender>,
}

impl EventsForwarderService {
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        Self { sender }
    }

    /// Wrap the service for registration with a tonic server
    pub fn into_server(self) -> EventsForwarderServer<Self> {
        EventsForwarderServer::new(self)
    }
}

#[tonic::async_trait]
impl EventsForwarder for EventsForwarderService {
    async fn send_event(
        &self,
        request: Request<Event>,
    ) -> Result<Response<SendEventResponse>, Status> {
        let span = info_span!("send_event");
        link_remote_trace(&span, request.metadata());

        let event = request.into_inner();
        let observation = RpcObservation::single(&event);

        let result = self
            .sender
            .send_event(&event)
            .instrument(span)
            .await;

        match result {
            Ok(()) => {
                observation.record_ok(&[]);
                Ok(Response::new(SendEventResponse {}))
            }
            Err(err) => {
                observation.record_err();
                Err(err.into())
            }
        }
    }

    async fn send_events(
        &self,
        request: Request<SendEventsRequest>,
    ) -> Result<Response<SendEventsResponse>, Status> {
        let span = info_span!(
            "send_events",
            batch_id = tracing::field::Empty,
            event_count = tracing::field::Empty,
        );
        link_remote_trace(&span, request.metadata());

        let batch = request.into_inner();
        span.record("batch_id", batch.id.as_str());
        span.record("event_count", batch.events.len());

        let observation = RpcObservation::batch(&batch);

        let mut failure_indexes = self
            .sender
            .send_events(batch.events)
            .instrument(span)
            .await;

        // the client walks the reply front to back when rebuilding its
        // retry batch, so the indexes must come out ascending
        failure_indexes.sort_unstable();

        observation.record_ok(&failure_indexes);
        Ok(Response::new(SendEventsResponse { failure_indexes }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SendError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Sender stub that fails events whose topic is "bad", reporting
    /// failures in reverse order to prove the service sorts the reply.
    struct StubSender;

    #[async_trait]
    impl Sender for StubSender {
        async fn send_event(&self, event: &Event) -> Result<(), SendError> {
            if event.topic == "bad" {
                Err(SendError::InvalidEvent)
            } else {
                Ok(())
            }
        }

        async fn send_events(&self, events: Vec<Event>) -> Vec<i64> {
            let mut failed: Vec<i64> = events
                .iter()
                .enumerate()
                .filter(|(_, e)| e.topic == "bad")
                .map(|(i, _)| i as i64)
                .collect();
            failed.reverse();
            failed
        }
    }

    fn make_event(topic: &str) -> Event {
        Event {
            id: "id".to_string(),
            name: "n".to_string(),
            topic: topic.to_string(),
            props: HashMap::new(),
            timestamp: 1,
        }
    }

    fn service() -> EventsForwarderService {
        let _ = crate::metrics::Metrics::init();
        EventsForwarderService::new(Arc::new(StubSender))
    }

    #[tokio::test]
    async fn send_events_sorts_failure_indexes() {
        let batch = SendEventsRequest {
            id: "b".to_string(),
            events: vec![
                make_event("bad"),
                make_event("ok"),
                make_event("ok"),
                make_event("bad"),
                make_event("bad"),
            ],
            retry: 0,
        };

        let response = service()
            .send_events(Request::new(batch))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.failure_indexes, vec![0, 3, 4]);
    }

    #[tokio::test]
    async fn send_events_accepts_empty_batch() {
        let response = service()
            .send_events(Request::new(SendEventsRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert!(response.failure_indexes.is_empty());
    }

    #[tokio::test]
    async fn partial_failure_is_not_an_rpc_error() {
        let batch = SendEventsRequest {
            id: "b".to_string(),
            events: vec![make_event("bad")],
            retry: 1,
        };
        assert!(service().send_events(Request::new(batch)).await.is_ok());
    }

    #[tokio::test]
    async fn send_event_surfaces_validation_status() {
        let status = service()
            .send_event(Request::new(make_event("bad")))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn send_event_acks_success() {
        assert!(service()
            .send_event(Request::new(make_event("ok")))
            .await
            .is_ok());
    }
}
