//! Synchronous delivery strategy
//!
//! One `SendEvent` RPC per call, under a fresh per-call deadline. Errors
//! surface verbatim to the producer, which decides what to do with them.

use crate::error::ClientError;
use crate::metrics::{Metrics, STATUS_FAILED, STATUS_OK};
use crate::strategy::SendStrategy;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tonic::transport::Channel;
use tracing::{debug, error};
use virta_core::proto::events_forwarder_client::EventsForwarderClient;
use virta_core::{routes, Event};

pub(crate) struct SyncSender {
    client: EventsForwarderClient<Channel>,
    timeout: Duration,
    metrics: &'static Metrics,
}

impl SyncSender {
    pub(crate) fn new(
        channel: Channel,
        timeout: Duration,
        metrics: &'static Metrics,
    ) -> Self {
        Self {
            client: EventsForwarderClient::new(channel),
            timeout,
            metrics,
        }
    }
}

#[async_trait]
impl SendStrategy for SyncSender {
    async fn send(&self, event: Event) -> Result<(), ClientError> {
        let start = Instant::now();
        let topic = event.topic.clone();

        let mut client = self.client.clone();
        let mut request = tonic::Request::new(event);
        request.set_timeout(self.timeout);

        let outcome = match tokio::time::timeout(self.timeout, client.send_event(request)).await {
            Ok(Ok(_response)) => Ok(()),
            Ok(Err(status)) => Err(ClientError::Rpc(status)),
            Err(_elapsed) => Err(ClientError::DeadlineExceeded),
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = match &outcome {
            Ok(()) => STATUS_OK,
            Err(_) => STATUS_FAILED,
        };
        self.metrics
            .response_time
            .with_label_values(&[routes::SEND_EVENT, &topic, "0", status])
            .observe(elapsed_ms);
        self.metrics
            .events
            .with_label_values(&[routes::SEND_EVENT, &topic, "0", status])
            .inc();

        match &outcome {
            Ok(()) => debug!(topic = %topic, elapsed_ms, "event sent"),
            Err(err) => error!(topic = %topic, error = %err, "error processing request"),
        }
        outcome
    }

    async fn graceful_stop(&self) -> Result<(), ClientError> {
        // nothing buffered; the channel closes when the client drops
        Ok(())
    }
}
