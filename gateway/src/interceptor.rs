//! Per-request instrumentation
//!
//! Every RPC is observed exactly once: the observation is opened when the
//! request is demultiplexed (single event vs batch) and closed with the
//! handler outcome. Payload size is observed at open time so oversized
//! requests are measured even when the handler rejects them.
//!
//! Accounting rules:
//! - the response-time histogram is keyed by (route, topic, retry, status);
//! - every event in the request lands in exactly one counter: success, or
//!   failure with reason `produce failure` (its index came back in the
//!   failure list) or `handler error` (the whole RPC failed).

use crate::metrics::{
    Metrics, REASON_HANDLER_ERROR, REASON_PRODUCE_FAILURE, STATUS_ERROR, STATUS_OK,
};
use opentelemetry::propagation::Extractor;
use prost::Message;
use std::time::Instant;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use virta_core::{routes, Event, SendEventsRequest};

/// One in-flight RPC observation
pub struct RpcObservation {
    route: &'static str,
    topics: Vec<String>,
    retry: String,
    start: Instant,
}

impl RpcObservation {
    /// Open an observation for a single-event request.
    pub fn single(event: &Event) -> Self {
        let observation = Self {
            route: routes::SEND_EVENT,
            topics: vec![event.topic.clone()],
            retry: "0".to_string(),
            start: Instant::now(),
        };
        observation.observe_payload_size(event.encoded_len());
        observation
    }

    /// Open an observation for a batch request.
    pub fn batch(request: &SendEventsRequest) -> Self {
        let observation = Self {
            route: routes::SEND_EVENTS,
            topics: request.events.iter().map(|e| e.topic.clone()).collect(),
            retry: request.retry.to_string(),
            start: Instant::now(),
        };
        observation.observe_payload_size(request.encoded_len());
        observation
    }

    fn observe_payload_size(&self, size: usize) {
        if let Some(metrics) = Metrics::get() {
            let topic = self.topics.first().map(String::as_str).unwrap_or_default();
            metrics
                .api_payload_size
                .with_label_values(&[topic])
                .observe(size as f64);
        }
    }

    /// Close the observation for a handler that completed. An empty
    /// `failure_indexes` means full success; indexes must be ascending
    /// (the server sorts before replying).
    pub fn record_ok(self, failure_indexes: &[i64]) {
        let Some(metrics) = Metrics::get() else {
            return;
        };
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        let mut cursor = 0usize;
        for (index, topic) in self.topics.iter().enumerate() {
            metrics
                .api_response_time
                .with_label_values(&[self.route, topic, &self.retry, STATUS_OK])
                .observe(elapsed_ms);

            let failed =
                failure_indexes.get(cursor).copied() == Some(index as i64);
            if failed {
                cursor += 1;
                metrics
                    .api_requests_failure
                    .with_label_values(&[self.route, topic, &self.retry, REASON_PRODUCE_FAILURE])
                    .inc();
            } else {
                metrics
                    .api_requests_success
                    .with_label_values(&[self.route, topic, &self.retry])
                    .inc();
            }
        }
    }

    /// Close the observation for a handler that returned an error.
    pub fn record_err(self) {
        let Some(metrics) = Metrics::get() else {
            return;
        };
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        for topic in &self.topics {
            metrics
                .api_response_time
                .with_label_values(&[self.route, topic, &self.retry, STATUS_ERROR])
                .observe(elapsed_ms);
            metrics
                .api_requests_failure
                .with_label_values(&[self.route, topic, &self.retry, REASON_HANDLER_ERROR])
                .inc();
        }
    }
}

/// Attach the trace context propagated in the request metadata to the
/// current server span, so gateway spans join the caller's trace.
pub fn link_remote_trace(span: &Span, metadata: &tonic::metadata::MetadataMap) {
    let parent = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&MetadataExtractor(metadata))
    });
    span.set_parent(parent);
}

struct MetadataExtractor<'a>(&'a tonic::metadata::MetadataMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .filter_map(|key| match key {
                tonic::metadata::KeyRef::Ascii(key) => Some(key.as_str()),
                tonic::metadata::KeyRef::Binary(_) => None,
            })
            .collect()
    }
}
