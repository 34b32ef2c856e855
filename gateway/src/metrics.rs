//! Prometheus metrics for the gateway

use crate::error::{GatewayError, Result};
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Label observed as `status` on success
pub const STATUS_OK: &str = "ok";
/// Label observed as `status` on failure
pub const STATUS_ERROR: &str = "error";

/// Failure reason when the handler itself errored
pub const REASON_HANDLER_ERROR: &str = "handler error";
/// Failure reason when a single event could not be produced
pub const REASON_PRODUCE_FAILURE: &str = "produce failure";

/// All gateway metrics
pub struct Metrics {
    /// End-to-end handler latency in ms (by route, topic, retry, status)
    pub api_response_time: HistogramVec,

    /// Request payload size in bytes (by topic)
    pub api_payload_size: HistogramVec,

    /// Kafka produce latency in ms (by status, prefixed topic)
    pub kafka_response_time: HistogramVec,

    /// Events accepted and published (by route, topic, retry)
    pub api_requests_success: IntCounterVec,

    /// Events that failed (by route, topic, retry, reason)
    pub api_requests_failure: IntCounterVec,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// A second call returns the already-registered instance, so duplicate
    /// initialization across the gateway and its tests is harmless.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let latency_buckets = vec![10.0, 30.0, 50.0, 100.0, 500.0];
        let payload_buckets = vec![
            10_000.0, 50_000.0, 100_000.0, 500_000.0, 1_000_000.0, 5_000_000.0,
        ];

        let metrics = Metrics {
            api_response_time: register_histogram_vec!(
                "virta_api_response_time_ms",
                "Response time in ms of API routes",
                &["route", "topic", "retry", "status"],
                latency_buckets.clone()
            )
            .map_err(|e| GatewayError::Metrics(format!("api_response_time: {e}")))?,

            api_payload_size: register_histogram_vec!(
                "virta_api_payload_size",
                "Payload size of API requests, in bytes",
                &["topic"],
                payload_buckets
            )
            .map_err(|e| GatewayError::Metrics(format!("api_payload_size: {e}")))?,

            kafka_response_time: register_histogram_vec!(
                "virta_kafka_response_time_ms",
                "Response time in ms of Kafka produces",
                &["status", "topic"],
                latency_buckets
            )
            .map_err(|e| GatewayError::Metrics(format!("kafka_response_time: {e}")))?,

            api_requests_success: register_int_counter_vec!(
                "virta_api_requests_success_total",
                "Count of events accepted and published",
                &["route", "topic", "retry"]
            )
            .map_err(|e| GatewayError::Metrics(format!("api_requests_success: {e}")))?,

            api_requests_failure: register_int_counter_vec!(
                "virta_api_requests_failure_total",
                "Count of events that failed",
                &["route", "topic", "retry", "reason"]
            )
            .map_err(|e| GatewayError::Metrics(format!("api_requests_failure: {e}")))?,
        };

        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| GatewayError::Metrics("failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record a Kafka produce latency observation
    pub fn observe_kafka_latency(&self, status: &str, topic: &str, elapsed_ms: f64) {
        self.kafka_response_time
            .with_label_values(&[status, topic])
            .observe(elapsed_ms);
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}
