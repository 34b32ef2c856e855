//! Prometheus metrics for the client

use crate::error::ClientError;
use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Label observed as `status` on success
pub const STATUS_OK: &str = "ok";
/// Label observed as `status` on failure
pub const STATUS_FAILED: &str = "failed";

/// All client metrics
pub struct Metrics {
    /// Response time in ms as perceived by the client
    /// (by route, topic, retry, status)
    pub response_time: HistogramVec,

    /// Events sent, by terminal RPC outcome (route, topic, retry, status)
    pub events: IntCounterVec,

    /// Events dropped after exhausting retries in async mode (by topic)
    pub async_dropped: IntCounterVec,

    /// Current depth of the async ingress channel (by topic)
    pub async_channel_depth: IntGaugeVec,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Subsequent calls return the already-registered instance, so every
    /// client constructed in a process shares one registry.
    pub fn init() -> Result<&'static Metrics, ClientError> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            response_time: register_histogram_vec!(
                "virta_client_response_time_ms",
                "Response time in ms of calls to the gateway",
                &["route", "topic", "retry", "status"],
                vec![10.0, 30.0, 50.0, 100.0, 500.0]
            )
            .map_err(|e| ClientError::Metrics(format!("response_time: {e}")))?,

            events: register_int_counter_vec!(
                "virta_client_events_total",
                "Count of events by request outcome",
                &["route", "topic", "retry", "status"]
            )
            .map_err(|e| ClientError::Metrics(format!("events: {e}")))?,

            async_dropped: register_int_counter_vec!(
                "virta_client_async_dropped_total",
                "Count of events dropped after exhausting retries",
                &["topic"]
            )
            .map_err(|e| ClientError::Metrics(format!("async_dropped: {e}")))?,

            async_channel_depth: register_int_gauge_vec!(
                "virta_client_async_channel_depth",
                "Events currently buffered in the async ingress channel",
                &["topic"]
            )
            .map_err(|e| ClientError::Metrics(format!("async_channel_depth: {e}")))?,
        };

        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| ClientError::Metrics("failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }
}
