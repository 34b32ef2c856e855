//! HTTP server for Prometheus scraping
//!
//! Runs a lightweight HTTP server on a separate port.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - Simple health check

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Start the metrics server on the given port
    ///
    /// Returns a JoinHandle that can be used to abort the server.
    /// The server runs until aborted or the process exits.
    pub fn start(port: u16) -> JoinHandle<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tokio::spawn(async move {
            let app = Router::new()
                .route("/metrics", get(metrics_handler))
                .route("/health", get(health_handler));

            info!(port, "metrics server starting");

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, port, "failed to bind metrics server");
                    return;
                }
            };

            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "metrics server error");
            }
        })
    }
}

async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_handler_returns_prometheus_format() {
        let _ = crate::metrics::Metrics::init();

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.contains("text/plain"));
    }

    #[tokio::test]
    async fn health_handler_is_ok() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
