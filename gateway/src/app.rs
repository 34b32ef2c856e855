//! Gateway wiring
//!
//! Builds the forwarder → sender → service chain from configuration and
//! serves it, with keepalive tuned for long-lived producer connections
//! and a separate metrics endpoint for Prometheus.

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::forwarder::KafkaForwarder;
use crate::metrics::Metrics;
use crate::metrics_server::MetricsServer;
use crate::sender::KafkaSender;
use crate::server::EventsForwarderService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// The assembled gateway application
pub struct App {
    config: Config,
    sender: KafkaSender,
}

impl App {
    /// Build the application: registers metrics and connects the Kafka
    /// producer (lazily; brokers are dialed on first produce).
    pub fn new(config: Config) -> Result<Self> {
        Metrics::init()?;
        let forwarder = Arc::new(KafkaForwarder::new(&config.kafka)?);
        let sender = KafkaSender::new(forwarder, &config.kafka)?;
        Ok(Self { config, sender })
    }

    /// Serve until the process exits.
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then drain in-flight RPCs.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid listen address: {e}")))?;

        MetricsServer::start(self.config.metrics_port);

        let service = EventsForwarderService::new(Arc::new(self.sender)).into_server();
        let keepalive = &self.config.keepalive;

        info!(%addr, "events gateway listening");

        tonic::transport::Server::builder()
            .tcp_keepalive(Some(keepalive.time))
            .http2_keepalive_interval(Some(keepalive.time))
            .http2_keepalive_timeout(Some(keepalive.timeout))
            .add_service(service)
            .serve_with_shutdown(addr, shutdown)
            .await?;

        Ok(())
    }
}
