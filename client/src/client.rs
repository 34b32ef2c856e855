//! Client core
//!
//! Builds events (fresh ULID, caller-supplied or current timestamp) and
//! hands them to the configured delivery strategy.

use crate::async_mode::AsyncSender;
use crate::config::Config;
use crate::error::ClientError;
use crate::metrics::Metrics;
use crate::strategy::SendStrategy;
use crate::sync::SyncSender;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};
use ulid::Ulid;
use virta_core::Event;

/// Producer handle for the events gateway.
///
/// Cheap to clone; clones share the underlying transport and, in async
/// mode, the same flush workers.
#[derive(Clone)]
pub struct Client {
    strategy: Arc<dyn SendStrategy>,
    topic: String,
}

impl Client {
    /// Create a client from configuration.
    ///
    /// The connection is established lazily on the first RPC. Must be
    /// called within a tokio runtime (async mode spawns its flush
    /// workers here).
    pub fn new(config: Config) -> Result<Self, ClientError> {
        if config.kafka_topic.is_empty() {
            return Err(ClientError::MissingTopic);
        }
        if config.server_address.is_empty() {
            return Err(ClientError::MissingServerAddress);
        }

        let channel = Endpoint::from_shared(config.server_address.clone())
            .map_err(|e| ClientError::InvalidServerAddress(e.to_string()))?
            .connect_timeout(config.timeout)
            .connect_lazy();

        Self::with_channel(config, channel)
    }

    /// Create a client over an existing channel. Used by tests and by
    /// callers that manage their own transport.
    pub fn with_channel(config: Config, channel: Channel) -> Result<Self, ClientError> {
        if config.kafka_topic.is_empty() {
            return Err(ClientError::MissingTopic);
        }
        let metrics = Metrics::init()?;

        info!(
            topic = %config.kafka_topic,
            server_address = %config.server_address,
            async_mode = config.async_mode,
            "creating events client"
        );

        let strategy: Arc<dyn SendStrategy> = if config.async_mode {
            AsyncSender::new(&config, channel, metrics)
        } else {
            Arc::new(SyncSender::new(channel, config.timeout, metrics))
        };

        Ok(Self {
            strategy,
            topic: config.kafka_topic,
        })
    }

    /// Send an event to the configured default topic.
    pub async fn send(
        &self,
        name: impl Into<String>,
        props: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let event = build_event(name.into(), props, self.topic.clone(), Utc::now());
        debug!(event_name = %event.name, "sending event");
        self.strategy.send(event).await
    }

    /// Send an event to an explicit topic.
    pub async fn send_to_topic(
        &self,
        name: impl Into<String>,
        props: HashMap<String, String>,
        topic: impl Into<String>,
    ) -> Result<(), ClientError> {
        let event = build_event(name.into(), props, topic.into(), Utc::now());
        debug!(event_name = %event.name, topic = %event.topic, "sending event");
        self.strategy.send(event).await
    }

    /// Send an event with an explicit client timestamp.
    pub async fn send_at_time(
        &self,
        name: impl Into<String>,
        props: HashMap<String, String>,
        at: DateTime<Utc>,
    ) -> Result<(), ClientError> {
        let event = build_event(name.into(), props, self.topic.clone(), at);
        debug!(event_name = %event.name, timestamp = event.timestamp, "sending event");
        self.strategy.send(event).await
    }

    /// Wait for every accepted event to reach a terminal outcome, then
    /// release the transport. Sends made after this starts are rejected.
    pub async fn graceful_stop(&self) -> Result<(), ClientError> {
        self.strategy.graceful_stop().await
    }
}

fn build_event(
    name: String,
    props: HashMap<String, String>,
    topic: String,
    at: DateTime<Utc>,
) -> Event {
    Event {
        id: Ulid::new().to_string(),
        name,
        topic,
        props,
        timestamp: at.timestamp_millis(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn build_event_mints_fresh_ids() {
        let a = build_event("e".into(), HashMap::new(), "t".into(), Utc::now());
        let b = build_event("e".into(), HashMap::new(), "t".into(), Utc::now());
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }

    #[test]
    fn build_event_uses_supplied_time() {
        let at = DateTime::from_timestamp_millis(1_000).unwrap_or_default();
        let event = build_event("e".into(), HashMap::new(), "t".into(), at);
        assert_eq!(event.timestamp, 1_000);
    }

    #[tokio::test]
    async fn new_requires_topic() {
        let config = Config::new("", "http://localhost:5000");
        assert!(matches!(
            Client::new(config),
            Err(ClientError::MissingTopic)
        ));
    }

    #[tokio::test]
    async fn new_requires_server_address() {
        let config = Config::new("events", "");
        assert!(matches!(
            Client::new(config),
            Err(ClientError::MissingServerAddress)
        ));
    }

    #[tokio::test]
    async fn new_rejects_unparseable_address() {
        let config = Config::new("events", "\0");
        assert!(matches!(
            Client::new(config),
            Err(ClientError::InvalidServerAddress(_))
        ));
    }

    #[tokio::test]
    async fn new_with_valid_config_builds_lazily() {
        // no server is listening; construction must still succeed
        let config = Config::new("events", "http://127.0.0.1:1");
        assert!(Client::new(config).is_ok());
    }
}
