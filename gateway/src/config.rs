//! Gateway configuration
//!
//! Plain configuration records with defaults. Loading these from YAML or
//! the environment is the caller's concern; the gateway only consumes the
//! resolved values.

use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host for the gRPC listener
    pub host: String,
    /// Bind port for the gRPC listener
    pub port: u16,
    /// Port for the Prometheus metrics endpoint
    pub metrics_port: u16,
    /// Kafka producer settings
    pub kafka: KafkaConfig,
    /// gRPC keepalive settings
    pub keepalive: KeepaliveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            metrics_port: 9091,
            kafka: KafkaConfig::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// Kafka producer configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated broker list
    pub brokers: String,
    /// Client id reported to the brokers
    pub client_id: String,
    /// Prefix prepended to every logical event topic
    pub topic_prefix: String,
    /// Events whose encoded size reaches this bound are rejected before
    /// the producer is called
    pub max_message_bytes: usize,
    /// How long a produce may wait for broker acknowledgement
    pub message_timeout: Duration,
    /// Producer acknowledgement policy ("1" = leader only)
    pub acks: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: "virta".to_string(),
            topic_prefix: "sv-uploads-".to_string(),
            max_message_bytes: 1_000_000,
            message_timeout: Duration::from_millis(250),
            acks: "1".to_string(),
        }
    }
}

/// gRPC server keepalive configuration
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Close connections idle longer than this
    pub max_connection_idle: Duration,
    /// Close connections older than this
    pub max_connection_age: Duration,
    /// Grace period for in-flight RPCs when an aged connection closes
    pub max_connection_age_grace: Duration,
    /// HTTP/2 keepalive ping interval
    pub time: Duration,
    /// HTTP/2 keepalive ping timeout
    pub timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            max_connection_idle: Duration::from_secs(20),
            max_connection_age: Duration::from_secs(20),
            max_connection_age_grace: Duration::from_secs(5),
            time: Duration::from_secs(10),
            timeout: Duration::from_millis(500),
        }
    }
}
