//! Broker forwarder
//!
//! The forwarder owns the last hop: it takes a logical topic and an
//! encoded payload and publishes them onto the log, returning the
//! partition and offset the broker assigned. The sender never sees the
//! topic prefix or the broker driver.

mod kafka;

pub use kafka::KafkaForwarder;

use crate::error::ForwardError;
use async_trait::async_trait;

/// Publishes a payload onto the log.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Publish `payload` on `topic` (logical, unprefixed). Blocks until
    /// the broker acknowledges per the configured ack policy. Returns the
    /// assigned (partition, offset).
    async fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<(i32, i64), ForwardError>;
}
