//! Event sender
//!
//! The sender sits between the RPC layer and the forwarder: it validates
//! events, enforces the payload bound, serializes to Avro, and dispatches
//! produces. Batches fan out one task per event so a slow partition never
//! serializes the whole request.

mod kafka;

pub use kafka::KafkaSender;

use crate::error::SendError;
use async_trait::async_trait;
use virta_core::Event;

#[async_trait]
pub trait Sender: Send + Sync {
    /// Validate, serialize and publish a single event.
    async fn send_event(&self, event: &Event) -> Result<(), SendError>;

    /// Publish a batch, one concurrent produce per event. Returns the
    /// positions of the events that failed, in no particular order;
    /// partial failure is not an error of the batch itself.
    async fn send_events(&self, events: Vec<Event>) -> Vec<i64>;
}
