//! Delivery strategy seam
//!
//! The client core builds events; a strategy decides how they travel.
//! Sync issues one RPC per event and surfaces its outcome; async buffers
//! into batches and owns retries.

use crate::error::ClientError;
use async_trait::async_trait;
use virta_core::Event;

#[async_trait]
pub(crate) trait SendStrategy: Send + Sync {
    /// Hand an event over for delivery. In sync mode this resolves with
    /// the RPC outcome; in async mode acceptance only means buffered.
    async fn send(&self, event: Event) -> Result<(), ClientError>;

    /// Finish outstanding work and release the transport.
    async fn graceful_stop(&self) -> Result<(), ClientError>;
}
