//! virta-client - producer library for the virta events gateway
//!
//! Builds typed events and forwards them to the gateway over gRPC, either
//! synchronously (one RPC per event, errors surface to the caller) or
//! asynchronously (buffered, batched, retried; fire-and-forget).
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use virta_client::{Client, Config};
//!
//! # async fn run() -> Result<(), virta_client::ClientError> {
//! let mut config = Config::new("gameplay", "http://localhost:5000");
//! config.async_mode = true;
//!
//! let client = Client::new(config)?;
//! client
//!     .send("match.started", HashMap::from([("map".into(), "dust".into())]))
//!     .await?;
//!
//! // waits until every accepted event was delivered or dropped
//! client.graceful_stop().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

mod async_mode;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
mod pending;
mod strategy;
mod sync;

pub use client::Client;
pub use config::Config;
pub use error::ClientError;
pub use metrics::Metrics;

pub use virta_core::{Event, EventExt};
