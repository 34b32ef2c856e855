//! virta-gateway - events gateway server
//!
//! Terminates the `EventsForwarder` gRPC service, validates and serializes
//! incoming events into Avro records, and publishes them onto Kafka:
//!
//! ```text
//! producers ──► gRPC ──► sender ──► codec ──► forwarder ──► Kafka
//! ```
//!
//! Batches fan out one produce per event; the positions of failed events
//! travel back to the client in `failure_indexes`, and the client retries
//! exactly those.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod interceptor;
pub mod metrics;
pub mod metrics_server;
pub mod sender;
pub mod server;

pub use app::App;
pub use codec::{EventCodec, EventRecord};
pub use config::{Config, KafkaConfig, KeepaliveConfig};
pub use error::{ForwardError, GatewayError, SendError};
pub use forwarder::{Forwarder, KafkaForwarder};
pub use metrics::Metrics;
pub use metrics_server::MetricsServer;
pub use sender::{KafkaSender, Sender};
pub use server::EventsForwarderService;
