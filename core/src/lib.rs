//! virta-core - Wire types for the virta events gateway
//!
//! This crate holds the proto-generated types shared between the gateway
//! server and the client library:
//!
//! - [`Event`] - the unit of ingress
//! - [`SendEventsRequest`] / [`SendEventsResponse`] - the partial-failure
//!   batch protocol (the response carries the failed event positions, the
//!   client retries exactly those)
//! - the `EventsForwarder` tonic service (client and server halves)
//!
//! Both `virta-gateway` and `virta-client` depend on this crate so that a
//! batch serialized on one side decodes identically on the other.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

// Proto types generated from virta/v1/events.proto
pub mod proto {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::derive_partial_eq_without_eq)]

    include!("proto/virta.v1.rs");
}

pub use proto::{Event, SendEventResponse, SendEventsRequest, SendEventsResponse};

/// Full gRPC method paths, used as the `route` label on metrics.
pub mod routes {
    /// Route of the unary single-event RPC.
    pub const SEND_EVENT: &str = "/virta.v1.EventsForwarder/SendEvent";
    /// Route of the batch RPC.
    pub const SEND_EVENTS: &str = "/virta.v1.EventsForwarder/SendEvents";
}

/// Validation helpers on the wire [`Event`].
pub trait EventExt {
    /// True iff every required field (id, name, topic, timestamp) is set.
    /// Props may be empty.
    fn is_complete(&self) -> bool;
}

impl EventExt for Event {
    fn is_complete(&self) -> bool {
        !self.id.is_empty()
            && !self.name.is_empty()
            && !self.topic.is_empty()
            && self.timestamp != 0
    }
}
