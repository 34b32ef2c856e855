//! End-to-end gateway tests
//!
//! Start the real gRPC service backed by an in-memory forwarder, drive it
//! with the generated client, and verify what would have landed on the
//! log.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::transport::Server;
use virta_core::proto::events_forwarder_client::EventsForwarderClient;
use virta_core::{Event, SendEventsRequest};
use virta_gateway::{
    EventCodec, EventsForwarderService, ForwardError, Forwarder, KafkaConfig, KafkaSender, Metrics,
};

/// Forwarder that keeps produced payloads in memory
#[derive(Clone, Default)]
struct MemoryForwarder {
    produced: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    fail_topics: Arc<Mutex<Vec<String>>>,
}

impl MemoryForwarder {
    fn produced(&self) -> Vec<(String, Vec<u8>)> {
        self.produced.lock().clone()
    }

    fn fail_on(&self, topic: &str) {
        self.fail_topics.lock().push(topic.to_string());
    }
}

#[async_trait]
impl Forwarder for MemoryForwarder {
    async fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<(i32, i64), ForwardError> {
        if self.fail_topics.lock().iter().any(|t| t == topic) {
            return Err(ForwardError::BrokerUnavailable("no leader".to_string()));
        }
        let mut produced = self.produced.lock();
        produced.push((topic.to_string(), payload));
        Ok((0, produced.len() as i64 - 1))
    }
}

async fn start_gateway(
    forwarder: MemoryForwarder,
    config: KafkaConfig,
) -> EventsForwarderClient<tonic::transport::Channel> {
    let _ = Metrics::init();
    let sender = KafkaSender::new(Arc::new(forwarder), &config).unwrap();
    let service = EventsForwarderService::new(Arc::new(sender));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);

    tokio::spawn(async move {
        Server::builder()
            .add_service(service.into_server())
            .serve(addr)
            .await
            .ok();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    EventsForwarderClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
}

fn make_event(id: &str, topic: &str) -> Event {
    Event {
        id: id.to_string(),
        name: "e".to_string(),
        topic: topic.to_string(),
        props: HashMap::new(),
        timestamp: 1_000,
    }
}

#[tokio::test]
async fn single_send_produces_decodable_record() {
    let forwarder = MemoryForwarder::default();
    let mut client = start_gateway(forwarder.clone(), KafkaConfig::default()).await;

    client.send_event(make_event("a", "t")).await.unwrap();

    let produced = forwarder.produced();
    assert_eq!(produced.len(), 1);
    let (topic, payload) = &produced[0];
    // the forwarder receives the logical topic; the Kafka driver adds
    // the `sv-uploads-` prefix when publishing
    assert_eq!(topic, "t");

    let record = EventCodec::new().unwrap().decode(payload).unwrap();
    assert_eq!(record.id, "a");
    assert_eq!(record.client_timestamp, 1_000);
    assert!(record.server_timestamp > 1_000);
}

#[tokio::test]
async fn invalid_event_is_rejected_with_failed_precondition() {
    let forwarder = MemoryForwarder::default();
    let mut client = start_gateway(forwarder.clone(), KafkaConfig::default()).await;

    let mut event = make_event("a", "t");
    event.timestamp = 0;

    let status = client.send_event(event).await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    assert!(forwarder.produced().is_empty());
}

#[tokio::test]
async fn oversized_event_is_rejected_without_producing() {
    let forwarder = MemoryForwarder::default();
    let config = KafkaConfig {
        max_message_bytes: 30_000,
        ..KafkaConfig::default()
    };
    let mut client = start_gateway(forwarder.clone(), config).await;

    let mut event = make_event("a", "oversized");
    event.props.insert("blob".to_string(), "x".repeat(30_069));

    let status = client.send_event(event).await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert!(forwarder.produced().is_empty());

    // the request was still measured on its way in
    let metrics = Metrics::init().unwrap();
    let histogram = metrics.api_payload_size.with_label_values(&["oversized"]);
    assert_eq!(histogram.get_sample_count(), 1);
    assert!(histogram.get_sample_sum() >= 30_000.0);
}

#[tokio::test]
async fn batch_reply_lists_failed_positions_sorted() {
    let forwarder = MemoryForwarder::default();
    forwarder.fail_on("bad");
    let mut client = start_gateway(forwarder.clone(), KafkaConfig::default()).await;

    let batch = SendEventsRequest {
        id: "batch-1".to_string(),
        events: vec![
            make_event("0", "bad"),
            make_event("1", "good"),
            make_event("2", "bad"),
            make_event("3", "good"),
            make_event("4", "bad"),
        ],
        retry: 0,
    };

    let response = client.send_events(batch).await.unwrap().into_inner();
    assert_eq!(response.failure_indexes, vec![0, 2, 4]);
    assert_eq!(forwarder.produced().len(), 2);
}

#[tokio::test]
async fn empty_batch_is_accepted() {
    let forwarder = MemoryForwarder::default();
    let mut client = start_gateway(forwarder, KafkaConfig::default()).await;

    let response = client
        .send_events(SendEventsRequest {
            id: "empty".to_string(),
            events: vec![],
            retry: 0,
        })
        .await
        .unwrap()
        .into_inner();
    assert!(response.failure_indexes.is_empty());
}

#[tokio::test]
async fn invalid_events_in_batch_become_failure_indexes() {
    let forwarder = MemoryForwarder::default();
    let mut client = start_gateway(forwarder.clone(), KafkaConfig::default()).await;

    let mut incomplete = make_event("1", "good");
    incomplete.name.clear();

    let batch = SendEventsRequest {
        id: "batch-2".to_string(),
        events: vec![make_event("0", "good"), incomplete],
        retry: 0,
    };

    let response = client.send_events(batch).await.unwrap().into_inner();
    assert_eq!(response.failure_indexes, vec![1]);
    assert_eq!(forwarder.produced().len(), 1);
}
