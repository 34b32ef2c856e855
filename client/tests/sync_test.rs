//! Sync strategy tests against a real gRPC server

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use virta_client::{Client, ClientError, Config};
use virta_core::proto::events_forwarder_server::{EventsForwarder, EventsForwarderServer};
use virta_core::{Event, SendEventResponse, SendEventsRequest, SendEventsResponse};

/// Gateway double that records single events, with switchable failure
/// and an artificial handler delay.
#[derive(Clone, Default)]
struct RecordingGateway {
    events: Arc<Mutex<Vec<Event>>>,
    fail: Arc<AtomicBool>,
    delay: Arc<Mutex<Duration>>,
}

impl RecordingGateway {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[tonic::async_trait]
impl EventsForwarder for RecordingGateway {
    async fn send_event(
        &self,
        request: Request<Event>,
    ) -> Result<Response<SendEventResponse>, Status> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Status::unavailable("producer offline"));
        }
        self.events.lock().unwrap().push(request.into_inner());
        Ok(Response::new(SendEventResponse {}))
    }

    async fn send_events(
        &self,
        _request: Request<SendEventsRequest>,
    ) -> Result<Response<SendEventsResponse>, Status> {
        Ok(Response::new(SendEventsResponse::default()))
    }
}

async fn start_gateway(gateway: RecordingGateway) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    tokio::spawn(async move {
        Server::builder()
            .add_service(EventsForwarderServer::new(gateway))
            .serve(addr)
            .await
            .ok();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

fn sync_config(addr: SocketAddr, topic: &str) -> Config {
    let mut config = Config::new(topic, format!("http://{addr}"));
    config.timeout = Duration::from_secs(1);
    config
}

#[tokio::test]
async fn send_delivers_event_to_default_topic() {
    let gateway = RecordingGateway::default();
    let addr = start_gateway(gateway.clone()).await;
    let client = Client::new(sync_config(addr, "test-topic")).unwrap();

    let props = HashMap::from([
        ("prop1".to_string(), "val1".to_string()),
        ("prop2".to_string(), "val2".to_string()),
    ]);
    let before = chrono::Utc::now().timestamp_millis();
    client.send("EventName", props.clone()).await.unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    let events = gateway.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(!event.id.is_empty());
    assert_eq!(event.name, "EventName");
    assert_eq!(event.topic, "test-topic");
    assert_eq!(event.props, props);
    assert!(event.timestamp >= before && event.timestamp <= after);
}

#[tokio::test]
async fn send_to_topic_overrides_default() {
    let gateway = RecordingGateway::default();
    let addr = start_gateway(gateway.clone()).await;
    let client = Client::new(sync_config(addr, "default-topic")).unwrap();

    client
        .send_to_topic("EventName", HashMap::new(), "custom-topic")
        .await
        .unwrap();

    assert_eq!(gateway.events()[0].topic, "custom-topic");
}

#[tokio::test]
async fn send_at_time_uses_supplied_timestamp() {
    let gateway = RecordingGateway::default();
    let addr = start_gateway(gateway.clone()).await;
    let client = Client::new(sync_config(addr, "timed")).unwrap();

    let at = chrono::DateTime::from_timestamp_millis(1_000).unwrap();
    client
        .send_at_time("EventName", HashMap::new(), at)
        .await
        .unwrap();

    assert_eq!(gateway.events()[0].timestamp, 1_000);
}

#[tokio::test]
async fn each_send_mints_a_fresh_id() {
    let gateway = RecordingGateway::default();
    let addr = start_gateway(gateway.clone()).await;
    let client = Client::new(sync_config(addr, "ids")).unwrap();

    client.send("a", HashMap::new()).await.unwrap();
    client.send("b", HashMap::new()).await.unwrap();

    let events = gateway.events();
    assert_ne!(events[0].id, events[1].id);
}

#[tokio::test]
async fn rpc_error_surfaces_to_caller() {
    let gateway = RecordingGateway::default();
    gateway.fail.store(true, Ordering::SeqCst);
    let addr = start_gateway(gateway.clone()).await;
    let client = Client::new(sync_config(addr, "failing")).unwrap();

    let err = client.send("EventName", HashMap::new()).await.unwrap_err();
    match err {
        ClientError::Rpc(status) => {
            assert_eq!(status.code(), tonic::Code::Unavailable);
            assert!(status.message().contains("producer offline"));
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_handler_hits_the_deadline() {
    let gateway = RecordingGateway::default();
    gateway.set_delay(Duration::from_millis(500));
    let addr = start_gateway(gateway.clone()).await;

    let mut config = sync_config(addr, "slow");
    config.timeout = Duration::from_millis(50);
    let client = Client::new(config).unwrap();

    let err = client.send("EventName", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded));
}

#[tokio::test]
async fn graceful_stop_is_idempotent_in_sync_mode() {
    let gateway = RecordingGateway::default();
    let addr = start_gateway(gateway).await;
    let client = Client::new(sync_config(addr, "stop")).unwrap();

    client.graceful_stop().await.unwrap();
    client.graceful_stop().await.unwrap();
}
