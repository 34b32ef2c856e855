//! Kafka-backed sender

use crate::codec::EventCodec;
use crate::config::KafkaConfig;
use crate::error::{GatewayError, SendError};
use crate::forwarder::Forwarder;
use crate::metrics::{Metrics, STATUS_ERROR, STATUS_OK};
use crate::sender::Sender;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use prost::Message;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use virta_core::{Event, EventExt};

/// Sender that serializes events to Avro and publishes through a
/// [`Forwarder`]. Cheap to clone; clones share the producer.
#[derive(Clone)]
pub struct KafkaSender {
    inner: Arc<Inner>,
}

struct Inner {
    forwarder: Arc<dyn Forwarder>,
    codec: EventCodec,
    topic_prefix: String,
    max_message_bytes: usize,
}

impl KafkaSender {
    pub fn new(forwarder: Arc<dyn Forwarder>, config: &KafkaConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            inner: Arc::new(Inner {
                forwarder,
                codec: EventCodec::new()?,
                topic_prefix: config.topic_prefix.clone(),
                max_message_bytes: config.max_message_bytes,
            }),
        })
    }
}

#[async_trait]
impl Sender for KafkaSender {
    async fn send_event(&self, event: &Event) -> Result<(), SendError> {
        let start = Instant::now();

        if !event.is_complete() {
            return Err(SendError::InvalidEvent);
        }

        let size = event.encoded_len();
        if size >= self.inner.max_message_bytes {
            let err = SendError::TooLarge {
                size,
                limit: self.inner.max_message_bytes,
            };
            warn!(topic = %event.topic, size, "rejected oversized event");
            return Err(err);
        }

        debug!(
            event_id = %event.id,
            event_name = %event.name,
            topic = %event.topic,
            "received event"
        );

        let payload = self
            .inner
            .codec
            .encode(event, Utc::now().timestamp_millis())?;

        let prefixed_topic = format!("{}{}", self.inner.topic_prefix, event.topic);
        let result = self.inner.forwarder.produce(&event.topic, payload).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok((partition, offset)) => {
                if let Some(metrics) = Metrics::get() {
                    metrics.observe_kafka_latency(STATUS_OK, &prefixed_topic, elapsed_ms);
                }
                debug!(partition, offset, topic = %prefixed_topic, "event sent to kafka");
                Ok(())
            }
            Err(err) => {
                if let Some(metrics) = Metrics::get() {
                    metrics.observe_kafka_latency(STATUS_ERROR, &prefixed_topic, elapsed_ms);
                }
                error!(topic = %prefixed_topic, error = %err, "error producing event to kafka");
                Err(err.into())
            }
        }
    }

    async fn send_events(&self, events: Vec<Event>) -> Vec<i64> {
        let failure_indexes: Arc<Mutex<Vec<i64>>> =
            Arc::new(Mutex::new(Vec::with_capacity(events.len())));
        let mut tasks = JoinSet::new();

        for (index, event) in events.into_iter().enumerate() {
            let sender = self.clone();
            let failure_indexes = Arc::clone(&failure_indexes);
            tasks.spawn(async move {
                if let Err(err) = sender.send_event(&event).await {
                    error!(
                        topic = %event.topic,
                        event_name = %event.name,
                        event_id = %event.id,
                        error = %err,
                        "failed to send event to kafka"
                    );
                    failure_indexes.lock().push(index as i64);
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        // all tasks joined, so this is the only reference left
        match Arc::try_unwrap(failure_indexes) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().clone(),
        }
    }
}
