//! Kafka forwarder backed by an rdkafka `FutureProducer`
//!
//! Prepends the configured topic prefix, injects the active trace context
//! into the message headers, and blocks until the broker acknowledges the
//! delivery (leader-only acks by default).

use crate::config::KafkaConfig;
use crate::error::{ForwardError, GatewayError};
use crate::forwarder::Forwarder;
use async_trait::async_trait;
use opentelemetry::propagation::Injector;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::debug;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub struct KafkaForwarder {
    producer: FutureProducer,
    topic_prefix: String,
    delivery_timeout: Duration,
}

impl KafkaForwarder {
    pub fn new(config: &KafkaConfig) -> Result<Self, GatewayError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("acks", &config.acks)
            .set("message.max.bytes", config.max_message_bytes.to_string())
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .set("compression.type", "snappy")
            .create()?;

        debug!(brokers = %config.brokers, topic_prefix = %config.topic_prefix, "kafka producer created");

        Ok(Self {
            producer,
            topic_prefix: config.topic_prefix.clone(),
            delivery_timeout: config.message_timeout,
        })
    }

    /// Collect the active trace context into Kafka message headers so the
    /// downstream consumer joins the same trace.
    fn trace_headers() -> OwnedHeaders {
        let mut carrier = HeaderCarrier::default();
        let context = tracing::Span::current().context();
        opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&context, &mut carrier);
        });

        let mut headers = OwnedHeaders::new();
        for (key, value) in &carrier.entries {
            headers = headers.insert(Header {
                key,
                value: Some(value.as_str()),
            });
        }
        headers
    }
}

#[async_trait]
impl Forwarder for KafkaForwarder {
    async fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<(i32, i64), ForwardError> {
        let prefixed_topic = format!("{}{}", self.topic_prefix, topic);
        let record = FutureRecord::<(), _>::to(&prefixed_topic)
            .payload(&payload)
            .headers(Self::trace_headers());

        match self
            .producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
        {
            Ok((partition, offset)) => Ok((partition, offset)),
            Err((err, _message)) => Err(classify(err)),
        }
    }
}

#[derive(Default)]
struct HeaderCarrier {
    entries: Vec<(String, String)>,
}

impl Injector for HeaderCarrier {
    fn set(&mut self, key: &str, value: String) {
        self.entries.push((key.to_string(), value));
    }
}

/// Map driver errors onto the forwarder's error kinds. The sender reports
/// these verbatim; only the client decides what is retryable.
fn classify(err: KafkaError) -> ForwardError {
    let code = match &err {
        KafkaError::MessageProduction(code) => *code,
        _ => return ForwardError::Unknown(err.to_string()),
    };
    match code {
        RDKafkaErrorCode::MessageSizeTooLarge => ForwardError::PayloadTooLarge(err.to_string()),
        RDKafkaErrorCode::MessageTimedOut
        | RDKafkaErrorCode::RequestTimedOut
        | RDKafkaErrorCode::OperationTimedOut => ForwardError::Timeout(err.to_string()),
        RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::AllBrokersDown => {
            ForwardError::BrokerUnavailable(err.to_string())
        }
        _ => ForwardError::Unknown(err.to_string()),
    }
}
