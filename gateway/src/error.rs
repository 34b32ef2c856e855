//! Error types for the virta gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for gateway construction and serving
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// gRPC transport error
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Kafka client error
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Avro schema or encoding error
    #[error("avro error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Errors produced while publishing a payload to the broker.
///
/// These are surfaced verbatim to the sender; the client decides whether
/// a retry can help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// No broker reachable or all brokers down
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker rejected the payload for its size
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Delivery was not acknowledged within the produce timeout
    #[error("produce timed out: {0}")]
    Timeout(String),

    /// Anything the broker driver reported that fits no other bucket
    #[error("produce failed: {0}")]
    Unknown(String),
}

/// Errors produced by the sender for a single event.
#[derive(Error, Debug)]
pub enum SendError {
    /// A required event field is empty or zero
    #[error("id, name, topic and timestamp should be set")]
    InvalidEvent,

    /// The encoded event would not fit in a broker message
    #[error("event size exceeds max message bytes {limit}, got {size} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The Avro codec failed
    #[error("error serializing event: {0}")]
    Encoding(String),

    /// The broker publish failed
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl From<SendError> for tonic::Status {
    fn from(err: SendError) -> Self {
        match err {
            SendError::InvalidEvent => tonic::Status::failed_precondition(err.to_string()),
            // retrying an oversized event can never help, so the status
            // must be non-retryable
            SendError::TooLarge { .. } => tonic::Status::invalid_argument(err.to_string()),
            SendError::Encoding(msg) => tonic::Status::internal(msg),
            SendError::Forward(e) => tonic::Status::unavailable(e.to_string()),
        }
    }
}
