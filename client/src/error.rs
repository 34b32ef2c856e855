//! Error types for the virta client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// No default topic configured
    #[error("no kafka topic informed")]
    MissingTopic,

    /// No gateway address configured
    #[error("no grpc server address informed")]
    MissingServerAddress,

    /// The gateway address could not be parsed as an endpoint
    #[error("invalid server address: {0}")]
    InvalidServerAddress(String),

    /// `send` was called after `graceful_stop`
    #[error("client is stopped")]
    Stopped,

    /// The per-call deadline elapsed before the RPC completed
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The gateway returned a non-OK status
    #[error(transparent)]
    Rpc(#[from] tonic::Status),

    /// The transport failed
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),
}
