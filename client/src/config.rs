//! Client configuration
//!
//! One record enumerating every knob the client consumes, with the
//! defaults the gateway deployment assumes. Loading from YAML or the
//! environment is the caller's concern.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Default topic events are sent to (required)
    pub kafka_topic: String,
    /// Gateway address, e.g. "http://localhost:5000" (required)
    pub server_address: String,
    /// Use the buffering async strategy instead of per-call RPCs
    pub async_mode: bool,

    /// Max events per batch RPC
    pub batch_size: usize,
    /// Max time a non-full batch may wait before being flushed
    pub linger_interval: Duration,
    /// Ingress channel capacity; producers block when it is full
    pub channel_buffer: usize,
    /// Number of flush workers draining the ingress channel
    pub num_routines: usize,

    /// Retries per batch before its events are dropped
    pub max_retries: u32,
    /// Backoff base; attempt n sleeps 2^n times this
    pub retry_interval: Duration,
    /// Per-RPC deadline
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka_topic: String::new(),
            server_address: String::new(),
            async_mode: false,
            batch_size: 50,
            linger_interval: Duration::from_millis(500),
            channel_buffer: 500,
            num_routines: 5,
            max_retries: 3,
            retry_interval: Duration::from_secs(1),
            timeout: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Minimal config for the common case.
    pub fn new(kafka_topic: impl Into<String>, server_address: impl Into<String>) -> Self {
        Self {
            kafka_topic: kafka_topic.into(),
            server_address: server_address.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = Config::default();
        assert!(!config.async_mode);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.linger_interval, Duration::from_millis(500));
        assert_eq!(config.channel_buffer, 500);
        assert_eq!(config.num_routines, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_millis(500));
    }
}
