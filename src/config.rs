//! Pipeline configuration
//!
//! The device is single-purpose: everything is a compile-time constant with
//! no CLI, environment, or persisted state. The struct exists so the values
//! travel together and so tests can shrink the retry delays.

use std::net::SocketAddr;
use std::time::Duration;

use crate::constants;

/// Configuration for the capture-to-network pipeline.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Destination address of the receiving server.
    pub server_addr: SocketAddr,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per capture cycle (frame length).
    pub frame_samples: usize,
    /// Frame queue capacity in frames.
    pub queue_capacity: usize,
    /// Delay before retrying a failed capture-bus read.
    pub capture_retry: Duration,
    /// Delay before retrying a failed connection attempt.
    pub connect_retry: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            server_addr: constants::DEFAULT_SERVER_ADDR
                .parse()
                .expect("DEFAULT_SERVER_ADDR is a valid socket address"),
            sample_rate: constants::SAMPLE_RATE,
            frame_samples: constants::FRAME_SAMPLES,
            queue_capacity: constants::QUEUE_CAPACITY,
            capture_retry: Duration::from_millis(constants::CAPTURE_RETRY_MS),
            connect_retry: Duration::from_millis(constants::CONNECT_RETRY_MS),
        }
    }
}

impl StreamConfig {
    /// Byte length of one full frame on the wire.
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * std::mem::size_of::<i16>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_consistent() {
        let config = StreamConfig::default();
        assert_eq!(config.frame_bytes(), config.frame_samples * 2);
        assert!(config.queue_capacity > 0);
        assert_eq!(config.server_addr.port(), constants::DEFAULT_LISTEN_PORT);
    }
}
