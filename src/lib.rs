//! # Mic Uplink
//!
//! Continuous microphone-to-server audio streaming over TCP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          SENDER DEVICE                           │
//! │                                                                  │
//! │  ┌─────────────┐      ┌──────────────────────────────────────┐   │
//! │  │ Microphone  │      │        Capture Task (thread)         │   │
//! │  │  (capture   │─────▶│  read one fixed-size frame at a time │   │
//! │  │    bus)     │      │  retry transient errors after 100ms  │   │
//! │  └─────────────┘      └──────────────────┬───────────────────┘   │
//! │                                          │ try_push (never       │
//! │                                          │ blocks, drop-oldest)  │
//! │                                          ▼                       │
//! │                       ┌──────────────────────────────────────┐   │
//! │                       │     Frame Queue (audio::queue)       │   │
//! │                       │  bounded FIFO, capacity K, the only  │   │
//! │                       │  state shared between the two tasks  │   │
//! │                       └──────────────────┬───────────────────┘   │
//! │                                          │ pop_blocking          │
//! │                                          ▼                       │
//! │                       ┌──────────────────────────────────────┐   │
//! │                       │        Sender Task (thread)          │   │
//! │                       │  frame → [len | payload | checksum]  │   │
//! │                       │  send-all or tear down + reconnect   │   │
//! │                       └──────────────────┬───────────────────┘   │
//! └──────────────────────────────────────────┼───────────────────────┘
//!                                            │ TCP
//!                                            ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         RECEIVER HOST                            │
//! │   accept → incremental packet decode → checksum verify → WAV     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue is deliberately lossy under sustained backpressure: when the
//! network stalls long enough to fill it, the oldest frame is evicted to
//! admit the newest. Bounded memory wins over zero data loss.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;

pub use config::StreamConfig;
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default server address (IP:port of the receiving host)
    pub const DEFAULT_SERVER_ADDR: &str = "192.168.1.6:12345";

    /// Default port the receiver binary listens on
    pub const DEFAULT_LISTEN_PORT: u16 = 12345;

    /// Capture sample rate in Hz
    pub const SAMPLE_RATE: u32 = 16_000;

    /// Channel count (mono capture)
    pub const CHANNELS: u16 = 1;

    /// Samples delivered per capture cycle
    pub const FRAME_SAMPLES: usize = 1024;

    /// Frame queue capacity in frames
    pub const QUEUE_CAPACITY: usize = 10;

    /// Delay before retrying a failed capture-bus read, in milliseconds
    pub const CAPTURE_RETRY_MS: u64 = 100;

    /// Delay before retrying a failed connection attempt, in milliseconds
    pub const CONNECT_RETRY_MS: u64 = 1000;

    /// Upper bound on the payload length accepted by the packet decoder.
    ///
    /// A length prefix beyond this is treated as stream desynchronization,
    /// not a real frame.
    pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

    /// Interval between WAV flushes on the receiver, in seconds
    pub const WAV_FLUSH_SECS: u64 = 5;
}
