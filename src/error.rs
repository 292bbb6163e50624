//! Error types for the streaming pipeline
//!
//! Nothing in the pipeline treats an error as fatal: capture errors are
//! retried, queue overflow drops the oldest frame, network errors tear the
//! connection down for the sender to rebuild. These types exist so each
//! failure is logged with enough context to tell those cases apart.

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture-bus errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The bus stopped delivering samples (stream thread exited).
    #[error("Capture bus stopped")]
    BusStopped,
}

/// Wire-framing errors
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Packet buffer allocation failed ({0} bytes)")]
    Alloc(usize),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
