//! Audio Receiver Application
//!
//! Accepts the device's TCP stream, verifies each packet's checksum, and
//! archives the received audio to timestamped WAV files.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mic_uplink::codec::framing::{payload_to_samples, PacketDecoder};
use mic_uplink::constants::{DEFAULT_LISTEN_PORT, SAMPLE_RATE, WAV_FLUSH_SECS};
use mic_uplink::error::{FramingError, NetworkError};

/// Buffers verified samples and flushes them to a WAV file periodically.
struct WavArchiver {
    pending: Vec<i16>,
    last_flush: Instant,
    flush_every: Duration,
}

impl WavArchiver {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            last_flush: Instant::now(),
            flush_every: Duration::from_secs(WAV_FLUSH_SECS),
        }
    }

    fn push(&mut self, samples: &[i16]) {
        self.pending.extend_from_slice(samples);
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.last_flush.elapsed() < self.flush_every {
            return Ok(());
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.last_flush = Instant::now();
        if self.pending.is_empty() {
            return Ok(());
        }

        let filename = chrono::Local::now()
            .format("audio_%Y%m%d_%H%M%S.wav")
            .to_string();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(&filename, spec).with_context(|| format!("create {filename}"))?;
        for &sample in &self.pending {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        tracing::info!(file = %filename, samples = self.pending.len(), "archived audio");
        self.pending.clear();
        Ok(())
    }
}

fn handle_client(mut stream: TcpStream, archiver: &mut WavArchiver) -> Result<()> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!(%peer, "client connected");

    let mut decoder = PacketDecoder::new();
    let mut read_buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut read_buf) {
            Ok(0) => {
                tracing::info!(%peer, "client disconnected");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%peer, "read error: {e}");
                break;
            }
        };
        decoder.extend(&read_buf[..n]);

        loop {
            match decoder.next_payload() {
                Ok(Some(payload)) => {
                    archiver.push(&payload_to_samples(&payload));
                }
                Ok(None) => break,
                Err(e @ FramingError::ChecksumMismatch { .. }) => {
                    // Bad packet discarded; the stream itself stays aligned.
                    tracing::warn!(%peer, "{e}");
                }
                Err(e) => {
                    tracing::warn!(%peer, "stream desynchronized: {e}, dropping client");
                    return Ok(());
                }
            }
        }

        archiver.maybe_flush()?;
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let listener = TcpListener::bind(("0.0.0.0", DEFAULT_LISTEN_PORT))
        .map_err(|e| NetworkError::BindFailed(format!("port {DEFAULT_LISTEN_PORT}: {e}")))?;
    tracing::info!(port = DEFAULT_LISTEN_PORT, "receiver listening");

    let mut archiver = WavArchiver::new();

    // One client at a time; the device reconnects rather than multiplexing.
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_client(stream, &mut archiver) {
                    tracing::warn!("client handler error: {e}");
                }
                // Whatever arrived before the disconnect is worth keeping.
                archiver.flush()?;
            }
            Err(e) => tracing::warn!("accept failed: {e}"),
        }
    }

    Ok(())
}
