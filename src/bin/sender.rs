//! Audio Sender Application
//!
//! Captures microphone audio and streams it to the receiving server over
//! TCP. Runs until the process is terminated.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mic_uplink::{
    audio::{CaptureTask, FrameQueue, MicCaptureBus},
    network::{SenderTask, TcpConnector},
    Result, StreamConfig,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting microphone uplink sender");

    let config = StreamConfig::default();
    tracing::info!(
        server = %config.server_addr,
        sample_rate = config.sample_rate,
        frame_samples = config.frame_samples,
        queue_capacity = config.queue_capacity,
        "pipeline configuration"
    );

    // The queue is the only state the two tasks share.
    let queue = Arc::new(FrameQueue::new(config.queue_capacity));

    let bus = MicCaptureBus::open(&config)?;
    let _capture = CaptureTask::spawn(bus, queue.clone(), &config)?;
    tracing::info!("capture task started");

    let sender = SenderTask::new(TcpConnector::new(config.server_addr), queue.clone(), &config);
    let stats = sender.stats();
    let _sender = sender.spawn()?;
    tracing::info!("sender task started");

    // Both tasks run forever; this thread only reports.
    loop {
        std::thread::sleep(Duration::from_secs(5));
        let snapshot = stats.snapshot();
        tracing::info!(
            packets_sent = snapshot.packets_sent,
            kib_sent = snapshot.bytes_sent / 1024,
            queued = queue.len(),
            evicted = queue.evicted(),
            reconnects = snapshot.send_failures,
            connect_failures = snapshot.connect_failures,
            "uplink stats"
        );
    }
}
