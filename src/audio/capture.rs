//! Audio capture task
//!
//! The capture side of the pipeline: a [`CaptureBus`] delivers fixed-size
//! sample frames on demand, and the [`CaptureTask`] moves them into the
//! frame queue without ever blocking on the network side.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;
use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, error, info, warn};

use crate::audio::device::InputDevice;
use crate::audio::frame::AudioFrame;
use crate::audio::queue::FrameQueue;
use crate::config::StreamConfig;
use crate::error::CaptureError;

/// A peripheral that delivers audio frames on demand.
///
/// `read_frame` blocks until samples are available (the hardware paces
/// delivery) and fills `buf` from the front, returning the number of
/// samples written. Zero samples and errors are both transient from the
/// caller's point of view.
pub trait CaptureBus: Send {
    fn read_frame(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError>;
}

/// Handle to the running capture task.
pub struct CaptureTask {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureTask {
    /// Spawn the capture loop on its own thread.
    ///
    /// The loop runs until the process ends (or [`stop`](Self::stop) for
    /// tests and teardown): read one frame from the bus, push it into the
    /// queue, never wait on the consumer.
    pub fn spawn<B>(
        bus: B,
        queue: Arc<FrameQueue>,
        config: &StreamConfig,
    ) -> std::io::Result<Self>
    where
        B: CaptureBus + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let frame_samples = config.frame_samples;
        let retry = config.capture_retry;

        let loop_running = running.clone();
        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture_loop(bus, queue, frame_samples, retry, loop_running))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the task and wait for the thread to exit.
    ///
    /// Join completes once the in-flight bus read returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<B: CaptureBus>(
    mut bus: B,
    queue: Arc<FrameQueue>,
    frame_samples: usize,
    retry: Duration,
    running: Arc<AtomicBool>,
) {
    let mut sequence: u64 = 0;

    while running.load(Ordering::Relaxed) {
        // Fresh buffer per cycle: the frame owns its storage outright, so a
        // queued frame can never alias the buffer being read into.
        let mut scratch = vec![0i16; frame_samples];

        match bus.read_frame(&mut scratch) {
            Ok(0) => {
                warn!("capture bus returned zero samples, retrying");
                thread::sleep(retry);
            }
            Ok(n) => {
                scratch.truncate(n);
                let frame = AudioFrame::new(scratch, sequence);
                debug!(sequence, bytes = frame.byte_len(), "captured frame");
                sequence += 1;
                // Eviction is logged by the queue; it is data loss, not a
                // failure, so the loop just keeps going.
                queue.try_push(frame);
            }
            Err(e) => {
                warn!("capture bus read failed: {e}, retrying");
                thread::sleep(retry);
            }
        }
    }
}

/// Production capture bus backed by the default microphone via cpal.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread;
/// the audio callback forwards sample chunks over a bounded channel and
/// never blocks: if the channel is full the chunk is dropped and counted.
pub struct MicCaptureBus {
    rx: Receiver<Vec<i16>>,
    leftover: VecDeque<i16>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    dropped_chunks: Arc<AtomicU64>,
}

impl MicCaptureBus {
    /// Open the default input device and start capturing.
    pub fn open(config: &StreamConfig) -> Result<Self, CaptureError> {
        let (chunk_tx, chunk_rx) = bounded::<Vec<i16>>(32);
        let (ready_tx, ready_rx) = bounded::<Result<String, CaptureError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let dropped_chunks = Arc::new(AtomicU64::new(0));

        let sample_rate = config.sample_rate;
        let stream_running = running.clone();
        let dropped = dropped_chunks.clone();

        let thread = thread::Builder::new()
            .name("mic-bus".to_string())
            .spawn(move || {
                // Device lookup and stream construction happen here because
                // the stream must stay on the thread that built it.
                let built: Result<(cpal::Stream, String), CaptureError> = (|| {
                    let device = InputDevice::default_input()?;
                    let name = device.name.clone();
                    let (stream_config, format) =
                        device.negotiate_config(sample_rate, crate::constants::CHANNELS)?;
                    let cpal_device = device.into_inner();

                    let err_fn = |e: cpal::StreamError| error!("input stream error: {e}");

                    let stream = match format {
                        SampleFormat::I16 => {
                            let tx = chunk_tx.clone();
                            let dropped = dropped.clone();
                            cpal_device.build_input_stream(
                                &stream_config,
                                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                                    if tx.try_send(data.to_vec()).is_err() {
                                        dropped.fetch_add(1, Ordering::Relaxed);
                                    }
                                },
                                err_fn,
                                None,
                            )
                        }
                        SampleFormat::F32 => {
                            let tx = chunk_tx.clone();
                            let dropped = dropped.clone();
                            cpal_device.build_input_stream(
                                &stream_config,
                                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                    let chunk: Vec<i16> = data
                                        .iter()
                                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                                        .collect();
                                    if tx.try_send(chunk).is_err() {
                                        dropped.fetch_add(1, Ordering::Relaxed);
                                    }
                                },
                                err_fn,
                                None,
                            )
                        }
                        other => {
                            return Err(CaptureError::UnsupportedFormat(format!("{other:?}")))
                        }
                    }
                    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

                    stream.play().map_err(|e| CaptureError::StreamError(e.to_string()))?;
                    Ok((stream, name))
                })();

                match built {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        while stream_running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(50));
                        }
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::StreamError(e.to_string()))?;

        let device_name = ready_rx
            .recv()
            .map_err(|_| CaptureError::BusStopped)??;
        info!(device = %device_name, sample_rate, "microphone capture bus started");

        Ok(Self {
            rx: chunk_rx,
            leftover: VecDeque::new(),
            running,
            thread: Some(thread),
            dropped_chunks,
        })
    }

    /// Chunks dropped because the hand-off channel was full.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

impl CaptureBus for MicCaptureBus {
    fn read_frame(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        let mut filled = 0;

        while filled < buf.len() {
            while filled < buf.len() {
                match self.leftover.pop_front() {
                    Some(sample) => {
                        buf[filled] = sample;
                        filled += 1;
                    }
                    None => break,
                }
            }
            if filled == buf.len() {
                break;
            }
            match self.rx.recv() {
                Ok(chunk) => self.leftover.extend(chunk),
                // Stream thread gone: hand back what we have, error next time.
                Err(_) if filled > 0 => return Ok(filled),
                Err(_) => return Err(CaptureError::BusStopped),
            }
        }

        Ok(filled)
    }
}

impl Drop for MicCaptureBus {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
