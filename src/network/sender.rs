//! Network sender task
//!
//! Pops frames from the queue, frames them into wire packets, and pushes
//! them down one persistent TCP session. Connection loss is routine: the
//! link is torn down on any send error and rebuilt with a fixed-delay
//! retry, dropping the in-flight frame rather than resending stale audio
//! out of order.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::audio::queue::FrameQueue;
use crate::codec::framing::encode_packet;
use crate::config::StreamConfig;
use crate::error::NetworkError;
use crate::network::tcp::{Connection, Connector};

/// Connection state of the uplink.
///
/// The handle is owned here and nowhere else; tearing the link down drops
/// it, which closes the socket. Connecting is a transient step inside the
/// `Down → Up` transition, never a state the rest of the pipeline sees.
enum Link<C> {
    Down,
    Up(C),
}

/// Counters for the sender side.
#[derive(Debug, Default)]
pub struct SenderStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_failures: AtomicU64,
    frames_discarded: AtomicU64,
    connects: AtomicU64,
    connect_failures: AtomicU64,
}

impl SenderStats {
    pub fn snapshot(&self) -> SenderStatsSnapshot {
        SenderStatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SenderStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderStatsSnapshot {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub frames_discarded: u64,
    pub connects: u64,
    pub connect_failures: u64,
}

/// The sender task.
///
/// Construct, then either [`run`](Self::run) on the current thread or
/// [`spawn`](Self::spawn) onto a dedicated one.
pub struct SenderTask<N: Connector> {
    connector: N,
    queue: Arc<FrameQueue>,
    connect_retry: Duration,
    running: Arc<AtomicBool>,
    stats: Arc<SenderStats>,
}

impl<N: Connector> SenderTask<N> {
    pub fn new(connector: N, queue: Arc<FrameQueue>, config: &StreamConfig) -> Self {
        Self {
            connector,
            queue,
            connect_retry: config.connect_retry,
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(SenderStats::default()),
        }
    }

    /// Shared view of the task's counters.
    pub fn stats(&self) -> Arc<SenderStats> {
        self.stats.clone()
    }

    /// Run the send loop until the queue is closed and drained.
    ///
    /// Suspension points: queue pop, connect, send. Nothing else blocks.
    pub fn run(mut self) {
        let mut link: Link<N::Conn> = Link::Down;

        while self.running.load(Ordering::Relaxed) {
            // A session must exist before a frame is consumed, so a failed
            // connect never costs queued audio.
            if matches!(link, Link::Down) {
                match self.connector.connect() {
                    Ok(conn) => {
                        self.stats.connects.fetch_add(1, Ordering::Relaxed);
                        info!("uplink connected");
                        link = Link::Up(conn);
                    }
                    Err(e) => {
                        self.stats.connect_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("{}, retrying", NetworkError::ConnectionFailed(e.to_string()));
                        thread::sleep(self.connect_retry);
                        continue;
                    }
                }
            }

            let Some(frame) = self.queue.pop_blocking() else {
                break;
            };

            let packet = match encode_packet(frame.samples()) {
                Ok(packet) => packet,
                Err(e) => {
                    self.stats.frames_discarded.fetch_add(1, Ordering::Relaxed);
                    error!(sequence = frame.sequence(), "dropping frame: {e}");
                    continue;
                }
            };

            let Link::Up(conn) = &mut link else {
                unreachable!("link established above");
            };
            match send_all(conn, &packet) {
                Ok(()) => {
                    self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .bytes_sent
                        .fetch_add(packet.len() as u64, Ordering::Relaxed);
                    debug!(sequence = frame.sequence(), bytes = packet.len(), "packet sent");
                }
                Err(e) => {
                    // The packet in flight is abandoned; the handle is
                    // dropped (socket closed) before the next frame is
                    // popped, so no further bytes ever reach this session.
                    self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        sequence = frame.sequence(),
                        "{}, reconnecting",
                        NetworkError::SendFailed(e.to_string())
                    );
                    link = Link::Down;
                }
            }
        }
    }

    /// Spawn the send loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<SenderHandle>
    where
        N: 'static,
    {
        let running = self.running.clone();
        let stats = self.stats.clone();
        let queue = self.queue.clone();
        let handle = thread::Builder::new()
            .name("net-send".to_string())
            .spawn(move || self.run())?;

        Ok(SenderHandle {
            running,
            stats,
            queue,
            handle: Some(handle),
        })
    }
}

/// Handle to a spawned sender task.
pub struct SenderHandle {
    running: Arc<AtomicBool>,
    stats: Arc<SenderStats>,
    queue: Arc<FrameQueue>,
    handle: Option<JoinHandle<()>>,
}

impl SenderHandle {
    pub fn stats(&self) -> SenderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the task: close the queue, wake the loop, join the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SenderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Write the whole buffer or fail.
///
/// Partial writes are retried; `Ok(0)` means the peer closed and is a hard
/// failure. Only `Interrupted` is transparently retried as a non-error.
fn send_all<C: Connection>(conn: &mut C, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match conn.send(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed mid-packet",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::AudioFrame;
    use crate::codec::checksum::checksum;
    use crate::codec::framing::PacketDecoder;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport that records every byte written to it.
    ///
    /// Writes are chopped into `chunk`-sized pieces to exercise the partial
    /// write loop, and fail permanently once `fail_at` bytes have been
    /// accepted.
    struct MockConnection {
        log: Arc<Mutex<Vec<u8>>>,
        chunk: usize,
        fail_at: Option<usize>,
        written: usize,
    }

    impl Connection for MockConnection {
        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(fail_at) = self.fail_at {
                if self.written >= fail_at {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
                }
            }
            let mut n = buf.len().min(self.chunk);
            if let Some(fail_at) = self.fail_at {
                n = n.min(fail_at - self.written);
            }
            self.log.lock().extend_from_slice(&buf[..n]);
            self.written += n;
            Ok(n)
        }
    }

    /// Scripted connect attempts; each `push_session` hands back the byte
    /// log of the session it will produce.
    struct MockConnector {
        script: VecDeque<Result<MockConnection, io::ErrorKind>>,
    }

    impl MockConnector {
        fn new() -> Self {
            Self {
                script: VecDeque::new(),
            }
        }

        fn push_failure(&mut self) {
            self.script.push_back(Err(io::ErrorKind::ConnectionRefused));
        }

        fn push_session(&mut self, chunk: usize, fail_at: Option<usize>) -> Arc<Mutex<Vec<u8>>> {
            let log = Arc::new(Mutex::new(Vec::new()));
            self.script.push_back(Ok(MockConnection {
                log: log.clone(),
                chunk,
                fail_at,
                written: 0,
            }));
            log
        }
    }

    impl Connector for MockConnector {
        type Conn = MockConnection;

        fn connect(&mut self) -> io::Result<MockConnection> {
            match self.script.pop_front() {
                Some(Ok(conn)) => Ok(conn),
                Some(Err(kind)) => Err(io::Error::new(kind, "scripted refusal")),
                None => Err(io::Error::new(io::ErrorKind::Other, "script exhausted")),
            }
        }
    }

    fn test_config() -> StreamConfig {
        StreamConfig {
            connect_retry: Duration::from_millis(1),
            ..StreamConfig::default()
        }
    }

    fn frame(seq: u64, len: usize) -> AudioFrame {
        AudioFrame::new(vec![seq as i16; len], seq)
    }

    #[test]
    fn sends_full_packet_across_partial_writes() {
        let queue = Arc::new(FrameQueue::new(10));
        queue.try_push(frame(0, 64));
        queue.close();

        let mut connector = MockConnector::new();
        let log = connector.push_session(3, None);

        let task = SenderTask::new(connector, queue, &test_config());
        let stats = task.stats();
        task.run();

        let bytes = log.lock().clone();
        assert_eq!(bytes.len(), 4 + 128 + 4);

        let mut decoder = PacketDecoder::new();
        decoder.extend(&bytes);
        let payload = decoder.next_payload().unwrap().unwrap();
        assert_eq!(payload.len(), 128);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(snapshot.bytes_sent, bytes.len() as u64);
    }

    #[test]
    fn retries_connect_without_consuming_frames() {
        let queue = Arc::new(FrameQueue::new(10));
        queue.try_push(frame(0, 16));
        queue.close();

        let mut connector = MockConnector::new();
        connector.push_failure();
        let log = connector.push_session(1024, None);

        let task = SenderTask::new(connector, queue, &test_config());
        let stats = task.stats();
        task.run();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connect_failures, 1);
        assert_eq!(snapshot.connects, 1);
        // The frame survived the failed attempt and went out intact.
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(log.lock().len(), 4 + 32 + 4);
    }

    #[test]
    fn mid_packet_failure_tears_down_and_reconnects() {
        let queue = Arc::new(FrameQueue::new(10));
        queue.try_push(frame(1, 64));
        queue.try_push(frame(2, 64));
        queue.close();

        let packet_len = 4 + 128 + 4;
        let mut connector = MockConnector::new();
        let broken = connector.push_session(1024, Some(packet_len / 2));
        let healthy = connector.push_session(1024, None);

        let task = SenderTask::new(connector, queue, &test_config());
        let stats = task.stats();
        task.run();

        // The dead session saw exactly the half packet and nothing after.
        assert_eq!(broken.lock().len(), packet_len / 2);

        // The next frame went out on a fresh session, whole.
        let healthy_bytes = healthy.lock().clone();
        assert_eq!(healthy_bytes.len(), packet_len);
        let mut decoder = PacketDecoder::new();
        decoder.extend(&healthy_bytes);
        let payload = decoder.next_payload().unwrap().unwrap();
        assert_eq!(checksum(&payload), {
            let trailer = &healthy_bytes[packet_len - 4..];
            u32::from_be_bytes(trailer.try_into().unwrap())
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.send_failures, 1);
        assert_eq!(snapshot.connects, 2);
        assert_eq!(snapshot.packets_sent, 1);
    }

    #[test]
    fn write_zero_is_a_hard_failure() {
        struct ClosedConnection;
        impl Connection for ClosedConnection {
            fn send(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
        }

        let mut conn = ClosedConnection;
        let err = send_all(&mut conn, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
