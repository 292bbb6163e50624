//! Bounded frame queue with drop-oldest overflow
//!
//! The sole hand-off point between the capture task and the sender task.
//! Capacity is fixed at construction; when a push finds the queue full, the
//! oldest frame is evicted and the new frame admitted in the same critical
//! section. The producer side never blocks; the consumer side blocks until
//! a frame arrives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::audio::frame::AudioFrame;

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was appended with capacity to spare.
    Accepted,
    /// The queue was full; the oldest frame was evicted to admit this one.
    AcceptedWithEviction,
}

struct Inner {
    frames: VecDeque<AudioFrame>,
    closed: bool,
}

/// Bounded FIFO of audio frames.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
    pushed: AtomicU64,
    evicted: AtomicU64,
    popped: AtomicU64,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            pushed: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            popped: AtomicU64::new(0),
        }
    }

    /// Push a frame without blocking.
    ///
    /// On a full queue the oldest frame is evicted and the new frame is
    /// always admitted. Eviction and insert happen under one lock
    /// acquisition, so the queue never momentarily exceeds capacity and no
    /// other task can slip between the discard and the insert.
    pub fn try_push(&self, frame: AudioFrame) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            let outcome = if inner.frames.len() == self.capacity {
                let dropped = inner.frames.pop_front();
                if let Some(dropped) = dropped {
                    warn!(sequence = dropped.sequence(), "queue full, evicted oldest frame");
                }
                self.evicted.fetch_add(1, Ordering::Relaxed);
                PushOutcome::AcceptedWithEviction
            } else {
                PushOutcome::Accepted
            };
            inner.frames.push_back(frame);
            outcome
        };
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        outcome
    }

    /// Pop the oldest frame, blocking until one is available.
    ///
    /// Frames come out in strict FIFO order; this side never drops.
    /// Returns `None` only once the queue has been closed and drained,
    /// which never happens in normal operation.
    pub fn pop_blocking(&self) -> Option<AudioFrame> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                self.popped.fetch_add(1, Ordering::Relaxed);
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Close the queue, waking any blocked consumer.
    ///
    /// Already-queued frames remain poppable; only an empty closed queue
    /// yields `None`. Used for orderly teardown, not by the pipeline itself.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.available.notify_all();
    }

    /// Current number of queued frames.
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of frames the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames accepted (including those that caused an eviction).
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Total frames evicted by the overflow policy.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Total frames handed to the consumer.
    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![seq as i16; 4], seq)
    }

    #[test]
    fn pops_in_push_order() {
        let queue = FrameQueue::new(8);
        for seq in 0..5 {
            assert_eq!(queue.try_push(frame(seq)), PushOutcome::Accepted);
        }
        for seq in 0..5 {
            assert_eq!(queue.pop_blocking().unwrap().sequence(), seq);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn never_exceeds_capacity() {
        let queue = FrameQueue::new(3);
        for seq in 0..50 {
            queue.try_push(frame(seq));
            assert!(queue.len() <= 3);
        }
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn overflow_evicts_exactly_the_oldest() {
        let capacity = 4;
        let queue = FrameQueue::new(capacity);

        for seq in 1..=capacity as u64 {
            assert_eq!(queue.try_push(frame(seq)), PushOutcome::Accepted);
        }
        // The (K+1)th push reports the eviction.
        assert_eq!(
            queue.try_push(frame(capacity as u64 + 1)),
            PushOutcome::AcceptedWithEviction
        );
        assert_eq!(queue.evicted(), 1);

        // Remaining contents are exactly frames 2..=K+1.
        queue.close();
        let mut remaining = Vec::new();
        while let Some(f) = queue.pop_blocking() {
            remaining.push(f.sequence());
        }
        assert_eq!(remaining, vec![2, 3, 4, 5]);
    }

    #[test]
    fn push_with_one_free_slot_does_not_evict() {
        let queue = FrameQueue::new(2);
        queue.try_push(frame(0));
        assert_eq!(queue.try_push(frame(1)), PushOutcome::Accepted);
        assert_eq!(queue.evicted(), 0);
    }

    #[test]
    fn blocking_pop_wakes_on_push() {
        let queue = Arc::new(FrameQueue::new(4));
        let consumer_queue = queue.clone();

        let consumer = thread::spawn(move || consumer_queue.pop_blocking());

        // Give the consumer time to block on the empty queue first.
        thread::sleep(Duration::from_millis(50));
        queue.try_push(frame(42));

        let got = consumer.join().unwrap().unwrap();
        assert_eq!(got.sequence(), 42);
    }

    #[test]
    fn concurrent_push_pop_preserves_order() {
        let queue = Arc::new(FrameQueue::new(64));
        let producer_queue = queue.clone();
        let total = 1000u64;

        let producer = thread::spawn(move || {
            for seq in 0..total {
                producer_queue.try_push(frame(seq));
            }
            producer_queue.close();
        });

        // Evictions may or may not occur depending on scheduling; either
        // way the popped sequence must be strictly increasing and end at
        // the last pushed frame, which can never be evicted.
        let mut last = None;
        while let Some(f) = queue.pop_blocking() {
            if let Some(prev) = last {
                assert!(f.sequence() > prev, "order violated: {} after {}", f.sequence(), prev);
            }
            last = Some(f.sequence());
        }

        producer.join().unwrap();
        assert_eq!(last, Some(total - 1));
    }

    #[test]
    fn close_drains_remaining_frames() {
        let queue = FrameQueue::new(4);
        queue.try_push(frame(0));
        queue.try_push(frame(1));
        queue.close();

        assert_eq!(queue.pop_blocking().unwrap().sequence(), 0);
        assert_eq!(queue.pop_blocking().unwrap().sequence(), 1);
        assert!(queue.pop_blocking().is_none());
    }
}
