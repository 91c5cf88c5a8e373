//! Interrupt-to-task frame queue.
//!
//! [`FrameQueue`] is a fixed-capacity single-producer/single-consumer ring of
//! [`Frame`]s built on `heapless::spsc`. It is split once into a
//! [`FrameSender`], owned by the receive interrupt, and a [`FrameReceiver`],
//! owned by the dispatch task. Neither side takes a lock.
//!
//! ## Policy
//!
//! - Enqueueing never blocks. When the queue is full the incoming (newest)
//!   frame is dropped; the hardware sender cannot be paused, so no
//!   backpressure is signalled.
//! - Dequeueing is FIFO. [`FrameReceiver::receive_timeout`] waits a bounded
//!   number of scheduler ticks and then gives up.

use core::convert::Infallible;
use core::fmt;

use crate::consts::{RX_QUEUE_SLOTS, TICK_MS};
use crate::frame::Frame;
use embedded_hal::delay::DelayNs;
use heapless::spsc::{Consumer, Producer, Queue};

/// Bounded frame queue with `N` slots, holding at most `N - 1` frames.
///
/// The default of [`RX_QUEUE_SLOTS`] holds [`RX_QUEUE_LEN`](crate::consts::RX_QUEUE_LEN) frames.
pub struct FrameQueue<const N: usize = RX_QUEUE_SLOTS> {
    inner: Queue<Frame, N>,
}

impl<const N: usize> FrameQueue<N> {
    /// Creates an empty queue. Usable in `static` initialisers.
    pub const fn new() -> Self {
        Self {
            inner: Queue::new(),
        }
    }

    /// Maximum number of frames held at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Splits the queue into its interrupt half and its task half.
    pub fn split(&mut self) -> (FrameSender<'_, N>, FrameReceiver<'_, N>) {
        let (producer, consumer) = self.inner.split();
        (
            FrameSender {
                producer,
                dropped: 0,
            },
            FrameReceiver { consumer },
        )
    }
}

impl<const N: usize> fmt::Debug for FrameQueue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.inner.len())
            .finish()
    }
}

impl<const N: usize> Default for FrameQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half of a [`FrameQueue`]. Only call from interrupt context.
pub struct FrameSender<'a, const N: usize = RX_QUEUE_SLOTS> {
    producer: Producer<'a, Frame, N>,
    dropped: u32,
}

impl<const N: usize> FrameSender<'_, N> {
    /// Enqueues a frame without blocking.
    ///
    /// # Returns
    /// - `true`: the frame was accepted
    /// - `false`: the queue was full and the frame was dropped
    pub fn enqueue(&mut self, frame: Frame) -> bool {
        match self.producer.enqueue(frame) {
            Ok(()) => true,
            Err(_) => {
                self.dropped = self.dropped.wrapping_add(1);
                false
            }
        }
    }

    /// Number of frames dropped so far because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize> fmt::Debug for FrameSender<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSender")
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

/// Consumer half of a [`FrameQueue`]. Only call from the dispatch task.
pub struct FrameReceiver<'a, const N: usize = RX_QUEUE_SLOTS> {
    consumer: Consumer<'a, Frame, N>,
}

impl<const N: usize> FrameReceiver<'_, N> {
    /// Pops the oldest frame, or reports `WouldBlock` if the queue is empty.
    pub fn try_receive(&mut self) -> nb::Result<Frame, Infallible> {
        self.consumer.dequeue().ok_or(nb::Error::WouldBlock)
    }

    /// Waits up to `timeout_ticks` scheduler ticks for a frame.
    ///
    /// The queue is polled once per tick, so a frame enqueued during a wait is
    /// picked up at the next tick boundary. A zero timeout polls exactly once.
    pub fn receive_timeout<D: DelayNs>(
        &mut self,
        delay: &mut D,
        timeout_ticks: u32,
    ) -> Option<Frame> {
        let mut waited = 0;
        loop {
            match self.try_receive() {
                Ok(frame) => return Some(frame),
                Err(nb::Error::WouldBlock) if waited < timeout_ticks => {
                    delay.delay_ms(TICK_MS);
                    waited += 1;
                }
                Err(_) => return None,
            }
        }
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Whether no frame is queued.
    pub fn is_empty(&self) -> bool {
        !self.consumer.ready()
    }
}

impl<const N: usize> fmt::Debug for FrameReceiver<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReceiver")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TickDelay {
        elapsed_ms: u32,
    }

    impl DelayNs for TickDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ms += ns / 1_000_000;
        }
    }

    fn frame(tag: u8) -> Frame {
        Frame::from_raw(0x70A, &[tag]).unwrap()
    }

    #[test]
    fn test_capacity_matches_rx_queue_len() {
        let queue: FrameQueue = FrameQueue::new();
        assert_eq!(queue.capacity(), crate::consts::RX_QUEUE_LEN);
    }

    #[test]
    fn test_fifo_with_drop_newest_on_overflow() {
        let mut queue: FrameQueue = FrameQueue::new();
        let (mut tx, mut rx) = queue.split();

        for tag in 0..12u8 {
            let accepted = tx.enqueue(frame(tag));
            assert_eq!(accepted, tag < 8, "frame {tag}");
        }
        assert_eq!(tx.dropped(), 4);
        assert_eq!(rx.len(), 8);

        for tag in 0..8u8 {
            assert_eq!(rx.try_receive().unwrap().payload(), &[tag]);
        }
        assert!(rx.is_empty());
        assert!(matches!(rx.try_receive(), Err(nb::Error::WouldBlock)));
    }

    #[test]
    fn test_space_frees_after_dequeue() {
        let mut queue: FrameQueue<3> = FrameQueue::new();
        let (mut tx, mut rx) = queue.split();
        assert!(tx.enqueue(frame(1)));
        assert!(tx.enqueue(frame(2)));
        assert!(!tx.enqueue(frame(3)));
        assert_eq!(rx.try_receive().unwrap().payload(), &[1]);
        assert!(tx.enqueue(frame(4)));
        assert_eq!(rx.try_receive().unwrap().payload(), &[2]);
        assert_eq!(rx.try_receive().unwrap().payload(), &[4]);
    }

    #[test]
    fn test_receive_timeout_is_bounded() {
        let mut queue: FrameQueue = FrameQueue::new();
        let (_tx, mut rx) = queue.split();
        let mut delay = TickDelay { elapsed_ms: 0 };
        assert!(rx.receive_timeout(&mut delay, 50).is_none());
        assert_eq!(delay.elapsed_ms, 50 * TICK_MS);
    }

    #[test]
    fn test_receive_timeout_returns_queued_frame_without_waiting() {
        let mut queue: FrameQueue = FrameQueue::new();
        let (mut tx, mut rx) = queue.split();
        assert!(tx.enqueue(frame(7)));
        let mut delay = TickDelay { elapsed_ms: 0 };
        let got = rx.receive_timeout(&mut delay, 50).unwrap();
        assert_eq!(got.payload(), &[7]);
        assert_eq!(delay.elapsed_ms, 0);
    }
}
