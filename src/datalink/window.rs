//! Transmit window: DATA frames queued or awaiting acknowledgement.
//!
//! Frames are kept in frame-id order. Frames that have been handed to the driver
//! always form a prefix of the queue; frames still waiting for driver space
//! (fresh or rewound for retransmission) form the suffix.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::buffer::{Buffer, BufferPool};
use crate::protocol::frame_id;

/// Transmission state of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Waiting for driver space.
    Pending,
    /// Handed to the driver, awaiting acknowledgement.
    Sent,
}

/// A DATA frame owned by the window.
#[derive(Debug)]
pub struct TxFrame {
    frame_id: u16,
    buffer: Buffer,
    state: FrameState,
    sent_at: u64,
    attempts: u32,
}

impl TxFrame {
    /// Frame id.
    #[must_use]
    pub const fn frame_id(&self) -> u16 {
        self.frame_id
    }

    /// Encoded frame bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Time of the most recent transmission.
    #[must_use]
    pub const fn sent_at(&self) -> u64 {
        self.sent_at
    }

    /// Number of transmissions so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a transmission at `now`.
    pub fn mark_sent(&mut self, now: u64) {
        self.state = FrameState::Sent;
        self.sent_at = now;
        self.attempts = self.attempts.saturating_add(1);
    }
}

/// In-flight frame queue bounded by the window size.
#[derive(Debug)]
pub struct TxWindow {
    frames: VecDeque<TxFrame>,
    capacity: usize,
}

impl TxWindow {
    /// Create a window holding at most `capacity` frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Frames in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of frames.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.frames.len())
    }

    /// Whether another frame would exceed the window.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Oldest frame.
    #[must_use]
    pub fn front(&self) -> Option<&TxFrame> {
        self.frames.front()
    }

    /// Append an encoded frame as pending. The caller checks [`TxWindow::is_full`].
    pub fn push(&mut self, frame_id: u16, buffer: Buffer) {
        trace!(frame_id, len = buffer.len(), "tx frame queued");
        self.frames.push_back(TxFrame {
            frame_id,
            buffer,
            state: FrameState::Pending,
            sent_at: 0,
            attempts: 0,
        });
    }

    /// First frame waiting for driver space.
    pub fn next_pending(&mut self) -> Option<&mut TxFrame> {
        self.frames
            .iter_mut()
            .find(|frame| frame.state == FrameState::Pending)
    }

    /// First frame waiting for driver space, read-only.
    #[must_use]
    pub fn first_pending(&self) -> Option<&TxFrame> {
        self.frames
            .iter()
            .find(|frame| frame.state == FrameState::Pending)
    }

    /// Whether any frame is waiting for driver space.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.frames
            .back()
            .is_some_and(|frame| frame.state == FrameState::Pending)
    }

    /// Oldest frame that has been handed to the driver.
    #[must_use]
    pub fn oldest_sent(&self) -> Option<&TxFrame> {
        self.frames
            .front()
            .filter(|frame| frame.state == FrameState::Sent)
    }

    /// Whether `frame_id` lies between the oldest and newest frame, inclusive.
    #[must_use]
    pub fn contains(&self, frame_id: u16) -> bool {
        match (self.frames.front(), self.frames.back()) {
            (Some(front), Some(back)) => {
                frame_id::subtract(frame_id, front.frame_id) >= 0
                    && frame_id::subtract(frame_id, back.frame_id) <= 0
            }
            _ => false,
        }
    }

    /// Cumulative acknowledgement: drop every frame up to and including
    /// `frame_id`. Returns the number of frames released.
    ///
    /// Acknowledgements naming a frame newer than the newest queued frame are
    /// ignored.
    pub fn ack_through(&mut self, frame_id: u16, pool: &mut BufferPool) -> usize {
        let Some(back) = self.frames.back() else {
            return 0;
        };
        if frame_id::subtract(frame_id, back.frame_id) > 0 {
            debug!(
                frame_id,
                newest = back.frame_id,
                "ignoring ack beyond newest frame"
            );
            return 0;
        }

        let mut released = 0;
        while let Some(front) = self.frames.front() {
            if frame_id::subtract(front.frame_id, frame_id) > 0 {
                break;
            }
            if let Some(frame) = self.frames.pop_front() {
                pool.release(frame.buffer);
                released += 1;
            }
        }
        if released > 0 {
            trace!(frame_id, released, "tx frames acknowledged");
        }
        released
    }

    /// Selective acknowledgement of exactly one frame.
    pub fn ack_one(&mut self, frame_id: u16, pool: &mut BufferPool) -> bool {
        let Some(index) = self
            .frames
            .iter()
            .position(|frame| frame.frame_id == frame_id)
        else {
            return false;
        };
        if let Some(frame) = self.frames.remove(index) {
            pool.release(frame.buffer);
        }
        true
    }

    /// Negative acknowledgement: the peer expects `frame_id` next.
    ///
    /// Frames before `frame_id` are released and the rest are rewound for
    /// retransmission. Returns `None` when `frame_id` lies outside the window
    /// (neither a queued frame nor the one right after the newest), otherwise
    /// the number of frames released.
    pub fn nack(&mut self, frame_id: u16, pool: &mut BufferPool) -> Option<usize> {
        let back = self.frames.back()?.frame_id;
        if !self.contains(frame_id) && frame_id != frame_id::next(back) {
            return None;
        }
        let released = self.ack_through(frame_id::prev(frame_id), pool);
        self.rewind();
        Some(released)
    }

    /// Return every sent frame to pending, keeping the frame ids. Returns the
    /// number of frames rewound.
    pub fn rewind(&mut self) -> usize {
        let mut rewound = 0;
        for frame in &mut self.frames {
            if frame.state == FrameState::Sent {
                frame.state = FrameState::Pending;
                rewound += 1;
            }
        }
        rewound
    }

    /// Release every frame.
    pub fn clear(&mut self, pool: &mut BufferPool) {
        for frame in self.frames.drain(..) {
            pool.release(frame.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FRAME_MAX_SIZE, construct_data};

    fn fill(pool: &mut BufferPool, window: &mut TxWindow, ids: impl IntoIterator<Item = u16>) {
        for id in ids {
            let mut buffer = pool.acquire().unwrap();
            let bytes = construct_data(id, 0, &[id as u8]).unwrap();
            buffer.as_mut_slice()[..bytes.len()].copy_from_slice(&bytes);
            buffer.set_len(bytes.len());
            window.push(id, buffer);
        }
    }

    fn send_all(window: &mut TxWindow, now: u64) {
        while let Some(frame) = window.next_pending() {
            frame.mark_sent(now);
        }
    }

    #[test]
    fn cumulative_ack_releases_prefix() {
        let mut pool = BufferPool::new(FRAME_MAX_SIZE, 8);
        let mut window = TxWindow::new(8);
        fill(&mut pool, &mut window, 0..5);
        send_all(&mut window, 10);
        assert_eq!(pool.available(), 3);

        assert_eq!(window.ack_through(2, &mut pool), 3);
        assert_eq!(window.len(), 2);
        assert_eq!(window.front().unwrap().frame_id(), 3);
        assert_eq!(pool.available(), 6);

        // stale and future acks
        assert_eq!(window.ack_through(1, &mut pool), 0);
        assert_eq!(window.ack_through(9, &mut pool), 0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn ack_across_wrap() {
        let mut pool = BufferPool::new(FRAME_MAX_SIZE, 8);
        let mut window = TxWindow::new(8);
        fill(&mut pool, &mut window, [2046, 2047, 0, 1]);
        assert!(window.contains(2047));
        assert!(window.contains(1));
        assert!(!window.contains(2));
        assert_eq!(window.ack_through(0, &mut pool), 3);
        assert_eq!(window.front().unwrap().frame_id(), 1);
    }

    #[test]
    fn ack_one_removes_single_frame() {
        let mut pool = BufferPool::new(FRAME_MAX_SIZE, 4);
        let mut window = TxWindow::new(4);
        fill(&mut pool, &mut window, 0..3);
        assert!(window.ack_one(1, &mut pool));
        assert!(!window.ack_one(1, &mut pool));
        let ids: Vec<u16> = window.frames.iter().map(TxFrame::frame_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn nack_releases_and_rewinds() {
        let mut pool = BufferPool::new(FRAME_MAX_SIZE, 8);
        let mut window = TxWindow::new(8);
        fill(&mut pool, &mut window, 0..5);
        send_all(&mut window, 1);
        assert!(!window.has_pending());

        assert_eq!(window.nack(2, &mut pool), Some(2));
        assert_eq!(window.len(), 3);
        let frame = window.next_pending().unwrap();
        assert_eq!(frame.frame_id(), 2);
        assert_eq!(frame.attempts(), 1);

        // outside the window
        assert_eq!(window.nack(1, &mut pool), None);
        assert_eq!(window.nack(7, &mut pool), None);
        // one past the newest means everything arrived
        assert_eq!(window.nack(5, &mut pool), Some(3));
        assert!(window.is_empty());
    }

    #[test]
    fn sent_prefix_and_timeout_view() {
        let mut pool = BufferPool::new(FRAME_MAX_SIZE, 4);
        let mut window = TxWindow::new(2);
        fill(&mut pool, &mut window, 0..2);
        assert!(window.is_full());
        assert!(window.oldest_sent().is_none());

        window.next_pending().unwrap().mark_sent(42);
        assert_eq!(window.oldest_sent().unwrap().sent_at(), 42);
        assert!(window.has_pending());

        assert_eq!(window.rewind(), 1);
        assert!(window.oldest_sent().is_none());

        window.clear(&mut pool);
        assert!(window.is_empty());
        assert_eq!(pool.available(), 4);
    }
}
