//! Receive-side frame id tracking.

use tracing::trace;

use crate::protocol::frame_id;

/// How an incoming DATA frame relates to the expected id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxDisposition {
    /// The expected frame: deliver it.
    Accept,
    /// Already delivered. Re-acknowledge so the sender can drop it.
    Duplicate,
    /// Ahead of the expected frame, within the receive window. `nack` is set
    /// for the first such frame per expected id.
    Future {
        /// Whether a NACK should be sent.
        nack: bool,
    },
    /// Too far ahead to be meaningful.
    OutOfWindow,
}

/// Next expected frame id plus NACK de-duplication.
#[derive(Debug, Clone)]
pub struct RxTracker {
    expected: u16,
    window: i32,
    nacked: Option<u16>,
}

impl RxTracker {
    /// Create a tracker accepting future frames up to `window` ids ahead.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            expected: 0,
            window: i32::try_from(window).unwrap_or(i32::MAX),
            nacked: None,
        }
    }

    /// Next expected frame id.
    #[must_use]
    pub const fn expected(&self) -> u16 {
        self.expected
    }

    /// Most recently delivered frame id.
    #[must_use]
    pub const fn last_delivered(&self) -> u16 {
        frame_id::prev(self.expected)
    }

    /// Classify `frame_id` against the expected id.
    pub fn classify(&mut self, frame_id: u16) -> RxDisposition {
        let distance = frame_id::subtract(frame_id, self.expected);
        let disposition = match distance {
            0 => RxDisposition::Accept,
            d if d < 0 => RxDisposition::Duplicate,
            d if d <= self.window => RxDisposition::Future {
                nack: self.claim_nack(),
            },
            _ => RxDisposition::OutOfWindow,
        };
        trace!(
            frame_id,
            expected = self.expected,
            ?disposition,
            "rx frame classified"
        );
        disposition
    }

    /// Advance past the expected frame, returning the id to acknowledge.
    pub fn accept(&mut self) -> u16 {
        let delivered = self.expected;
        self.expected = frame_id::next(self.expected);
        self.nacked = None;
        delivered
    }

    /// Record that a NACK naming the expected id is being sent. Returns `false`
    /// when one was already sent.
    pub fn claim_nack(&mut self) -> bool {
        if self.nacked == Some(self.expected) {
            return false;
        }
        self.nacked = Some(self.expected);
        true
    }

    /// Return to frame id 0.
    pub fn reset(&mut self) {
        self.expected = 0;
        self.nacked = None;
    }
}
