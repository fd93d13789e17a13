//! Byte-stream deframer with automatic resynchronization.
//!
//! The framer keeps the bytes of the current candidate frame in a fixed
//! buffer. `pos` is how far the state machine has examined that buffer. When a
//! candidate turns out to be bogus (bad type, bad CRC) the first byte is
//! dropped and the remaining buffered bytes are examined again, which recovers
//! from SOF sentinels that happened to appear inside payload data.

use tracing::{debug, trace};

use super::codec::crc_matches;
use super::{
    DataFrame, DataHeader, FOOTER_SIZE, FRAME_MAX_SIZE, FrameType, HEADER_SIZE, LINK_SIZE,
    LinkFrame, LinkHeader, SOF1, SOF2,
};

/// Receiver of framer output.
pub trait FramerHandler {
    /// A DATA frame passed CRC validation.
    fn on_data(&mut self, frame: DataFrame<'_>);

    /// A link frame passed CRC validation.
    fn on_link(&mut self, frame: LinkFrame);

    /// Byte sync was lost. Called once per loss of sync, not once per byte,
    /// including garbage seen before the first valid frame.
    fn on_framing_error(&mut self);

    /// Counters as of the event about to be reported. Called before every
    /// other callback.
    fn on_status(&mut self, status: &FramerStatus) {
        let _ = status;
    }
}

/// Receive-side counters maintained by the framer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FramerStatus {
    /// Bytes fed into the framer
    pub bytes: u64,
    /// Valid DATA frames
    pub data_frames: u64,
    /// Valid link frames
    pub link_frames: u64,
    /// Candidates rejected by CRC, or by an invalid type code after a SOF pair
    pub crc_errors: u64,
    /// Losses of sync reported to the handler
    pub resync: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for SOF1 then SOF2
    SearchSof,
    /// Both sentinels seen, next byte carries the type
    SearchFrameType,
    /// Collecting the fixed eight-byte prefix
    StoreHeader,
    /// Collecting DATA payload and CRC
    StoreRemainder,
}

/// Incremental RX deframer.
#[derive(Debug)]
pub struct Framer {
    buf: Box<[u8]>,
    len: usize,
    pos: usize,
    frame_len: usize,
    state: State,
    is_sync: bool,
    /// Current loss of sync was already reported
    reported: bool,
    status: FramerStatus,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create a framer able to hold one maximum-size frame.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(FRAME_MAX_SIZE)
    }

    /// Create a framer with a staging buffer of `capacity` bytes.
    ///
    /// Capacities below one maximum-size frame are raised to it.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(FRAME_MAX_SIZE)].into_boxed_slice(),
            len: 0,
            pos: 0,
            frame_len: 0,
            state: State::SearchSof,
            is_sync: false,
            reported: false,
            status: FramerStatus::default(),
        }
    }

    /// Counters since construction or the last [`Framer::clear_status`].
    #[must_use]
    pub const fn status(&self) -> &FramerStatus {
        &self.status
    }

    /// Zero the counters.
    pub fn clear_status(&mut self) {
        self.status = FramerStatus::default();
    }

    /// Whether the last event was a valid frame rather than a framing error.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        self.is_sync
    }

    /// Drop any partial frame and return to SOF search.
    ///
    /// Unlike a detected corruption this never reports a framing error.
    pub fn reset(&mut self) {
        self.len = 0;
        self.pos = 0;
        self.frame_len = 0;
        self.state = State::SearchSof;
        self.is_sync = false;
        self.reported = false;
    }

    /// Feed received bytes. Partial frames persist across calls.
    pub fn recv<H: FramerHandler + ?Sized>(&mut self, data: &[u8], handler: &mut H) {
        self.status.bytes += data.len() as u64;
        for &byte in data {
            // Each byte is fully examined before the next is stored, so the
            // buffered candidate never exceeds one frame.
            self.buf[self.len] = byte;
            self.len += 1;
            self.scan(handler);
        }
    }

    fn scan<H: FramerHandler + ?Sized>(&mut self, handler: &mut H) {
        while self.pos < self.len {
            let byte = self.buf[self.pos];
            match self.state {
                State::SearchSof => self.search_sof(byte, handler),
                State::SearchFrameType => self.search_frame_type(byte, handler),
                State::StoreHeader => {
                    self.pos += 1;
                    if self.pos == HEADER_SIZE {
                        self.header_complete(handler);
                    }
                }
                State::StoreRemainder => {
                    self.pos += 1;
                    if self.pos == self.frame_len {
                        self.data_complete(handler);
                    }
                }
            }
        }
    }

    fn search_sof<H: FramerHandler + ?Sized>(&mut self, byte: u8, handler: &mut H) {
        match self.pos {
            0 if byte == SOF1 => self.pos = 1,
            0 => {
                self.desync(handler);
                self.discard(1);
            }
            _ if byte == SOF2 => {
                self.pos = 2;
                self.state = State::SearchFrameType;
            }
            // repeated SOF1 is idle filler; anything else is rescanned from pos 0
            _ => self.discard(1),
        }
    }

    fn search_frame_type<H: FramerHandler + ?Sized>(&mut self, byte: u8, handler: &mut H) {
        if byte == SOF1 {
            self.discard(2);
            return;
        }
        if FrameType::from_code(byte >> 3).is_some() {
            self.pos += 1;
            self.frame_len = HEADER_SIZE;
            self.state = State::StoreHeader;
        } else {
            // the type byte is covered by the CRC
            self.status.crc_errors += 1;
            trace!(byte, "invalid frame type");
            self.desync(handler);
            self.discard(1);
        }
    }

    fn header_complete<H: FramerHandler + ?Sized>(&mut self, handler: &mut H) {
        if let Ok(link) = LinkHeader::from_bytes(&self.buf[..LINK_SIZE]) {
            if crc_matches(&self.buf[2..4], &self.buf[4..LINK_SIZE]) {
                self.status.link_frames += 1;
                self.synced();
                handler.on_status(&self.status);
                handler.on_link(LinkFrame {
                    frame_type: link.frame_type(),
                    frame_id: link.frame_id(),
                });
                self.discard(LINK_SIZE);
            } else {
                self.crc_error();
            }
            return;
        }

        match DataHeader::from_bytes(&self.buf[..HEADER_SIZE]) {
            Ok(header) => {
                self.frame_len = header.frame_len();
                self.state = State::StoreRemainder;
            }
            // unreachable given the type check in SearchFrameType
            Err(_) => self.discard(1),
        }
    }

    fn data_complete<H: FramerHandler + ?Sized>(&mut self, handler: &mut H) {
        let end = self.frame_len;
        let payload_end = end - FOOTER_SIZE;
        if !crc_matches(&self.buf[2..payload_end], &self.buf[payload_end..end]) {
            self.crc_error();
            return;
        }
        let Ok(header) = DataHeader::from_bytes(&self.buf[..HEADER_SIZE]) else {
            self.discard(1);
            return;
        };
        self.status.data_frames += 1;
        self.synced();
        handler.on_status(&self.status);
        handler.on_data(DataFrame {
            frame_id: header.frame_id(),
            metadata: header.metadata(),
            payload: &self.buf[HEADER_SIZE..payload_end],
        });
        self.discard(end);
    }

    fn crc_error(&mut self) {
        self.status.crc_errors += 1;
        debug!(
            frame_len = self.frame_len,
            crc_errors = self.status.crc_errors,
            "frame failed CRC, rescanning"
        );
        self.discard(1);
    }

    fn synced(&mut self) {
        self.is_sync = true;
        self.reported = false;
    }

    fn desync<H: FramerHandler + ?Sized>(&mut self, handler: &mut H) {
        self.is_sync = false;
        if !self.reported {
            self.reported = true;
            self.status.resync += 1;
            debug!(resync = self.status.resync, "framer lost sync");
            handler.on_status(&self.status);
            handler.on_framing_error();
        }
    }

    /// Drop `n` leading bytes and restart the search over what remains.
    fn discard(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
        self.pos = 0;
        self.frame_len = 0;
        self.state = State::SearchSof;
    }
}
