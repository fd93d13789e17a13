//! Reliable delivery over the byte framer.
//!
//! [`DataLink`] assigns frame ids, keeps sent frames until they are
//! acknowledged, answers incoming DATA frames with ACK/NACK link frames and
//! retransmits on NACK or timeout. It never blocks: bytes arrive through
//! [`DataLink::ll_recv`], time advances through [`DataLink::process`], and all
//! output goes to the [`LowerLevel`] driver as soon as it reports space.
//!
//! Delivery upward is strictly in frame-id order. Frames that arrive ahead of
//! the expected id are not buffered; the receiver NACKs the expected id and the
//! sender resends everything from that point.

use std::collections::VecDeque;

use tracing::{debug, instrument, trace, warn};

use super::buffer::BufferPool;
use super::config::DataLinkConfig;
use super::driver::LowerLevel;
use super::receive::{RxDisposition, RxTracker};
use super::status::LinkStatus;
use super::window::TxWindow;
use crate::protocol::{
    DataFrame, Error, FRAME_MAX_SIZE, FrameType, Framer, FramerHandler, FramerStatus, LINK_SIZE,
    LinkFrame, METADATA_MAX, PAYLOAD_MAX, Result, construct_link, encode_data, frame_id,
};

/// Frame id of a RESET request.
const RESET_REQUEST: u16 = 0;
/// Frame id of a RESET response.
const RESET_RESPONSE: u16 = 1;

/// Link-level events reported to the upper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkEvent {
    /// The link state was cleared, by the peer or locally.
    Reset,
    /// The peer answered: a reset handshake completed or acknowledgements resumed.
    Connected,
    /// The oldest frame exhausted its retries.
    Disconnected,
}

/// Sending half of a data link, handed to upper-layer callbacks.
pub trait LinkTx {
    /// Queue one DATA frame.
    fn send(&mut self, metadata: u32, payload: &[u8]) -> Result<()>;

    /// Counter snapshot.
    fn status(&self) -> LinkStatus;

    /// Driver clock in milliseconds.
    fn time_ms(&self) -> u64;

    /// DATA frames that `send` would accept right now.
    fn send_capacity(&self) -> usize;
}

/// Consumer of delivered frames and link events.
pub trait UpperLayer {
    /// A link event occurred.
    fn on_event(&mut self, link: &mut dyn LinkTx, event: LinkEvent);

    /// A DATA frame was delivered in order.
    fn on_recv(&mut self, link: &mut dyn LinkTx, metadata: u32, payload: &[u8]);
}

/// Reliable framed link over a [`LowerLevel`] driver.
#[derive(Debug)]
pub struct DataLink<L> {
    framer: Framer,
    core: LinkCore<L>,
}

#[derive(Debug)]
struct LinkCore<L> {
    config: DataLinkConfig,
    driver: L,
    pool: BufferPool,
    window: TxWindow,
    rx: RxTracker,
    tx_frame_id: u16,
    link_queue: VecDeque<LinkFrame>,
    link_capacity: usize,
    status: LinkStatus,
    disconnected: bool,
}

impl<L: LowerLevel> DataLink<L> {
    /// Build a link after validating `config`.
    pub fn new(config: DataLinkConfig, driver: L) -> Result<Self> {
        config.validate()?;
        let framer = Framer::with_capacity(config.rx_buffer_size);
        let core = LinkCore {
            pool: BufferPool::new(FRAME_MAX_SIZE, config.tx_blocks()),
            window: TxWindow::new(config.tx_window_size),
            rx: RxTracker::new(config.rx_window_size),
            link_queue: VecDeque::with_capacity(config.tx_link_frames()),
            link_capacity: config.tx_link_frames(),
            tx_frame_id: 0,
            status: LinkStatus::default(),
            disconnected: false,
            config,
            driver,
        };
        Ok(Self { framer, core })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DataLinkConfig {
        &self.core.config
    }

    /// The driver.
    #[must_use]
    pub const fn driver(&self) -> &L {
        &self.core.driver
    }

    /// Mutable access to the driver.
    pub fn driver_mut(&mut self) -> &mut L {
        &mut self.core.driver
    }

    /// Counter snapshot.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        let mut status = self.core.status;
        status.merge_framer(self.framer.status());
        status
    }

    /// DATA frames queued or awaiting acknowledgement.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.core.window.len()
    }

    /// Frame id the next `send` will use.
    #[must_use]
    pub const fn tx_frame_id(&self) -> u16 {
        self.core.tx_frame_id
    }

    /// Frame id expected from the peer.
    #[must_use]
    pub const fn rx_frame_id(&self) -> u16 {
        self.core.rx.expected()
    }

    /// Whether retries have been exhausted without a fresh acknowledgement.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.core.disconnected
    }

    /// Queue one DATA frame and transmit it if the driver has room.
    ///
    /// # Errors
    ///
    /// - `TooBig` / `EmptyPayload` for payloads outside 1..=256 bytes
    /// - `InvalidMetadata` for metadata wider than 24 bits
    /// - `Full` when the transmit window is exhausted
    /// - `NotEnoughMemory` when no transmit block is free
    pub fn send(&mut self, metadata: u32, payload: &[u8]) -> Result<()> {
        self.core.send_data(metadata, payload)
    }

    /// DATA frames `send` would accept right now.
    #[must_use]
    pub fn send_capacity(&self) -> usize {
        self.core.send_capacity()
    }

    /// Feed bytes received from the driver.
    #[instrument(level = "trace", skip_all, fields(len = data.len()))]
    pub fn ll_recv<U: UpperLayer + ?Sized>(&mut self, data: &[u8], upper: &mut U) {
        let mut dispatch = Dispatch {
            core: &mut self.core,
            upper,
        };
        self.framer.recv(data, &mut dispatch);
        self.core.status.merge_framer(self.framer.status());
        self.core.flush();
    }

    /// Transmit whatever the driver has room for and retransmit on timeout.
    pub fn process<U: UpperLayer + ?Sized>(&mut self, upper: &mut U) {
        self.core.flush();
        self.core.check_timeout(upper);
    }

    /// Milliseconds until [`DataLink::process`] has work to do.
    #[must_use]
    pub fn service_interval_ms(&self) -> u64 {
        self.core.service_interval_ms()
    }

    /// Clear all link state and ask the peer to do the same.
    ///
    /// Queued frames are discarded and the counters restart from zero.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&mut self) {
        self.framer.reset();
        self.framer.clear_status();
        self.core.clear();
        self.core.status = LinkStatus::default();
        self.core.disconnected = false;
        self.core.queue_link(FrameType::Reset, RESET_REQUEST);
        self.core.flush();
    }
}

impl<L: LowerLevel> LinkCore<L> {
    #[instrument(level = "trace", skip(self, payload), fields(len = payload.len()))]
    fn send_data(&mut self, metadata: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > PAYLOAD_MAX {
            return Err(Error::TooBig {
                size: payload.len(),
                max: PAYLOAD_MAX,
            });
        }
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        if metadata > METADATA_MAX {
            return Err(Error::InvalidMetadata { metadata });
        }
        if self.window.is_full() {
            return Err(Error::Full {
                needed: 1,
                available: 0,
            });
        }
        let Some(mut buffer) = self.pool.acquire() else {
            return Err(Error::NotEnoughMemory);
        };

        let frame_id = self.tx_frame_id;
        match encode_data(frame_id, metadata, payload, buffer.as_mut_slice()) {
            Ok(len) => buffer.set_len(len),
            Err(err) => {
                self.pool.release(buffer);
                return Err(err);
            }
        }
        self.window.push(frame_id, buffer);
        self.tx_frame_id = frame_id::next(frame_id);
        self.flush();
        Ok(())
    }

    fn send_capacity(&self) -> usize {
        self.window.remaining().min(self.pool.available())
    }

    /// Hand queued link frames, then pending DATA frames, to the driver.
    fn flush(&mut self) {
        while let Some(&link) = self.link_queue.front() {
            if self.driver.send_available() < LINK_SIZE {
                return;
            }
            self.link_queue.pop_front();
            match construct_link(link.frame_type, link.frame_id) {
                Ok(bytes) => {
                    trace!(
                        frame_type = %link.frame_type,
                        frame_id = link.frame_id,
                        "tx link frame"
                    );
                    self.driver.send(&bytes);
                    self.status.tx.bytes += LINK_SIZE as u64;
                    self.status.tx.link_frames += 1;
                }
                Err(err) => debug!(error = %err, "dropping unencodable link frame"),
            }
        }

        let now = self.driver.time_ms();
        while let Some(frame) = self.window.next_pending() {
            let len = frame.bytes().len();
            if self.driver.send_available() < len {
                break;
            }
            if frame.attempts() > 0 {
                self.status.tx.retransmissions += 1;
                trace!(
                    frame_id = frame.frame_id(),
                    attempt = frame.attempts() + 1,
                    "retransmitting"
                );
            }
            self.driver.send(frame.bytes());
            frame.mark_sent(now);
            self.status.tx.bytes += len as u64;
        }
    }

    fn queue_link(&mut self, frame_type: FrameType, frame_id: u16) {
        // a newer cumulative ack supersedes one still waiting
        if frame_type == FrameType::AckAll {
            if let Some(back) = self
                .link_queue
                .back_mut()
                .filter(|back| back.frame_type == FrameType::AckAll)
            {
                back.frame_id = frame_id;
                return;
            }
        }
        if self.link_queue.len() >= self.link_capacity {
            debug!(
                capacity = self.link_capacity,
                "link frame queue full, dropping oldest"
            );
            self.link_queue.pop_front();
        }
        self.link_queue.push_back(LinkFrame {
            frame_type,
            frame_id,
        });
    }

    fn check_timeout<U: UpperLayer + ?Sized>(&mut self, upper: &mut U) {
        let now = self.driver.time_ms();
        let Some(oldest) = self.window.oldest_sent() else {
            return;
        };
        if now.saturating_sub(oldest.sent_at()) < self.config.tx_timeout_ms {
            return;
        }
        let frame_id = oldest.frame_id();
        let attempts = oldest.attempts();

        if attempts >= self.config.max_retries && !self.disconnected {
            self.disconnected = true;
            warn!(frame_id, attempts, "retries exhausted, link disconnected");
            upper.on_event(self, LinkEvent::Disconnected);
        }

        let rewound = self.window.rewind();
        debug!(frame_id, attempts, rewound, "tx timeout");
        self.flush();
    }

    fn service_interval_ms(&self) -> u64 {
        let available = self.driver.send_available();
        let link_ready = !self.link_queue.is_empty() && available >= LINK_SIZE;
        let data_ready = self
            .window
            .first_pending()
            .is_some_and(|frame| available >= frame.bytes().len());
        if link_ready || data_ready {
            return 0;
        }
        match self.window.oldest_sent() {
            Some(frame) => {
                let elapsed = self.driver.time_ms().saturating_sub(frame.sent_at());
                self.config.tx_timeout_ms.saturating_sub(elapsed)
            }
            None => self.config.tx_timeout_ms,
        }
    }

    fn clear(&mut self) {
        self.window.clear(&mut self.pool);
        self.link_queue.clear();
        self.tx_frame_id = 0;
        self.rx.reset();
    }

    fn on_data<U: UpperLayer + ?Sized>(&mut self, frame: DataFrame<'_>, upper: &mut U) {
        match self.rx.classify(frame.frame_id) {
            RxDisposition::Accept => {
                let delivered = self.rx.accept();
                self.status.rx.data_frames += 1;
                self.queue_link(FrameType::AckAll, delivered);
                upper.on_recv(self, frame.metadata, frame.payload);
            }
            RxDisposition::Duplicate => {
                trace!(frame_id = frame.frame_id, "duplicate frame");
                self.queue_link(FrameType::AckAll, self.rx.last_delivered());
            }
            RxDisposition::Future { nack } => {
                self.status.rx.frame_id_errors += 1;
                if nack {
                    let expected = self.rx.expected();
                    debug!(frame_id = frame.frame_id, expected, "out of order, sending NACK");
                    self.queue_link(FrameType::NackFrameId, expected);
                }
            }
            RxDisposition::OutOfWindow => {
                self.status.rx.frame_id_errors += 1;
                debug!(
                    frame_id = frame.frame_id,
                    expected = self.rx.expected(),
                    "frame outside receive window"
                );
            }
        }
    }

    fn on_link<U: UpperLayer + ?Sized>(&mut self, frame: LinkFrame, upper: &mut U) {
        trace!(frame_type = %frame.frame_type, frame_id = frame.frame_id, "rx link frame");
        match frame.frame_type {
            FrameType::AckAll => {
                let released = self.window.ack_through(frame.frame_id, &mut self.pool);
                self.on_acked(released, upper);
            }
            FrameType::AckOne => {
                let released = self.window.ack_one(frame.frame_id, &mut self.pool);
                self.on_acked(usize::from(released), upper);
            }
            FrameType::NackFrameId | FrameType::NackFramingError => {
                match self.window.nack(frame.frame_id, &mut self.pool) {
                    Some(released) => {
                        debug!(
                            frame_type = %frame.frame_type,
                            frame_id = frame.frame_id,
                            released,
                            resend = self.window.len(),
                            "NACK received"
                        );
                        self.on_acked(released, upper);
                    }
                    None => debug!(frame_id = frame.frame_id, "ignoring NACK outside window"),
                }
            }
            FrameType::Reset if frame.frame_id == RESET_REQUEST => {
                debug!("peer requested reset");
                self.clear();
                self.disconnected = false;
                self.queue_link(FrameType::Reset, RESET_RESPONSE);
                upper.on_event(self, LinkEvent::Reset);
                upper.on_event(self, LinkEvent::Connected);
            }
            FrameType::Reset => {
                debug!("peer acknowledged reset");
                self.disconnected = false;
                upper.on_event(self, LinkEvent::Connected);
            }
            FrameType::Data => {}
        }
    }

    fn on_acked<U: UpperLayer + ?Sized>(&mut self, released: usize, upper: &mut U) {
        if released == 0 {
            return;
        }
        self.status.tx.data_frames += released as u64;
        if self.disconnected {
            self.disconnected = false;
            debug!("acknowledgements resumed");
            upper.on_event(self, LinkEvent::Connected);
        }
    }

    fn on_framing_error(&mut self) {
        self.rx.claim_nack();
        let expected = self.rx.expected();
        debug!(expected, "framing error, sending NACK");
        self.queue_link(FrameType::NackFramingError, expected);
    }
}

impl<L: LowerLevel> LinkTx for LinkCore<L> {
    fn send(&mut self, metadata: u32, payload: &[u8]) -> Result<()> {
        self.send_data(metadata, payload)
    }

    fn status(&self) -> LinkStatus {
        self.status
    }

    fn time_ms(&self) -> u64 {
        self.driver.time_ms()
    }

    fn send_capacity(&self) -> usize {
        LinkCore::send_capacity(self)
    }
}

impl<L: LowerLevel> LinkTx for DataLink<L> {
    fn send(&mut self, metadata: u32, payload: &[u8]) -> Result<()> {
        self.core.send_data(metadata, payload)
    }

    fn status(&self) -> LinkStatus {
        DataLink::status(self)
    }

    fn time_ms(&self) -> u64 {
        self.core.driver.time_ms()
    }

    fn send_capacity(&self) -> usize {
        self.core.send_capacity()
    }
}

/// Routes framer output into the link core and on to the upper layer.
struct Dispatch<'a, L, U: ?Sized> {
    core: &'a mut LinkCore<L>,
    upper: &'a mut U,
}

impl<L: LowerLevel, U: UpperLayer + ?Sized> FramerHandler for Dispatch<'_, L, U> {
    fn on_data(&mut self, frame: DataFrame<'_>) {
        self.core.on_data(frame, self.upper);
    }

    fn on_link(&mut self, frame: LinkFrame) {
        self.core.on_link(frame, self.upper);
    }

    fn on_framing_error(&mut self) {
        self.core.on_framing_error();
    }

    fn on_status(&mut self, status: &FramerStatus) {
        self.core.status.merge_framer(status);
    }
}
