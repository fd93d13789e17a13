//! Per-port reassembly of segmented messages.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use super::ports::{PortHandler, PortTx};
use crate::datalink::LinkEvent;
use crate::protocol::{Error, Result, Seq};

/// Accumulates START, MIDDLE*, STOP segments into one message.
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    max_len: usize,
    active: bool,
}

impl Reassembler {
    /// Accept messages of at most `max_len` bytes.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_len,
            active: false,
        }
    }

    /// Whether a message is partially assembled.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Drop any partial message.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.active = false;
    }

    /// Feed one segment, returning the message once complete.
    ///
    /// A START or SINGLE arriving mid-message abandons the partial message.
    ///
    /// # Errors
    ///
    /// - `UnexpectedSequence` for MIDDLE or STOP without a preceding START
    /// - `TooBig` when the message would exceed the configured maximum
    pub fn push(&mut self, seq: Seq, payload: &[u8]) -> Result<Option<Bytes>> {
        if seq.is_start() {
            if self.active {
                debug!(dropped = self.buf.len(), "new message before STOP, dropping partial");
            }
            self.clear();
            self.active = true;
        } else if !self.active {
            return Err(Error::UnexpectedSequence { seq });
        }

        let size = self.buf.len() + payload.len();
        if size > self.max_len {
            self.clear();
            return Err(Error::TooBig {
                size,
                max: self.max_len,
            });
        }
        self.buf.extend_from_slice(payload);

        if seq.is_stop() {
            self.active = false;
            return Ok(Some(self.buf.split().freeze()));
        }
        Ok(None)
    }
}

/// Port handler that reassembles messages and passes each complete one to a
/// closure along with the port id and port data of its first segment.
pub struct MessagePort<F> {
    reassembler: Reassembler,
    port_data: u16,
    on_message: F,
}

impl<F> MessagePort<F>
where
    F: FnMut(&mut PortTx<'_>, u8, u16, Bytes),
{
    /// Wrap `on_message`, accepting messages up to `max_len` bytes.
    pub fn new(max_len: usize, on_message: F) -> Self {
        Self {
            reassembler: Reassembler::new(max_len),
            port_data: 0,
            on_message,
        }
    }
}

impl<F> PortHandler for MessagePort<F>
where
    F: FnMut(&mut PortTx<'_>, u8, u16, Bytes) + Send,
{
    fn on_event(&mut self, _tx: &mut PortTx<'_>, event: LinkEvent) {
        if event == LinkEvent::Reset {
            self.reassembler.clear();
        }
    }

    fn on_recv(
        &mut self,
        tx: &mut PortTx<'_>,
        port_id: u8,
        seq: Seq,
        port_data: u16,
        payload: &[u8],
    ) {
        if seq.is_start() {
            self.port_data = port_data;
        }
        match self.reassembler.push(seq, payload) {
            Ok(Some(message)) => (self.on_message)(tx, port_id, self.port_data, message),
            Ok(None) => {}
            Err(err) => debug!(port_id, error = %err, "dropping segment"),
        }
    }
}
