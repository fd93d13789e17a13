//! Port handlers and the registration table.

use std::fmt;

use tracing::{debug, trace};

use super::metadata::{PORT_COUNT, PortMetadata};
use crate::datalink::{LinkEvent, LinkStatus, LinkTx, UpperLayer};
use crate::protocol::{Error, PAYLOAD_MAX, Result, Seq};

/// Handler bound to one port.
///
/// Handlers are `Send` so a whole [`Transport`](super::Transport) can move
/// behind a mutex into an I/O thread.
pub trait PortHandler: Send {
    /// A link event, fanned out to every registered port.
    fn on_event(&mut self, tx: &mut PortTx<'_>, event: LinkEvent) {
        let _ = (tx, event);
    }

    /// A frame addressed to this port.
    fn on_recv(
        &mut self,
        tx: &mut PortTx<'_>,
        port_id: u8,
        seq: Seq,
        port_data: u16,
        payload: &[u8],
    );
}

/// Sending context passed to port handlers.
pub struct PortTx<'a> {
    link: &'a mut dyn LinkTx,
    meta: &'a [Option<String>],
}

impl<'a> PortTx<'a> {
    pub(crate) fn new(link: &'a mut dyn LinkTx, meta: &'a [Option<String>]) -> Self {
        Self { link, meta }
    }

    /// Send one frame on `port_id`.
    pub fn send(&mut self, port_id: u8, seq: Seq, port_data: u16, payload: &[u8]) -> Result<()> {
        send_frame(self.link, port_id, seq, port_data, payload)
    }

    /// Send a message of any length, segmented as needed.
    pub fn send_message(&mut self, port_id: u8, port_data: u16, message: &[u8]) -> Result<()> {
        send_segmented(self.link, port_id, port_data, message)
    }

    /// Link counters.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Link clock in milliseconds.
    #[must_use]
    pub fn time_ms(&self) -> u64 {
        self.link.time_ms()
    }

    /// Frames the link would accept right now.
    #[must_use]
    pub fn send_capacity(&self) -> usize {
        self.link.send_capacity()
    }

    /// Metadata registered for `port_id`.
    #[must_use]
    pub fn port_meta(&self, port_id: u8) -> Option<&str> {
        self.meta
            .get(usize::from(port_id))
            .and_then(|meta| meta.as_deref())
    }
}

impl fmt::Debug for PortTx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortTx").finish_non_exhaustive()
    }
}

pub(crate) fn send_frame(
    link: &mut dyn LinkTx,
    port_id: u8,
    seq: Seq,
    port_data: u16,
    payload: &[u8],
) -> Result<()> {
    let metadata = PortMetadata::new(port_id, seq, port_data)?;
    link.send(metadata.pack(), payload)
}

/// Split `message` into SINGLE or START, MIDDLE*, STOP frames.
///
/// Nothing is sent unless the link can take every segment.
pub(crate) fn send_segmented(
    link: &mut dyn LinkTx,
    port_id: u8,
    port_data: u16,
    message: &[u8],
) -> Result<()> {
    if message.is_empty() {
        return Err(Error::EmptyPayload);
    }
    PortMetadata::new(port_id, Seq::Single, port_data)?;
    let segments = message.len().div_ceil(PAYLOAD_MAX);
    let available = link.send_capacity();
    if segments > available {
        return Err(Error::Full {
            needed: segments,
            available,
        });
    }
    trace!(port_id, len = message.len(), segments, "sending message");

    let last = segments - 1;
    for (index, chunk) in message.chunks(PAYLOAD_MAX).enumerate() {
        let seq = match (index == 0, index == last) {
            (true, true) => Seq::Single,
            (true, false) => Seq::Start,
            (false, true) => Seq::Stop,
            (false, false) => Seq::Middle,
        };
        send_frame(link, port_id, seq, port_data, chunk)?;
    }
    Ok(())
}

/// Registered handlers plus their metadata, indexed by port id.
pub(crate) struct PortTable {
    handlers: Vec<Option<Box<dyn PortHandler>>>,
    meta: Vec<Option<String>>,
    unrouted: u64,
}

impl PortTable {
    pub(crate) fn new() -> Self {
        Self {
            handlers: (0..PORT_COUNT).map(|_| None).collect(),
            meta: vec![None; PORT_COUNT],
            unrouted: 0,
        }
    }

    /// Install `handler` on `port_id`, replacing any earlier registration.
    pub(crate) fn register(
        &mut self,
        port_id: u8,
        meta: Option<String>,
        handler: Box<dyn PortHandler>,
    ) -> Result<()> {
        let index = usize::from(port_id);
        if index >= PORT_COUNT {
            return Err(Error::InvalidPortId { port_id });
        }
        if self.handlers[index].is_some() {
            debug!(port_id, "replacing port handler");
        }
        self.handlers[index] = Some(handler);
        self.meta[index] = meta;
        Ok(())
    }

    pub(crate) fn is_registered(&self, port_id: u8) -> bool {
        self.handlers
            .get(usize::from(port_id))
            .is_some_and(Option::is_some)
    }

    pub(crate) fn meta(&self, port_id: u8) -> Option<&str> {
        self.meta
            .get(usize::from(port_id))
            .and_then(|meta| meta.as_deref())
    }

    pub(crate) const fn unrouted(&self) -> u64 {
        self.unrouted
    }

    /// Deliver `event` to every handler in port-id order.
    pub(crate) fn fan_out(&mut self, link: &mut dyn LinkTx, event: LinkEvent) {
        for handler in self.handlers.iter_mut().flatten() {
            let mut tx = PortTx::new(&mut *link, &self.meta);
            handler.on_event(&mut tx, event);
        }
    }
}

impl UpperLayer for PortTable {
    fn on_event(&mut self, link: &mut dyn LinkTx, event: LinkEvent) {
        debug!(?event, "link event");
        self.fan_out(link, event);
    }

    fn on_recv(&mut self, link: &mut dyn LinkTx, metadata: u32, payload: &[u8]) {
        let meta = PortMetadata::unpack(metadata);
        let port_id = meta.port_id();
        let Some(handler) = self
            .handlers
            .get_mut(usize::from(port_id))
            .and_then(Option::as_mut)
        else {
            self.unrouted += 1;
            debug!(port_id, len = payload.len(), "no handler for port, dropping");
            return;
        };
        let mut tx = PortTx::new(link, &self.meta);
        handler.on_recv(&mut tx, port_id, meta.seq(), meta.port_data(), payload);
    }
}

impl fmt::Debug for PortTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<usize> = self
            .handlers
            .iter()
            .enumerate()
            .filter_map(|(port_id, handler)| handler.as_ref().map(|_| port_id))
            .collect();
        f.debug_struct("PortTable")
            .field("registered", &registered)
            .field("unrouted", &self.unrouted)
            .finish()
    }
}
