//! Port-multiplexing transport over a data link.

use tracing::{debug, instrument};

use super::metadata::PORT_MAX;
use super::port0::{PORT0, PORT0_META, Port0, Port0Op, Port0Response, port0_data};
use super::ports::{PortHandler, PortTable, send_frame, send_segmented};
use crate::datalink::{DataLink, DataLinkConfig, LinkEvent, LinkStatus, LowerLevel};
use crate::protocol::{Error, PAYLOAD_MAX, Result, Seq};

/// Up to 64 logical ports sharing one [`DataLink`].
///
/// Port 0 is registered at construction and answers the service requests
/// described in [`port0`](super::port0).
#[derive(Debug)]
pub struct Transport<L> {
    link: DataLink<L>,
    ports: PortTable,
}

impl<L: LowerLevel> Transport<L> {
    /// Build the data link and register port 0.
    pub fn new(config: DataLinkConfig, driver: L) -> Result<Self> {
        let link = DataLink::new(config, driver)?;
        let mut ports = PortTable::new();
        ports.register(PORT0, Some(PORT0_META.to_owned()), Box::new(Port0::new()))?;
        Ok(Self { link, ports })
    }

    /// Install `handler` on `port_id`. A later registration replaces an
    /// earlier one.
    ///
    /// `meta` is the JSON description served to peers by port 0 and must fit
    /// in one frame.
    pub fn port_register<H>(&mut self, port_id: u8, meta: Option<&str>, handler: H) -> Result<()>
    where
        H: PortHandler + 'static,
    {
        if port_id > PORT_MAX {
            return Err(Error::InvalidPortId { port_id });
        }
        if let Some(meta) = meta {
            if meta.len() > PAYLOAD_MAX {
                return Err(Error::TooBig {
                    size: meta.len(),
                    max: PAYLOAD_MAX,
                });
            }
        }
        debug!(port_id, "port registered");
        self.ports
            .register(port_id, meta.map(str::to_owned), Box::new(handler))
    }

    /// Report port 0 responses to `listener`.
    pub fn set_port0_listener(&mut self, listener: impl FnMut(Port0Response) + Send + 'static) {
        let meta = self.ports.meta(PORT0).map(str::to_owned);
        let registered = self
            .ports
            .register(PORT0, meta, Box::new(Port0::with_listener(listener)));
        debug_assert!(registered.is_ok(), "port 0 is always in range");
    }

    /// Send one frame on `port_id`.
    #[instrument(level = "trace", skip(self, payload), fields(len = payload.len()))]
    pub fn send(&mut self, port_id: u8, seq: Seq, port_data: u16, payload: &[u8]) -> Result<()> {
        send_frame(&mut self.link, port_id, seq, port_data, payload)
    }

    /// Send a message of any length, segmented into frames of at most 256
    /// bytes. Fails with `Full` before sending anything if the link cannot
    /// take every segment.
    #[instrument(level = "trace", skip(self, message), fields(len = message.len()))]
    pub fn send_message(&mut self, port_id: u8, port_data: u16, message: &[u8]) -> Result<()> {
        send_segmented(&mut self.link, port_id, port_data, message)
    }

    /// Send a port 0 request. An empty body is sent as one zero byte.
    pub fn port0_request(&mut self, op: Port0Op, arg: u8, body: &[u8]) -> Result<()> {
        let body = if body.is_empty() { &[0u8][..] } else { body };
        self.send(PORT0, Seq::Single, port0_data(op, false, arg), body)
    }

    /// Feed bytes received from the driver.
    pub fn ll_recv(&mut self, data: &[u8]) {
        self.link.ll_recv(data, &mut self.ports);
    }

    /// Periodic tick. See [`DataLink::process`].
    pub fn process(&mut self) {
        self.link.process(&mut self.ports);
    }

    /// Milliseconds until [`Transport::process`] has work to do.
    #[must_use]
    pub fn service_interval_ms(&self) -> u64 {
        self.link.service_interval_ms()
    }

    /// Reset the link and tell every port.
    pub fn reset(&mut self) {
        self.link.reset();
        self.ports.fan_out(&mut self.link, LinkEvent::Reset);
    }

    /// Link counters.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Messages dropped because no handler was registered for their port.
    #[must_use]
    pub const fn unrouted(&self) -> u64 {
        self.ports.unrouted()
    }

    /// Whether `port_id` has a handler.
    #[must_use]
    pub fn is_registered(&self, port_id: u8) -> bool {
        self.ports.is_registered(port_id)
    }

    /// JSON metadata registered for `port_id`.
    #[must_use]
    pub fn port_meta(&self, port_id: u8) -> Option<&str> {
        self.ports.meta(port_id)
    }

    /// The underlying data link.
    #[must_use]
    pub const fn link(&self) -> &DataLink<L> {
        &self.link
    }

    /// Mutable access to the underlying data link.
    pub fn link_mut(&mut self) -> &mut DataLink<L> {
        &mut self.link
    }
}
