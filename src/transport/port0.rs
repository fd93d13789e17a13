//! Port 0: link service requests.
//!
//! Every transport answers four requests on port 0. The op code and flags
//! travel in the port data, the body in the payload. Port 0 messages are
//! always single frames.
//!
//! # Port data
//!
//! ```text
//! bits 0..=6    op (1 STATUS, 2 ECHO, 3 TIMESYNC, 4 META)
//! bit  7        response flag
//! bits 8..=15   argument (META: port queried)
//! ```
//!
//! Requests without a body carry a single zero byte.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use super::ports::{PortHandler, PortTx};
use crate::datalink::LinkStatus;
use crate::protocol::{Result, Seq};

/// Port id of the service port.
pub const PORT0: u8 = 0;

/// Metadata port 0 registers for itself.
pub const PORT0_META: &str = r#"{"type":"oam","name":"port0"}"#;

const RESPONSE_FLAG: u16 = 0x80;
const OP_MASK: u16 = 0x7F;

/// Port 0 operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Port0Op {
    /// Link status counters of the responder
    Status = 1,
    /// Echo the payload
    Echo = 2,
    /// Append the responder's receive and transmit times
    TimeSync = 3,
    /// JSON metadata of the port given as argument
    Meta = 4,
}

impl Port0Op {
    /// Decode an op code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Status),
            2 => Some(Self::Echo),
            3 => Some(Self::TimeSync),
            4 => Some(Self::Meta),
            _ => None,
        }
    }

    /// Op code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Build the port data for a port 0 message.
#[must_use]
pub const fn port0_data(op: Port0Op, response: bool, arg: u8) -> u16 {
    let flag = if response { RESPONSE_FLAG } else { 0 };
    (op.code() as u16) | flag | ((arg as u16) << 8)
}

/// A response received on port 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Port0Response {
    /// Peer's link counters
    Status(LinkStatus),
    /// Echoed payload
    Echo(Bytes),
    /// Time sync exchange
    TimeSync {
        /// Body of the original request
        request: Bytes,
        /// Peer clock when the request arrived
        peer_rx_ms: u64,
        /// Peer clock when the response left
        peer_tx_ms: u64,
        /// Local clock when the response arrived
        local_rx_ms: u64,
    },
    /// Metadata of a peer port
    Meta {
        /// Port queried
        port_id: u8,
        /// JSON text, `{}` when the port has none
        json: String,
    },
}

type Listener = Box<dyn FnMut(Port0Response) + Send>;

/// The service port handler.
#[derive(Default)]
pub struct Port0 {
    listener: Option<Listener>,
}

impl Port0 {
    /// Answer requests; drop responses.
    #[must_use]
    pub fn new() -> Self {
        Self { listener: None }
    }

    /// Answer requests and report responses to `listener`.
    pub fn with_listener(listener: impl FnMut(Port0Response) + Send + 'static) -> Self {
        Self {
            listener: Some(Box::new(listener)),
        }
    }

    fn respond(tx: &mut PortTx<'_>, op: Port0Op, arg: u8, payload: &[u8]) -> Result<()> {
        tx.send(PORT0, Seq::Single, port0_data(op, true, arg), payload)
    }

    fn on_request(tx: &mut PortTx<'_>, op: Port0Op, arg: u8, payload: &[u8]) -> Result<()> {
        trace!(?op, arg, "port0 request");
        match op {
            Port0Op::Status => {
                let status = tx.status().to_bytes();
                Self::respond(tx, op, arg, &status)
            }
            Port0Op::Echo => Self::respond(tx, op, arg, payload),
            Port0Op::TimeSync => {
                let rx_ms = tx.time_ms();
                let mut body = BytesMut::with_capacity(payload.len() + 16);
                body.extend_from_slice(payload);
                body.put_u64_le(rx_ms);
                body.put_u64_le(tx.time_ms());
                Self::respond(tx, op, arg, &body)
            }
            Port0Op::Meta => {
                let json = tx.port_meta(arg).unwrap_or("{}").as_bytes().to_vec();
                Self::respond(tx, op, arg, &json)
            }
        }
    }

    fn on_response(&mut self, tx: &PortTx<'_>, op: Port0Op, arg: u8, payload: &[u8]) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        let response = match op {
            Port0Op::Status => match LinkStatus::from_bytes(payload) {
                Ok(status) => Port0Response::Status(status),
                Err(err) => {
                    debug!(error = %err, "malformed STATUS response");
                    return;
                }
            },
            Port0Op::Echo => Port0Response::Echo(Bytes::copy_from_slice(payload)),
            Port0Op::TimeSync => {
                let Some(split) = payload.len().checked_sub(16) else {
                    debug!(len = payload.len(), "malformed TIMESYNC response");
                    return;
                };
                let mut times = &payload[split..];
                Port0Response::TimeSync {
                    request: Bytes::copy_from_slice(&payload[..split]),
                    peer_rx_ms: times.get_u64_le(),
                    peer_tx_ms: times.get_u64_le(),
                    local_rx_ms: tx.time_ms(),
                }
            }
            Port0Op::Meta => Port0Response::Meta {
                port_id: arg,
                json: String::from_utf8_lossy(payload).into_owned(),
            },
        };
        listener(response);
    }
}

impl PortHandler for Port0 {
    fn on_recv(
        &mut self,
        tx: &mut PortTx<'_>,
        _port_id: u8,
        seq: Seq,
        port_data: u16,
        payload: &[u8],
    ) {
        if seq != Seq::Single {
            debug!(?seq, "port0 ignores segmented messages");
            return;
        }
        let code = (port_data & OP_MASK) as u8;
        let Some(op) = Port0Op::from_code(code) else {
            debug!(code, "unknown port0 op");
            return;
        };
        let arg = (port_data >> 8) as u8;
        if port_data & RESPONSE_FLAG != 0 {
            self.on_response(tx, op, arg, payload);
        } else if let Err(err) = Self::on_request(tx, op, arg, payload) {
            debug!(?op, error = %err, "port0 response not sent");
        }
    }
}

impl fmt::Debug for Port0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port0")
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
