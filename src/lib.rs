//! rlink - Reliable framed transport for byte-oriented links
//!
//! rlink carries messages over UARTs, sockets and other plain byte pipes. It
//! frames data with start-of-frame sentinels and CRC-32, retransmits lost or
//! corrupted frames with a windowed ARQ over an 11-bit frame id space, and
//! multiplexes up to 64 logical ports on one link.
//!
//! # Layers
//!
//! - [`protocol`]: wire format, frame codec and the resynchronizing deframer
//! - [`datalink`]: frame ids, ACK/NACK, retransmission and link status
//! - [`transport`]: ports, message segmentation and the port 0 service
//!
//! # Quick Start
//!
//! ```rust
//! use rlink::datalink::{DataLinkConfig, LowerLevel};
//! use rlink::transport::{MessagePort, Transport};
//!
//! #[derive(Default)]
//! struct Wire(Vec<u8>);
//!
//! impl LowerLevel for Wire {
//!     fn send(&mut self, data: &[u8]) {
//!         self.0.extend_from_slice(data);
//!     }
//!     fn send_available(&self) -> usize {
//!         usize::MAX
//!     }
//!     fn time_ms(&self) -> u64 {
//!         0
//!     }
//! }
//!
//! let mut a = Transport::new(DataLinkConfig::default(), Wire::default())?;
//! let mut b = Transport::new(DataLinkConfig::default(), Wire::default())?;
//! b.port_register(1, None, MessagePort::new(4096, |_tx, _port, _data, msg| {
//!     assert_eq!(&msg[..], b"hello");
//! }))?;
//!
//! a.send_message(1, 0, b"hello")?;
//! let bytes = std::mem::take(&mut a.link_mut().driver_mut().0);
//! b.ll_recv(&bytes);
//! # Ok::<(), rlink::Error>(())
//! ```
//!
//! # Concurrency
//!
//! Every type is a plain `&mut self` state machine that never blocks. When
//! bytes arrive on another thread, wrap the whole [`Transport`](transport::Transport)
//! in a `std::sync::Mutex`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod datalink;
pub mod protocol;
pub mod transport;

pub use datalink::{DataLink, DataLinkConfig, LinkEvent, LinkStatus, LowerLevel};
pub use protocol::{Error, FRAME_ID_MAX, PAYLOAD_MAX, Result, Seq};
pub use transport::{PortHandler, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
