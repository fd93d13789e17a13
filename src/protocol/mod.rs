//! Wire format, checksums, frame-id arithmetic and the byte framer.
//!
//! This module knows nothing about acknowledgements or ports. It turns header
//! fields into bytes and bytes back into validated frames.

pub mod crc;
mod codec;
mod error;
pub mod frame_id;
mod frame;
mod framer;
mod header;
mod types;

pub use codec::{construct_data, construct_link, decode, encode_data};
pub use error::{Error, Result};
pub use frame::{DataFrame, Frame, LinkFrame};
pub use framer::{Framer, FramerHandler, FramerStatus};
pub use header::{DataHeader, LinkHeader};
pub use types::{FrameType, Seq};

/// First start-of-frame sentinel byte.
pub const SOF1: u8 = 0x55;

/// Second start-of-frame sentinel byte.
pub const SOF2: u8 = 0x00;

/// Largest valid frame id (11-bit space).
pub const FRAME_ID_MAX: u16 = 0x07FF;

/// Number of distinct frame ids.
pub const FRAME_ID_SPACE: u16 = FRAME_ID_MAX + 1;

/// Largest metadata value carried by a DATA frame (24 bits).
pub const METADATA_MAX: u32 = 0x00FF_FFFF;

/// Maximum DATA frame payload in bytes.
pub const PAYLOAD_MAX: usize = 256;

/// DATA frame header size, including both SOF bytes.
pub const HEADER_SIZE: usize = 8;

/// CRC-32 trailer size.
pub const FOOTER_SIZE: usize = 4;

/// Fixed per-frame overhead of a DATA frame.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// Largest possible DATA frame on the wire.
pub const FRAME_MAX_SIZE: usize = PAYLOAD_MAX + FRAME_OVERHEAD;

/// Link (ACK/NACK/RESET) frame size.
pub const LINK_SIZE: usize = 8;
