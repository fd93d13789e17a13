//! Port addressing carried in the 24-bit DATA frame metadata.

use crate::protocol::{Error, METADATA_MAX, Result, Seq};

/// Highest port id.
pub const PORT_MAX: u8 = 63;

/// Number of ports.
pub const PORT_COUNT: usize = PORT_MAX as usize + 1;

/// Unpacked transport metadata.
///
/// # Format
///
/// ```text
/// bits 0..=5    port_id
/// bits 6..=7    seq
/// bits 8..=23   port_data
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMetadata {
    port_id: u8,
    seq: Seq,
    port_data: u16,
}

impl PortMetadata {
    /// Create metadata, rejecting port ids above [`PORT_MAX`].
    pub fn new(port_id: u8, seq: Seq, port_data: u16) -> Result<Self> {
        if port_id > PORT_MAX {
            return Err(Error::InvalidPortId { port_id });
        }
        Ok(Self {
            port_id,
            seq,
            port_data,
        })
    }

    /// Decode; bits above the 24-bit field are ignored.
    #[must_use]
    pub const fn unpack(metadata: u32) -> Self {
        Self {
            port_id: (metadata & 0x3F) as u8,
            seq: Seq::from_bits((metadata >> 6) as u8),
            port_data: ((metadata >> 8) & 0xFFFF) as u16,
        }
    }

    /// Encode into the 24-bit field.
    #[must_use]
    pub const fn pack(self) -> u32 {
        let packed = (self.port_id as u32)
            | ((self.seq.bits() as u32) << 6)
            | ((self.port_data as u32) << 8);
        packed & METADATA_MAX
    }

    /// Port id.
    #[must_use]
    pub const fn port_id(self) -> u8 {
        self.port_id
    }

    /// Segmentation marker.
    #[must_use]
    pub const fn seq(self) -> Seq {
        self.seq
    }

    /// Port-defined 16 bits.
    #[must_use]
    pub const fn port_data(self) -> u16 {
        self.port_data
    }
}
