//! Frame header bit fields
//!
//! # Wire Format
//!
//! DATA frame header (8 bytes), followed by 1..=256 payload bytes and a
//! little-endian CRC-32 over everything after the two SOF bytes:
//!
//! ```text
//!  byte 0   byte 1   byte 2            byte 3     byte 4        bytes 5..8
//! +--------+--------+-----+-----------+----------+-------------+------------------+
//! |  SOF1  |  SOF2  |type5| id[10:8]  | len - 1  |  id[7:0]    | metadata (LE 24) |
//! +--------+--------+-----+-----------+----------+-------------+------------------+
//! ```
//!
//! Link frame (8 bytes total), CRC-32 over bytes 2..4:
//!
//! ```text
//! +--------+--------+-----+-----------+----------+------------------+
//! |  SOF1  |  SOF2  |type5| id[10:8]  | id[7:0]  |   CRC-32 (LE)    |
//! +--------+--------+-----+-----------+----------+------------------+
//! ```

use super::{
    Error, FRAME_ID_MAX, FrameType, HEADER_SIZE, METADATA_MAX, PAYLOAD_MAX, Result, SOF1, SOF2,
};

const FRAME_ID_HIGH_MASK: u8 = 0x07;
const TYPE_SHIFT: u8 = 3;

fn type_byte(frame_type: FrameType, frame_id: u16) -> u8 {
    // frame_id is validated by the callers, the high bits fit in three bits
    (frame_type.code() << TYPE_SHIFT) | ((frame_id >> 8) as u8 & FRAME_ID_HIGH_MASK)
}

fn check_sof(bytes: &[u8]) -> Result<()> {
    if bytes[0] != SOF1 || bytes[1] != SOF2 {
        return Err(Error::InvalidSof {
            found: u16::from_be_bytes([bytes[0], bytes[1]]),
        });
    }
    Ok(())
}

fn check_frame_id(frame_id: u16) -> Result<()> {
    if frame_id > FRAME_ID_MAX {
        return Err(Error::InvalidFrameId { frame_id });
    }
    Ok(())
}

/// DATA frame header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    frame_id: u16,
    payload_len: u16,
    metadata: u32,
}

impl DataHeader {
    /// Create a validated header.
    pub fn new(frame_id: u16, metadata: u32, payload_len: usize) -> Result<Self> {
        check_frame_id(frame_id)?;
        if metadata > METADATA_MAX {
            return Err(Error::InvalidMetadata { metadata });
        }
        if payload_len == 0 {
            return Err(Error::EmptyPayload);
        }
        if payload_len > PAYLOAD_MAX {
            return Err(Error::TooBig {
                size: payload_len,
                max: PAYLOAD_MAX,
            });
        }
        Ok(Self {
            frame_id,
            // bounded by PAYLOAD_MAX above
            payload_len: payload_len as u16,
            metadata,
        })
    }

    /// Frame id
    #[must_use]
    pub const fn frame_id(&self) -> u16 {
        self.frame_id
    }

    /// Metadata (24 bits)
    #[must_use]
    pub const fn metadata(&self) -> u32 {
        self.metadata
    }

    /// Payload length in bytes
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    /// Total frame length on the wire
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        super::FRAME_OVERHEAD + self.payload_len as usize
    }

    /// Pack into the 8-byte header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let metadata = self.metadata.to_le_bytes();
        [
            SOF1,
            SOF2,
            type_byte(FrameType::Data, self.frame_id),
            (self.payload_len - 1) as u8,
            (self.frame_id & 0xFF) as u8,
            metadata[0],
            metadata[1],
            metadata[2],
        ]
    }

    /// Unpack from at least 8 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        check_sof(bytes)?;
        let code = bytes[2] >> TYPE_SHIFT;
        if FrameType::from_code(code) != Some(FrameType::Data) {
            return Err(Error::InvalidFrameType { code });
        }
        Ok(Self {
            frame_id: (u16::from(bytes[2] & FRAME_ID_HIGH_MASK) << 8) | u16::from(bytes[4]),
            payload_len: u16::from(bytes[3]) + 1,
            metadata: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], 0]),
        })
    }
}

/// Link frame fields (everything except the CRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHeader {
    frame_type: FrameType,
    frame_id: u16,
}

impl LinkHeader {
    /// Create a validated link header.
    pub fn new(frame_type: FrameType, frame_id: u16) -> Result<Self> {
        if !frame_type.is_link() {
            return Err(Error::InvalidFrameType {
                code: frame_type.code(),
            });
        }
        check_frame_id(frame_id)?;
        Ok(Self {
            frame_type,
            frame_id,
        })
    }

    /// Frame type
    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Frame id
    #[must_use]
    pub const fn frame_id(&self) -> u16 {
        self.frame_id
    }

    /// Pack into the first four bytes of a link frame.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            SOF1,
            SOF2,
            type_byte(self.frame_type, self.frame_id),
            (self.frame_id & 0xFF) as u8,
        ]
    }

    /// Unpack from at least four bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::BufferTooSmall {
                needed: 4,
                got: bytes.len(),
            });
        }
        check_sof(bytes)?;
        let code = bytes[2] >> TYPE_SHIFT;
        let frame_type = FrameType::from_code(code)
            .filter(|ty| ty.is_link())
            .ok_or(Error::InvalidFrameType { code })?;
        Ok(Self {
            frame_type,
            frame_id: (u16::from(bytes[2] & FRAME_ID_HIGH_MASK) << 8) | u16::from(bytes[3]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_header_literal_bytes() {
        let header = DataHeader::new(0x5A3, 0x12_3456, 256).unwrap();
        assert_eq!(
            header.to_bytes(),
            [0x55, 0x00, 0x05, 0xFF, 0xA3, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn data_header_roundtrip() {
        let header = DataHeader::new(2047, METADATA_MAX, 1).unwrap();
        let decoded = DataHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.frame_len(), 13);
    }

    #[test]
    fn data_header_rejects_ranges() {
        assert!(matches!(
            DataHeader::new(2048, 0, 1),
            Err(Error::InvalidFrameId { frame_id: 2048 })
        ));
        assert!(matches!(
            DataHeader::new(0, 0x0100_0000, 1),
            Err(Error::InvalidMetadata { .. })
        ));
        assert!(matches!(DataHeader::new(0, 0, 0), Err(Error::EmptyPayload)));
        assert!(matches!(
            DataHeader::new(0, 0, 257),
            Err(Error::TooBig { size: 257, max: 256 })
        ));
    }

    #[test]
    fn link_header_literal_bytes() {
        let header = LinkHeader::new(FrameType::AckAll, 0x123).unwrap();
        assert_eq!(header.to_bytes(), [0x55, 0x00, 0x79, 0x23]);
        let decoded = LinkHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn link_header_rejects_data_type() {
        assert!(matches!(
            LinkHeader::new(FrameType::Data, 0),
            Err(Error::InvalidFrameType { code: 0 })
        ));
        assert!(matches!(
            LinkHeader::from_bytes(&[0x55, 0x00, 0x00, 0x00]),
            Err(Error::InvalidFrameType { code: 0 })
        ));
    }

    #[test]
    fn header_rejects_bad_sof() {
        let mut bytes = LinkHeader::new(FrameType::Reset, 0).unwrap().to_bytes();
        bytes[1] = 0x01;
        assert!(matches!(
            LinkHeader::from_bytes(&bytes),
            Err(Error::InvalidSof { found: 0x5501 })
        ));
    }
}
