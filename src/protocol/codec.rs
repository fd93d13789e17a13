//! Frame encoding and single-frame decoding
//!
//! The encoders are pure functions. `decode` validates exactly one complete
//! frame; streams of bytes go through [`Framer`](super::Framer) instead.

use super::crc::crc32;
use super::{
    DataFrame, DataHeader, Error, FOOTER_SIZE, Frame, FrameType, HEADER_SIZE, LINK_SIZE,
    LinkFrame, LinkHeader, Result,
};

/// Encode a DATA frame into `out`, returning the number of bytes written.
///
/// # Format
///
/// ```text
/// [HEADER (8 bytes)] [PAYLOAD (1..=256)] [CRC-32 LE (4 bytes)]
/// ```
pub fn encode_data(frame_id: u16, metadata: u32, payload: &[u8], out: &mut [u8]) -> Result<usize> {
    let header = DataHeader::new(frame_id, metadata, payload.len())?;
    let total = header.frame_len();
    if out.len() < total {
        return Err(Error::BufferTooSmall {
            needed: total,
            got: out.len(),
        });
    }

    out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    let payload_end = HEADER_SIZE + payload.len();
    out[HEADER_SIZE..payload_end].copy_from_slice(payload);
    let crc = crc32(0, &out[2..payload_end]);
    out[payload_end..total].copy_from_slice(&crc.to_le_bytes());
    Ok(total)
}

/// Construct a DATA frame as an owned byte vector.
pub fn construct_data(frame_id: u16, metadata: u32, payload: &[u8]) -> Result<Vec<u8>> {
    let header = DataHeader::new(frame_id, metadata, payload.len())?;
    let mut bytes = vec![0u8; header.frame_len()];
    encode_data(frame_id, metadata, payload, &mut bytes)?;
    Ok(bytes)
}

/// Construct a fixed-size link frame.
pub fn construct_link(frame_type: FrameType, frame_id: u16) -> Result<[u8; LINK_SIZE]> {
    let header = LinkHeader::new(frame_type, frame_id)?.to_bytes();
    let crc = crc32(0, &header[2..4]);
    let mut bytes = [0u8; LINK_SIZE];
    bytes[..4].copy_from_slice(&header);
    bytes[4..].copy_from_slice(&crc.to_le_bytes());
    Ok(bytes)
}

/// Decode exactly one complete frame.
///
/// # Errors
///
/// Returns an error if:
/// - the SOF bytes or frame type are invalid
/// - the buffer is shorter than the frame it announces
/// - the CRC does not match
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>> {
    if bytes.len() < LINK_SIZE {
        return Err(Error::BufferTooSmall {
            needed: LINK_SIZE,
            got: bytes.len(),
        });
    }

    if let Ok(link) = LinkHeader::from_bytes(bytes) {
        verify_crc(&bytes[2..4], &bytes[4..LINK_SIZE])?;
        return Ok(Frame::Link(LinkFrame {
            frame_type: link.frame_type(),
            frame_id: link.frame_id(),
        }));
    }

    let header = DataHeader::from_bytes(bytes)?;
    let total = header.frame_len();
    if bytes.len() < total {
        return Err(Error::BufferTooSmall {
            needed: total,
            got: bytes.len(),
        });
    }
    let payload_end = total - FOOTER_SIZE;
    verify_crc(&bytes[2..payload_end], &bytes[payload_end..total])?;
    Ok(Frame::Data(DataFrame {
        frame_id: header.frame_id(),
        metadata: header.metadata(),
        payload: &bytes[HEADER_SIZE..payload_end],
    }))
}

pub(crate) fn crc_matches(covered: &[u8], trailer: &[u8]) -> bool {
    verify_crc(covered, trailer).is_ok()
}

fn verify_crc(covered: &[u8], trailer: &[u8]) -> Result<()> {
    let expected = crc32(0, covered);
    let found = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if expected != found {
        return Err(Error::ChecksumMismatch { expected, found });
    }
    Ok(())
}
