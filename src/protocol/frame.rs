//! Decoded frame views

use super::FrameType;

/// A validated DATA frame borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrame<'a> {
    /// Frame id assigned by the sender
    pub frame_id: u16,
    /// 24-bit metadata (port, sequence and port data for the transport)
    pub metadata: u32,
    /// Payload bytes
    pub payload: &'a [u8],
}

/// A validated link frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFrame {
    /// ACK, NACK or RESET
    pub frame_type: FrameType,
    /// Frame id the control frame refers to
    pub frame_id: u16,
}

/// Any validated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// DATA frame
    Data(DataFrame<'a>),
    /// Link frame
    Link(LinkFrame),
}
