//! rlink error types

use thiserror::Error;

/// Errors returned by the framing, data-link and transport layers.
///
/// Corrupted wire data never surfaces here; it is recovered by NACK and
/// retransmission and only shows up in the link status counters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Payload exceeds what a single frame can carry
    #[error("payload too large: {size} bytes (max {max})")]
    TooBig {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// DATA frames must carry at least one byte
    #[error("empty payload")]
    EmptyPayload,

    /// Frame id outside the 11-bit space
    #[error("invalid frame id: {frame_id} (max 2047)")]
    InvalidFrameId {
        /// Offending frame id
        frame_id: u16,
    },

    /// Metadata outside the 24-bit range
    #[error("invalid metadata: {metadata:#x} exceeds 24 bits")]
    InvalidMetadata {
        /// Offending metadata
        metadata: u32,
    },

    /// Unknown or unexpected frame type code
    #[error("invalid frame type: {code:#04x}")]
    InvalidFrameType {
        /// Five-bit type code
        code: u8,
    },

    /// Port id outside 0..=63
    #[error("invalid port id: {port_id} (max 63)")]
    InvalidPortId {
        /// Offending port id
        port_id: u8,
    },

    /// Frame does not start with the SOF sentinels
    #[error("invalid start of frame: {found:#06x}")]
    InvalidSof {
        /// The two leading bytes found
        found: u16,
    },

    /// CRC-32 mismatch
    #[error("checksum mismatch: expected {expected:#010x}, got {found:#010x}")]
    ChecksumMismatch {
        /// Computed checksum
        expected: u32,
        /// Checksum carried by the frame
        found: u32,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Configuration value rejected by validation
    #[error("invalid config: {field} = {value}: {reason}")]
    InvalidConfig {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: u64,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Send window cannot take the frames
    #[error("send window full: {needed} frames needed, {available} free")]
    Full {
        /// Frames the call needs
        needed: usize,
        /// Free window slots
        available: usize,
    },

    /// No free transmit buffer
    #[error("not enough memory: transmit buffers exhausted")]
    NotEnoughMemory,

    /// Segment arrived that does not fit the current reassembly state
    #[error("unexpected segment sequence: {seq:?}")]
    UnexpectedSequence {
        /// Sequence marker received
        seq: super::Seq,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
