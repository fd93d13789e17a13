//! Link status counters.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::{Error, FramerStatus, Result};

/// Transmit-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TxStatus {
    /// Bytes handed to the driver, link frames and retransmissions included.
    pub bytes: u64,
    /// DATA frames acknowledged by the peer.
    pub data_frames: u64,
    /// Link frames handed to the driver.
    pub link_frames: u64,
    /// DATA frames transmitted more than once.
    pub retransmissions: u64,
}

/// Receive-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RxStatus {
    /// Bytes passed to `ll_recv`.
    pub bytes: u64,
    /// DATA frames delivered to the upper layer.
    pub data_frames: u64,
    /// Valid link frames.
    pub link_frames: u64,
    /// Candidate frames that failed CRC.
    pub crc_errors: u64,
    /// Losses of byte sync.
    pub resync: u64,
    /// DATA frames with an unexpected frame id.
    pub frame_id_errors: u64,
}

/// Snapshot of both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkStatus {
    /// Transmit counters
    pub tx: TxStatus,
    /// Receive counters
    pub rx: RxStatus,
}

impl LinkStatus {
    /// Serialized size in bytes.
    pub const ENCODED_LEN: usize = 1 + 10 * 8;

    const VERSION: u8 = 1;

    /// Copy the framer's counters into the receive side.
    pub fn merge_framer(&mut self, framer: &FramerStatus) {
        self.rx.bytes = framer.bytes;
        self.rx.link_frames = framer.link_frames;
        self.rx.crc_errors = framer.crc_errors;
        self.rx.resync = framer.resync;
    }

    /// Encode as a version byte followed by little-endian `u64` counters.
    ///
    /// # Format
    ///
    /// ```text
    /// [version u8]
    /// [tx.bytes] [tx.data_frames] [tx.link_frames] [tx.retransmissions]
    /// [rx.bytes] [rx.data_frames] [rx.link_frames] [rx.crc_errors]
    /// [rx.resync] [rx.frame_id_errors]
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        buf.put_u8(Self::VERSION);
        for value in [
            self.tx.bytes,
            self.tx.data_frames,
            self.tx.link_frames,
            self.tx.retransmissions,
            self.rx.bytes,
            self.rx.data_frames,
            self.rx.link_frames,
            self.rx.crc_errors,
            self.rx.resync,
            self.rx.frame_id_errors,
        ] {
            buf.put_u64_le(value);
        }
        buf.freeze()
    }

    /// Decode the layout produced by [`LinkStatus::to_bytes`].
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::ENCODED_LEN {
            return Err(Error::BufferTooSmall {
                needed: Self::ENCODED_LEN,
                got: bytes.len(),
            });
        }
        let _version = bytes.get_u8();
        Ok(Self {
            tx: TxStatus {
                bytes: bytes.get_u64_le(),
                data_frames: bytes.get_u64_le(),
                link_frames: bytes.get_u64_le(),
                retransmissions: bytes.get_u64_le(),
            },
            rx: RxStatus {
                bytes: bytes.get_u64_le(),
                data_frames: bytes.get_u64_le(),
                link_frames: bytes.get_u64_le(),
                crc_errors: bytes.get_u64_le(),
                resync: bytes.get_u64_le(),
                frame_id_errors: bytes.get_u64_le(),
            },
        })
    }
}
