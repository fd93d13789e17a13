//! Frame types and segment markers

use std::fmt;

/// Frame type, carried in the top five bits of header byte 2.
///
/// Link codes are spread apart so that a single flipped bit never turns one
/// valid type into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Payload-carrying frame
    Data = 0x00,
    /// Acknowledges every frame up to and including `frame_id`
    AckAll = 0x0F,
    /// Acknowledges exactly `frame_id`
    AckOne = 0x17,
    /// `frame_id` was expected but something else arrived
    NackFrameId = 0x1B,
    /// Receiver lost byte sync while expecting `frame_id`
    NackFramingError = 0x1D,
    /// Link reset: `frame_id` 0 requests, 1 responds
    Reset = 0x1E,
}

impl FrameType {
    /// Decode a five-bit type code
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Data),
            0x0F => Some(Self::AckAll),
            0x17 => Some(Self::AckOne),
            0x1B => Some(Self::NackFrameId),
            0x1D => Some(Self::NackFramingError),
            0x1E => Some(Self::Reset),
            _ => None,
        }
    }

    /// Five-bit type code
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether this is a fixed-size link frame
    #[must_use]
    pub const fn is_link(self) -> bool {
        !matches!(self, Self::Data)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "DATA",
            Self::AckAll => "ACK_ALL",
            Self::AckOne => "ACK_ONE",
            Self::NackFrameId => "NACK_FRAME_ID",
            Self::NackFramingError => "NACK_FRAMING_ERROR",
            Self::Reset => "RESET",
        };
        write!(f, "{name}")
    }
}

/// Two-bit segmentation marker.
///
/// Bit 1 marks the first segment of a message and bit 0 the last, so a
/// message that fits in one frame is both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Seq {
    /// Neither first nor last
    Middle = 0b00,
    /// Last segment
    Stop = 0b01,
    /// First segment
    Start = 0b10,
    /// Complete message in one frame
    Single = 0b11,
}

impl Seq {
    /// Decode from the low two bits of `bits`
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Middle,
            0b01 => Self::Stop,
            0b10 => Self::Start,
            _ => Self::Single,
        }
    }

    /// Two-bit encoding
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Whether a new message begins with this segment
    #[must_use]
    pub const fn is_start(self) -> bool {
        self.bits() & 0b10 != 0
    }

    /// Whether the message ends with this segment
    #[must_use]
    pub const fn is_stop(self) -> bool {
        self.bits() & 0b01 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_codes_roundtrip() {
        for ty in [
            FrameType::Data,
            FrameType::AckAll,
            FrameType::AckOne,
            FrameType::NackFrameId,
            FrameType::NackFramingError,
            FrameType::Reset,
        ] {
            assert_eq!(FrameType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(FrameType::from_code(0x01), None);
        assert_eq!(FrameType::from_code(super::super::SOF1 >> 3), None);
    }

    #[test]
    fn single_bit_flip_never_aliases_link_types() {
        let codes = [0x00u8, 0x0F, 0x17, 0x1B, 0x1D, 0x1E];
        for &a in &codes {
            for bit in 0..5 {
                let flipped = a ^ (1 << bit);
                assert!(!codes.contains(&flipped), "{a:#x} bit {bit}");
            }
        }
    }

    #[test]
    fn seq_flags() {
        assert!(Seq::Single.is_start() && Seq::Single.is_stop());
        assert!(Seq::Start.is_start() && !Seq::Start.is_stop());
        assert!(!Seq::Stop.is_start() && Seq::Stop.is_stop());
        assert!(!Seq::Middle.is_start() && !Seq::Middle.is_stop());
        assert_eq!(Seq::from_bits(0b111), Seq::Single);
    }
}
