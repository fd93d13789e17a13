//! Data-link configuration.

use crate::protocol::frame_id::INFLIGHT_MAX;
use crate::protocol::{Error, FRAME_MAX_SIZE, LINK_SIZE, Result};

/// Data-link configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DataLinkConfig {
    /// Maximum number of DATA frames queued or awaiting acknowledgement.
    pub tx_window_size: usize,
    /// Bytes of preallocated transmit storage, in blocks of one maximum frame.
    pub tx_buffer_size: usize,
    /// How far ahead of the expected id an out-of-order frame still earns a NACK.
    pub rx_window_size: usize,
    /// Framer staging capacity in bytes.
    pub rx_buffer_size: usize,
    /// Bytes of link frames (ACK/NACK/RESET) that may wait for driver space.
    pub tx_link_buffer_size: usize,
    /// Age of the oldest unacknowledged frame that triggers retransmission.
    pub tx_timeout_ms: u64,
    /// Transmissions of one frame after which the link reports `Disconnected`.
    pub max_retries: u32,
}

impl Default for DataLinkConfig {
    fn default() -> Self {
        Self {
            tx_window_size: 32,
            tx_buffer_size: 32 * FRAME_MAX_SIZE,
            rx_window_size: 64,
            rx_buffer_size: FRAME_MAX_SIZE,
            tx_link_buffer_size: 64 * LINK_SIZE,
            tx_timeout_ms: 100,
            max_retries: 16,
        }
    }
}

impl DataLinkConfig {
    /// Check every option, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        positive("tx_window_size", self.tx_window_size as u64)?;
        positive("rx_window_size", self.rx_window_size as u64)?;
        positive("tx_timeout_ms", self.tx_timeout_ms)?;
        positive("max_retries", u64::from(self.max_retries))?;

        if self.tx_window_size > usize::from(INFLIGHT_MAX) {
            return Err(Error::InvalidConfig {
                field: "tx_window_size",
                value: self.tx_window_size as u64,
                reason: "must not exceed half the frame-id space minus one",
            });
        }
        if self.rx_window_size > usize::from(INFLIGHT_MAX) {
            return Err(Error::InvalidConfig {
                field: "rx_window_size",
                value: self.rx_window_size as u64,
                reason: "must not exceed half the frame-id space minus one",
            });
        }
        at_least("tx_buffer_size", self.tx_buffer_size, FRAME_MAX_SIZE)?;
        at_least("rx_buffer_size", self.rx_buffer_size, FRAME_MAX_SIZE)?;
        at_least("tx_link_buffer_size", self.tx_link_buffer_size, LINK_SIZE)?;
        Ok(())
    }

    /// Number of preallocated transmit blocks.
    #[must_use]
    pub const fn tx_blocks(&self) -> usize {
        self.tx_buffer_size / FRAME_MAX_SIZE
    }

    /// Number of link frames that may be queued.
    #[must_use]
    pub const fn tx_link_frames(&self) -> usize {
        self.tx_link_buffer_size / LINK_SIZE
    }
}

fn positive(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidConfig {
            field,
            value,
            reason: "must be positive",
        });
    }
    Ok(())
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(Error::InvalidConfig {
            field,
            value: value as u64,
            reason: "too small to hold one frame",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = DataLinkConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tx_blocks(), 32);
        assert_eq!(config.tx_link_frames(), 64);
    }

    #[test]
    fn window_bound_enforced() {
        let mut config = DataLinkConfig {
            tx_window_size: 1023,
            ..Default::default()
        };
        config.validate().unwrap();
        config.tx_window_size = 1024;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                field: "tx_window_size",
                ..
            })
        ));
    }

    #[test]
    fn zero_and_undersized_rejected() {
        let config = DataLinkConfig {
            tx_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                field: "tx_timeout_ms",
                ..
            })
        ));

        let config = DataLinkConfig {
            tx_buffer_size: FRAME_MAX_SIZE - 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                field: "tx_buffer_size",
                ..
            })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_uses_defaults() {
        let config: DataLinkConfig =
            serde_json::from_str(r#"{"tx_window_size": 8, "tx_timeout_ms": 20}"#).unwrap();
        assert_eq!(config.tx_window_size, 8);
        assert_eq!(config.tx_timeout_ms, 20);
        assert_eq!(config.rx_buffer_size, FRAME_MAX_SIZE);
    }
}
