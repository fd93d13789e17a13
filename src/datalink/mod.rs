//! Reliable data link: frame ids, acknowledgements and retransmission.
//!
//! The data link sits between a byte driver ([`LowerLevel`]) and an upper
//! layer ([`UpperLayer`]), turning the framer's validated frames into an
//! in-order, retransmitting delivery service.

mod buffer;
mod config;
mod driver;
mod engine;
mod io;
mod receive;
mod status;
mod window;

pub use buffer::{Buffer, BufferPool};
pub use config::DataLinkConfig;
pub use driver::LowerLevel;
pub use engine::{DataLink, LinkEvent, LinkTx, UpperLayer};
pub use io::IoDriver;
pub use receive::{RxDisposition, RxTracker};
pub use status::{LinkStatus, RxStatus, TxStatus};
pub use window::{FrameState, TxFrame, TxWindow};
