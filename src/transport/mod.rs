//! Port multiplexing and message segmentation on top of the data link.

mod metadata;
pub mod port0;
mod ports;
mod reassembly;
#[allow(clippy::module_inception)]
mod transport;

pub use metadata::{PORT_COUNT, PORT_MAX, PortMetadata};
pub use port0::{PORT0, PORT0_META, Port0, Port0Op, Port0Response};
pub use ports::{PortHandler, PortTx};
pub use reassembly::{MessagePort, Reassembler};
pub use transport::Transport;
