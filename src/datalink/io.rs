//! `std::io::Write` adapter for sockets and serial ports.

use std::io::{self, Write};
use std::time::Instant;

use tracing::warn;

use super::driver::LowerLevel;

/// Drives any [`Write`] sink (a `TcpStream`, a serial port handle) as the
/// lower level of a data link. Reading stays with the caller, who forwards
/// received bytes to `ll_recv`.
#[derive(Debug)]
pub struct IoDriver<W> {
    writer: W,
    epoch: Instant,
    write_errors: u64,
}

impl<W: Write> IoDriver<W> {
    /// Wrap a writer. The clock starts now.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            epoch: Instant::now(),
            write_errors: 0,
        }
    }

    /// Writes that failed since construction.
    #[must_use]
    pub const fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Access the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Mutable access to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }
}

impl<W: Write> LowerLevel for IoDriver<W> {
    fn send(&mut self, data: &[u8]) {
        // A failed write looks like line loss to the peer; retransmission recovers.
        if let Err(err) = self.write_frame(data) {
            self.write_errors += 1;
            warn!(error = %err, len = data.len(), "link write failed");
        }
    }

    fn send_available(&self) -> usize {
        usize::MAX
    }

    fn time_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
