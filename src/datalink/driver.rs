//! Lower-level byte driver contract.

/// A byte pipe (UART, socket) plus the clock used for retransmission timing.
///
/// Received bytes are pushed into the data link by the owner of the driver via
/// `ll_recv`; the driver itself only writes.
pub trait LowerLevel {
    /// Hand bytes to the link. Only called with at most `send_available()` bytes.
    fn send(&mut self, data: &[u8]);

    /// Bytes that can be accepted right now without blocking.
    fn send_available(&self) -> usize;

    /// Monotonic milliseconds.
    fn time_ms(&self) -> u64;
}

impl<T: LowerLevel + ?Sized> LowerLevel for &mut T {
    fn send(&mut self, data: &[u8]) {
        (**self).send(data);
    }

    fn send_available(&self) -> usize {
        (**self).send_available()
    }

    fn time_ms(&self) -> u64 {
        (**self).time_ms()
    }
}

impl<T: LowerLevel + ?Sized> LowerLevel for Box<T> {
    fn send(&mut self, data: &[u8]) {
        (**self).send(data);
    }

    fn send_available(&self) -> usize {
        (**self).send_available()
    }

    fn time_ms(&self) -> u64 {
        (**self).time_ms()
    }
}
