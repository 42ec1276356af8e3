use std::io;
use std::time::Duration;

#[cfg(feature = "serial")]
pub mod serial;

/// The byte link between a [`Modem`](crate::Modem) and the SIM868 UART.
///
/// Calls block. Reads wait at most the last timeout given to
/// `set_read_timeout`; running out of time is reported as `TimedOut` (or
/// `Ok(0)`), which the modem treats as "nothing yet".
pub trait Transport: Send {
    /// Send command bytes to the modem.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Receive whatever the modem has sent, up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Bytes already received and waiting.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Throw away unread input, such as boot chatter after a power press.
    fn reset_input_buffer(&mut self) -> io::Result<()>;

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}
