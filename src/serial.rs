//! Byte-oriented serial transport to the modem.

/// Serial link carrying the AT conversation, e.g. a UART at a fixed baud rate.
///
/// The command channel and all socket de-framers read from the same port, so
/// only one command may be in flight at a time. The interface mirrors a plain
/// byte stream: writes are fire-and-forget, reads never block.
pub trait SerialPort {
    /// Writes all bytes to the link. Delivery is not verified at this level,
    /// the reply tokens are the only confirmation the protocol offers.
    fn write(&mut self, buffer: &[u8]);

    /// Number of bytes ready to be read without blocking.
    fn available(&mut self) -> usize;

    /// Pops the next received byte.
    fn read(&mut self) -> nb::Result<u8, core::convert::Infallible>;
}
