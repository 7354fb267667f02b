//! # Command/response channel
//!
//! Serializes one AT command at a time onto the serial transport and
//! classifies the firmware's free-text reply by polling for literal tokens
//! under a timeout budget.
//!
//! The channel is the single owner of the response buffer and the timer, so
//! overlapping commands are impossible by construction. All waiting is
//! busy-polling against the injected [Timer], nothing reads a wall clock.
use crate::buffer::ResponseBuffer;
use crate::commands::CommandKind;
use crate::serial::SerialPort;
use core::fmt::Write;
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Outcome of awaiting a command reply.
///
/// Nothing is retried internally. Callers needing retries re-issue the
/// command themselves.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Not a single byte arrived before the deadline
    Timeout,

    /// Bytes arrived but no expected token matched. Also raised when a
    /// structured reply misses an expected field marker or carries a
    /// non-decimal value where a number is required.
    Unknown,

    /// The firmware answered with an explicit failure token
    Fail,

    /// Upstream timer error
    Timer,
}

#[cfg(feature = "defmt-impl")]
impl defmt::Format for CommandError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CommandError::Timeout => defmt::write!(f, "CommandError::Timeout"),
            CommandError::Unknown => defmt::write!(f, "CommandError::Unknown"),
            CommandError::Fail => defmt::write!(f, "CommandError::Fail"),
            CommandError::Timer => defmt::write!(f, "CommandError::Timer"),
        }
    }
}

/// Formats command fragments straight onto the serial link
struct SerialWriter<'a, S: SerialPort>(&'a mut S);

impl<S: SerialPort> Write for SerialWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}

/// Command/response channel over a shared serial transport.
///
/// RX_SIZE: Capacity of the response window in bytes. Replies longer than the
/// window lose their oldest bytes, which is acceptable since all expected
/// tokens trail the reply.
pub(crate) struct CommandChannel<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> {
    /// Serial link to the modem, shared with the socket de-framers
    serial: S,

    /// Timer used for timeout measurement and heuristic pauses
    timer: T,

    /// Window over the current reply, cleared before every command
    buffer: ResponseBuffer<RX_SIZE>,
}

impl<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize>
    CommandChannel<S, T, TIMER_HZ, RX_SIZE>
{
    pub(crate) fn new(serial: S, timer: T) -> Self {
        Self {
            serial,
            timer,
            buffer: ResponseBuffer::new(),
        }
    }

    /// Writes the command line `AT<code>[? | =<params>]\r\n` to the transport.
    /// Delivery is not verified, the reply tokens are the only confirmation.
    pub(crate) fn send_command(&mut self, code: &str, kind: CommandKind<'_>) {
        let mut writer = SerialWriter(&mut self.serial);
        let _ = writer.write_str("AT");
        let _ = writer.write_str(code);

        match kind {
            CommandKind::Execute => {}
            CommandKind::Query => {
                let _ = writer.write_char('?');
            }
            CommandKind::Set(params) => {
                let _ = writer.write_char('=');
                let _ = writer.write_fmt(params);
            }
        }

        let _ = writer.write_str("\r\n");
    }

    /// Polls the reply stream until `token` occurs, returning the number of
    /// bytes received up to and including the final token byte.
    ///
    /// [CommandError::Unknown] if the deadline passed with at least one byte
    /// received, [CommandError::Timeout] if nothing arrived at all.
    pub(crate) fn await_token(
        &mut self,
        token: &[u8],
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> Result<usize, CommandError> {
        self.buffer.clear();
        self.timer.start(timeout).map_err(|_| CommandError::Timer)?;
        let mut received = 0;

        loop {
            while self.serial.available() > 0 {
                let byte = match self.serial.read() {
                    Ok(byte) => byte,
                    Err(_) => break,
                };

                self.buffer.push(byte);
                received += 1;

                if self.buffer.contains(token) {
                    return Ok(received);
                }
            }

            match self.timer.wait() {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => return Err(CommandError::Timer),
            }
        }

        if received > 0 {
            Err(CommandError::Unknown)
        } else {
            Err(CommandError::Timeout)
        }
    }

    /// Like [Self::await_token], but additionally watches for a failure
    /// token. The fail token is checked first on every received byte: if both
    /// tokens complete on the same byte, the failure wins.
    pub(crate) fn await_response(
        &mut self,
        pass: &[u8],
        fail: &[u8],
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> Result<usize, CommandError> {
        self.buffer.clear();
        self.timer.start(timeout).map_err(|_| CommandError::Timer)?;
        let mut received = 0;

        loop {
            while self.serial.available() > 0 {
                let byte = match self.serial.read() {
                    Ok(byte) => byte,
                    Err(_) => break,
                };

                self.buffer.push(byte);
                received += 1;

                if self.buffer.contains(fail) {
                    return Err(CommandError::Fail);
                }

                if self.buffer.contains(pass) {
                    return Ok(received);
                }
            }

            match self.timer.wait() {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => return Err(CommandError::Timer),
            }
        }

        if received > 0 {
            Err(CommandError::Unknown)
        } else {
            Err(CommandError::Timeout)
        }
    }

    /// Busy-waits for the given duration
    pub(crate) fn pause(&mut self, duration: TimerDurationU32<TIMER_HZ>) -> Result<(), CommandError> {
        self.timer.start(duration).map_err(|_| CommandError::Timer)?;

        loop {
            match self.timer.wait() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => return Err(CommandError::Timer),
            }
        }
    }

    /// The reply bytes received since the last command was issued.
    /// Used by the structured parsers (status report, address report).
    pub(crate) fn window(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Returns true if the current reply window contains `token`
    pub(crate) fn window_contains(&self, token: &[u8]) -> bool {
        self.buffer.contains(token)
    }

    /// Writes raw payload bytes, bypassing command framing
    pub(crate) fn write_raw(&mut self, buffer: &[u8]) {
        self.serial.write(buffer);
    }

    /// Bytes currently readable from the transport
    pub(crate) fn bytes_pending(&mut self) -> usize {
        self.serial.available()
    }

    /// Pops one raw byte from the transport
    pub(crate) fn read_raw(&mut self) -> Option<u8> {
        self.serial.read().ok()
    }
}
