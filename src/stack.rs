//! # TCP/UDP socket operations
//!
//! Implements [embedded_nal::TcpClientStack] on top of the command channel.
//! Socket handles are plain tickets: a handle only binds to one of the five
//! firmware link slots on connect, and allocation always trusts the last
//! `AT+CIPSTATUS` snapshot over local bookkeeping.
//!
//! ```
//! use core::str::FromStr;
//! use embedded_nal::{SocketAddr, TcpClientStack};
//! use esp8266_at_client::example::{ExampleSerial, ExampleTimer};
//! use esp8266_at_client::wifi::Adapter;
//!
//! let serial = ExampleSerial::default();
//! let timer = ExampleTimer::default();
//! let mut adapter: Adapter<_, _, 1_000_000, 128, 256> = Adapter::new(serial, timer, 115_200);
//!
//! let mut socket = adapter.socket().unwrap();
//! adapter
//!     .connect(&mut socket, SocketAddr::from_str("93.184.216.34:80").unwrap())
//!     .unwrap();
//!
//! adapter.send(&mut socket, b"GET / HTTP/1.1\r\n\r\n").unwrap();
//!
//! let mut response = [0x0; 8];
//! adapter.receive(&mut socket, &mut response).unwrap();
//! assert_eq!(b"HTTP/1.1", &response);
//!
//! adapter.close(socket).unwrap();
//! ```
use crate::channel::CommandError;
use crate::commands::{self, CommandKind};
use crate::serial::SerialPort;
use crate::status::{LinkStatus, Protocol, SlotState};
use crate::wifi::Adapter;
use embedded_nal::{SocketAddr, TcpClientStack};
use fugit::{ExtU32, TimerDurationU32};
use fugit_timer::Timer;

/// Upper bound the firmware accepts for a single `AT+CIPSEND` transmission
pub const MAX_SEND_LENGTH: usize = 2048;

/// Socket errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Enabling multiple connections (`AT+CIPMUX=1`) failed
    EnablingMultiplexingFailed(CommandError),

    /// Refreshing the connection status failed
    StatusFailed(CommandError),

    /// The firmware reports all five link slots as occupied
    NoSocketAvailable,

    /// Opening the connection failed
    ConnectFailed(CommandError),

    /// The firmware rejected the transmission announcement
    TransmissionStartFailed(CommandError),

    /// The transmission was not confirmed with `SEND OK`
    SendFailed(CommandError),

    /// Draining the transport into the receive buffer failed
    ReceiveFailed(CommandError),

    /// The payload exceeds [MAX_SEND_LENGTH], nothing was transmitted
    PayloadTooLarge,

    /// Connecting requires a concrete transport protocol
    ProtocolUnsupported,

    /// The operation requires a connected socket, but the handle is not
    /// bound to a link
    SocketUnused,

    /// Only IPv4 remotes are supported by the firmware
    AddressUnsupported,
}

/// Handle to one of the five link slots, unbound until connect
pub struct Socket {
    pub(crate) link_id: Option<usize>,
}

impl<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize, const DF_SIZE: usize>
    Adapter<S, T, TIMER_HZ, RX_SIZE, DF_SIZE>
{
    /// Connects with an explicit transport protocol, used for UDP links.
    /// [TcpClientStack::connect] delegates here with [Protocol::Tcp].
    pub fn connect_protocol(
        &mut self,
        socket: &mut Socket,
        protocol: Protocol,
        remote: SocketAddr,
    ) -> Result<(), Error> {
        let SocketAddr::V4(remote) = remote else {
            return Err(Error::AddressUnsupported);
        };

        self.bind_slot(socket, protocol, *remote.ip(), remote.port())
    }

    /// Opens a TCP connection to a named host. The name is passed through to
    /// the firmware verbatim, which resolves it itself.
    pub fn connect_host(&mut self, socket: &mut Socket, host: &str, port: u16) -> Result<(), Error> {
        self.bind_slot(socket, Protocol::Tcp, host, port)
    }

    /// Allocates a firmware-free slot and opens the connection on it
    fn bind_slot<H: core::fmt::Display>(
        &mut self,
        socket: &mut Socket,
        protocol: Protocol,
        host: H,
        port: u16,
    ) -> Result<(), Error> {
        if protocol == Protocol::Undefined {
            return Err(Error::ProtocolUnsupported);
        }

        self.enable_multiplexing().map_err(Error::EnablingMultiplexingFailed)?;
        self.table.refresh(&mut self.channel).map_err(Error::StatusFailed)?;

        let link_id = self.table.first_free().ok_or(Error::NoSocketAvailable)?;
        self.open_link(link_id, protocol, host, port)?;

        self.table.local[link_id] = SlotState::Taken;
        self.buffers[link_id].reset();
        socket.link_id = Some(link_id);
        debug!("link {} connected", link_id);
        Ok(())
    }

    /// Number of payload bytes ready to be read.
    ///
    /// When nothing is buffered yet, waits for roughly one byte arrival time
    /// at the configured baud rate and checks once more, smoothing over data
    /// that is still trickling in.
    ///
    /// The count is a heuristic upper bound: framing of a later announcement
    /// still embedded behind unconsumed payload is included until that
    /// payload was read, since only head framing is stripped per pass.
    pub fn bytes_available(&mut self, socket: &Socket) -> Result<usize, Error> {
        let link_id = socket.link_id.ok_or(Error::SocketUnused)?;

        self.buffers[link_id]
            .fill(&mut self.channel)
            .map_err(Error::ReceiveFailed)?;

        if self.buffers[link_id].len() == 0 {
            let pause = self.byte_time();
            self.channel.pause(pause).map_err(Error::ReceiveFailed)?;

            self.buffers[link_id]
                .fill(&mut self.channel)
                .map_err(Error::ReceiveFailed)?;
        }

        Ok(self.buffers[link_id].len())
    }

    /// Pops a single payload byte, None if nothing is buffered
    pub fn read_byte(&mut self, socket: &Socket) -> Result<Option<u8>, Error> {
        let link_id = socket.link_id.ok_or(Error::SocketUnused)?;

        self.buffers[link_id]
            .fill(&mut self.channel)
            .map_err(Error::ReceiveFailed)?;

        Ok(self.buffers[link_id].pop())
    }

    /// Transmission time of one byte (eight bits plus framing overhead)
    fn byte_time(&self) -> TimerDurationU32<TIMER_HZ> {
        (10 * 1_000_000 / self.baud_rate).micros()
    }

    /// Issues `AT+CIPSTART` for the given slot. The destination is either an
    /// address or a hostname, formatted as-is.
    ///
    /// A failed reply whose text contains `ALREADY` means the link is
    /// already open, which counts as success.
    fn open_link<H: core::fmt::Display>(
        &mut self,
        link_id: usize,
        protocol: Protocol,
        address: H,
        port: u16,
    ) -> Result<(), Error> {
        match self.keep_alive_secs {
            // The keep-alive parameter only exists for TCP links
            Some(keep_alive) if protocol == Protocol::Tcp => self.channel.send_command(
                commands::START_CONNECTION,
                CommandKind::Set(format_args!(
                    "{},\"{}\",\"{}\",{},{}",
                    link_id,
                    protocol.as_str(),
                    address,
                    port,
                    keep_alive
                )),
            ),
            _ => self.channel.send_command(
                commands::START_CONNECTION,
                CommandKind::Set(format_args!(
                    "{},\"{}\",\"{}\",{}",
                    link_id,
                    protocol.as_str(),
                    address,
                    port
                )),
            ),
        }

        match self.channel.await_response(
            commands::TOKEN_OK,
            commands::TOKEN_ERROR,
            commands::CONNECT_TIMEOUT_MS.millis(),
        ) {
            Ok(_) => Ok(()),
            Err(CommandError::Fail) if self.channel.window_contains(commands::TOKEN_ALREADY) => Ok(()),
            Err(error) => Err(Error::ConnectFailed(error)),
        }
    }
}

impl<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize, const DF_SIZE: usize>
    TcpClientStack for Adapter<S, T, TIMER_HZ, RX_SIZE, DF_SIZE>
{
    type TcpSocket = Socket;
    type Error = Error;

    /// Hands out an unbound socket ticket. No firmware interaction and no
    /// slot reservation happens before connect.
    fn socket(&mut self) -> Result<Socket, Error> {
        Ok(Socket { link_id: None })
    }

    /// Opens a TCP connection to the given remote.
    ///
    /// Blocks for up to five seconds. Only IPv4 remotes are accepted.
    fn connect(&mut self, socket: &mut Socket, remote: SocketAddr) -> nb::Result<(), Error> {
        self.connect_protocol(socket, Protocol::Tcp, remote)?;
        Ok(())
    }

    /// Heuristic liveness check against local state only: a socket counts as
    /// connected while payload is buffered or the last status snapshot
    /// reported its link as active. No command is sent.
    fn is_connected(&mut self, socket: &Socket) -> Result<bool, Error> {
        let Some(link_id) = socket.link_id else {
            return Ok(false);
        };

        if self.table.local[link_id] != SlotState::Taken {
            return Ok(false);
        }

        Ok(self.buffers[link_id].len() > 0 || self.table.is_link_active(link_id))
    }

    /// Transmits the full payload as one `AT+CIPSEND` transmission.
    ///
    /// Payloads over [MAX_SEND_LENGTH] are rejected before any transport
    /// interaction. A missing transmission prompt does not abort, only an
    /// explicit failure reply does.
    fn send(&mut self, socket: &mut Socket, buffer: &[u8]) -> nb::Result<usize, Error> {
        let link_id = socket.link_id.ok_or(Error::SocketUnused)?;

        if buffer.len() > MAX_SEND_LENGTH {
            return Err(nb::Error::Other(Error::PayloadTooLarge));
        }

        if buffer.is_empty() {
            return Ok(0);
        }

        self.channel.send_command(
            commands::SEND_DATA,
            CommandKind::Set(format_args!("{},{}", link_id, buffer.len())),
        );

        match self.channel.await_response(
            commands::TOKEN_OK,
            commands::TOKEN_ERROR,
            commands::COMMAND_TIMEOUT_MS.millis(),
        ) {
            Ok(_) => {}
            Err(CommandError::Fail) => {
                return Err(nb::Error::Other(Error::TransmissionStartFailed(CommandError::Fail)));
            }
            // A late or garbled prompt is tolerated, the transmission
            // confirmation below is authoritative
            Err(_) => warning!("transmission prompt missing on link {}", link_id),
        }

        self.channel.write_raw(buffer);
        self.channel
            .await_token(commands::TOKEN_SEND_OK, commands::COMMAND_TIMEOUT_MS.millis())
            .map_err(Error::SendFailed)?;

        Ok(buffer.len())
    }

    /// Moves buffered payload bytes into `buffer`.
    ///
    /// Drains the transport once, then hands out as many de-framed bytes as
    /// fit. [nb::Error::WouldBlock] if no payload is available.
    fn receive(&mut self, socket: &mut Socket, buffer: &mut [u8]) -> nb::Result<usize, Error> {
        let link_id = socket.link_id.ok_or(Error::SocketUnused)?;

        self.buffers[link_id]
            .fill(&mut self.channel)
            .map_err(Error::ReceiveFailed)?;

        let mut count = 0;

        while count < buffer.len() {
            match self.buffers[link_id].pop() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }

        if count == 0 {
            return Err(nb::Error::WouldBlock);
        }

        Ok(count)
    }

    /// Closes the connection on a best-effort basis.
    ///
    /// The slot and the receive buffer are freed unconditionally, a missing
    /// close confirmation is logged but never surfaces as an error.
    fn close(&mut self, socket: Socket) -> Result<(), Error> {
        let Some(link_id) = socket.link_id else {
            return Ok(());
        };

        self.channel
            .send_command(commands::CLOSE_CONNECTION, CommandKind::Set(format_args!("{}", link_id)));

        if self
            .channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())
            .is_err()
        {
            warning!("close of link {} not confirmed", link_id);
        }

        self.table.local[link_id] = SlotState::Available;
        self.table.links[link_id] = LinkStatus::default();
        self.buffers[link_id].reset();
        Ok(())
    }
}
