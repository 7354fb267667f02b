//! # Modem control and access point management
//!
//! [Adapter] owns the command channel, the socket table and the per-socket
//! receive buffers. This module covers the non-socket side: bring-up, reset,
//! echo and mode settings, joining and leaving an access point and reading
//! the local station address. The socket operations live in [crate::stack].
//!
//! ```
//! use esp8266_at_client::example::{ExampleSerial, ExampleTimer};
//! use esp8266_at_client::wifi::{Adapter, WifiAdapter};
//!
//! let serial = ExampleSerial::default();
//! let timer = ExampleTimer::default();
//! let mut adapter: Adapter<_, _, 1_000_000, 128, 256> = Adapter::new(serial, timer, 115_200);
//!
//! adapter.begin().unwrap();
//! adapter.join("unknown_network", "secret").unwrap();
//!
//! let address = adapter.local_address().unwrap();
//! assert_eq!("10.0.0.181", address.to_string());
//! ```
use crate::channel::{CommandChannel, CommandError};
use crate::commands::{self, CommandKind};
use crate::deframe::DeframeBuffer;
use crate::serial::SerialPort;
use crate::status::{self, SocketTable, MAX_SOCKETS};
use embedded_nal::Ipv4Addr;
use fugit::ExtU32;
use fugit_timer::Timer;

/// Errors when joining an access point
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinError {
    /// SSID is longer than the 32 bytes the firmware accepts
    InvalidSsidLength,

    /// Password is longer than the 63 bytes the firmware accepts
    InvalidPasswordLength,

    /// The firmware rejected the credentials or did not find the network
    JoinFailed,

    /// Command channel failure while joining
    CommandFailed(CommandError),
}

/// Errors when reading the local station address
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressError {
    /// Command channel failure while querying
    CommandFailed(CommandError),

    /// The reply did not carry a parseable station address
    AddressParseError,
}

/// WiFi operation mode of the modem, persisted to flash by the firmware
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WifiMode {
    /// Client of an access point
    Station,
    /// Acts as access point itself
    AccessPoint,
    /// Station and access point at the same time
    Mixed,
}

impl WifiMode {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Station),
            2 => Some(Self::AccessPoint),
            3 => Some(Self::Mixed),
            _ => None,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Station => 1,
            Self::AccessPoint => 2,
            Self::Mixed => 3,
        }
    }
}

/// Access point operations
pub trait WifiAdapter {
    /// Error when joining an access point
    type JoinError;

    /// Error when leaving an access point
    type LeaveError;

    /// Error when reading the local address
    type AddressError;

    /// Joins the given access point with the given credentials
    fn join(&mut self, ssid: &str, key: &str) -> Result<(), Self::JoinError>;

    /// Leaves the current access point
    fn disconnect(&mut self) -> Result<(), Self::LeaveError>;

    /// Returns the local station address assigned by the access point
    fn local_address(&mut self) -> Result<Ipv4Addr, Self::AddressError>;
}

/// Central driver state: command channel, socket table and receive buffers.
///
/// - TIMER_HZ: frequency of the injected timer
/// - RX_SIZE: capacity of the command reply window in bytes. The status
///   report grows to roughly 45 bytes per open link, so 256 is a sensible
///   lower bound when all five slots may be in use
/// - DF_SIZE: per-socket receive buffer capacity in bytes
pub struct Adapter<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize, const DF_SIZE: usize> {
    pub(crate) channel: CommandChannel<S, T, TIMER_HZ, RX_SIZE>,

    pub(crate) table: SocketTable,

    /// One de-framing buffer per link slot
    pub(crate) buffers: [DeframeBuffer<DF_SIZE>; MAX_SOCKETS],

    /// Transport baud rate, used for the byte arrival time heuristic
    pub(crate) baud_rate: u32,

    /// TCP keep-alive interval handed to the firmware on connect, in seconds
    pub(crate) keep_alive_secs: Option<u16>,

    /// Set once `AT+CIPMUX=1` was confirmed
    pub(crate) multiplexing_enabled: bool,
}

impl<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize, const DF_SIZE: usize>
    Adapter<S, T, TIMER_HZ, RX_SIZE, DF_SIZE>
{
    /// Creates a new adapter. `baud_rate` is the rate of the given serial
    /// link, it is not configured here but drives the receive pacing.
    pub fn new(serial: S, timer: T, baud_rate: u32) -> Self {
        Self {
            channel: CommandChannel::new(serial, timer),
            table: SocketTable::new(),
            buffers: core::array::from_fn(|_| DeframeBuffer::new()),
            baud_rate,
            keep_alive_secs: None,
            multiplexing_enabled: false,
        }
    }

    /// Brings the modem into the state the driver relies on: confirms
    /// liveness, disables command echo and enables multiple connections.
    pub fn begin(&mut self) -> Result<(), CommandError> {
        self.test()?;
        self.set_echo(false)?;
        self.enable_multiplexing()
    }

    /// Confirms the modem answers to the bare `AT`
    pub fn test(&mut self) -> Result<(), CommandError> {
        self.channel.send_command(commands::TEST, CommandKind::Execute);
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;
        Ok(())
    }

    /// Restarts the firmware and waits for it to finish booting.
    ///
    /// All sockets and the multiplexing setting are gone afterwards, the
    /// local state is reset accordingly.
    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.channel.send_command(commands::RESET, CommandKind::Execute);
        self.channel
            .await_token(commands::TOKEN_READY, commands::RESET_TIMEOUT_MS.millis())?;

        self.multiplexing_enabled = false;
        self.table = SocketTable::new();

        for buffer in &mut self.buffers {
            buffer.reset();
        }

        Ok(())
    }

    /// Enables or disables the command echo of the firmware
    pub fn set_echo(&mut self, enabled: bool) -> Result<(), CommandError> {
        let code = if enabled {
            commands::ECHO_ENABLE
        } else {
            commands::ECHO_DISABLE
        };

        self.channel.send_command(code, CommandKind::Execute);
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;
        Ok(())
    }

    /// Reads the current WiFi mode
    pub fn get_mode(&mut self) -> Result<WifiMode, CommandError> {
        self.channel.send_command(commands::WIFI_MODE, CommandKind::Query);
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;

        let window = self.channel.window();
        let marker = crate::buffer::find(window, b"+CWMODE_DEF:").ok_or(CommandError::Unknown)?;
        let mut cursor = marker + b"+CWMODE_DEF:".len();

        let code = status::take_number(window, &mut cursor).ok_or(CommandError::Unknown)?;
        WifiMode::from_code(code).ok_or(CommandError::Unknown)
    }

    /// Sets the WiFi mode, persisted to flash by the firmware
    pub fn set_mode(&mut self, mode: WifiMode) -> Result<(), CommandError> {
        self.channel
            .send_command(commands::WIFI_MODE, CommandKind::Set(format_args!("{}", mode.code())));
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;
        Ok(())
    }

    /// Keep-alive interval the firmware applies to new TCP connections.
    /// None (the default) omits the parameter on connect.
    pub fn set_keep_alive(&mut self, seconds: Option<u16>) {
        self.keep_alive_secs = seconds;
    }

    /// Enables multiple connections once, a no-op on later calls
    pub(crate) fn enable_multiplexing(&mut self) -> Result<(), CommandError> {
        if self.multiplexing_enabled {
            return Ok(());
        }

        self.channel
            .send_command(commands::MULTIPLE_CONNECTIONS, CommandKind::Set(format_args!("1")));
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;

        self.multiplexing_enabled = true;
        Ok(())
    }
}

impl<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize, const DF_SIZE: usize> WifiAdapter
    for Adapter<S, T, TIMER_HZ, RX_SIZE, DF_SIZE>
{
    type JoinError = JoinError;
    type LeaveError = CommandError;
    type AddressError = AddressError;

    /// Joins the given access point, blocking for up to thirty seconds.
    /// The credentials are persisted to flash by the firmware.
    fn join(&mut self, ssid: &str, key: &str) -> Result<(), JoinError> {
        if ssid.len() > 32 {
            return Err(JoinError::InvalidSsidLength);
        }

        if key.len() > 63 {
            return Err(JoinError::InvalidPasswordLength);
        }

        debug!("joining access point");
        self.channel.send_command(
            commands::JOIN_ACCESS_POINT,
            CommandKind::Set(format_args!("\"{}\",\"{}\"", ssid, key)),
        );

        match self
            .channel
            .await_response(commands::TOKEN_OK, commands::TOKEN_FAIL, commands::JOIN_TIMEOUT_MS.millis())
        {
            Ok(_) => Ok(()),
            Err(CommandError::Fail) => Err(JoinError::JoinFailed),
            Err(error) => Err(JoinError::CommandFailed(error)),
        }
    }

    /// Leaves the current access point. The firmware confirms with `OK`
    /// before the asynchronous disconnect notification arrives, which is
    /// drained here on a best-effort basis.
    fn disconnect(&mut self) -> Result<(), CommandError> {
        self.channel
            .send_command(commands::QUIT_ACCESS_POINT, CommandKind::Execute);
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;

        // The trailing notification is optional, ignore a missing one
        let _ = self
            .channel
            .await_token(b"WIFI DISCONNECT", commands::COMMAND_TIMEOUT_MS.millis());

        Ok(())
    }

    /// Reads the station address from the `AT+CIFSR` report
    fn local_address(&mut self) -> Result<Ipv4Addr, AddressError> {
        self.channel
            .send_command(commands::LOCAL_ADDRESS, CommandKind::Execute);
        self.channel
            .await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())
            .map_err(AddressError::CommandFailed)?;

        let window = self.channel.window();
        let marker = crate::buffer::find(window, b"STAIP,\"").ok_or(AddressError::AddressParseError)?;
        let mut cursor = marker + b"STAIP,\"".len();

        status::take_address(window, &mut cursor).map_err(|_| AddressError::AddressParseError)
    }
}
