//! # Socket table and connection status report
//!
//! The firmware's `AT+CIPSTATUS` report is the authoritative view on the five
//! link slots. The table is pull-based: it is only as fresh as the last
//! [SocketTable::refresh] call, and slot allocation always trusts the
//! firmware view over local bookkeeping to avoid divergence after a silently
//! dropped connection.
use crate::buffer::find;
use crate::channel::{CommandChannel, CommandError};
use crate::commands::{self, CommandKind};
use crate::serial::SerialPort;
use embedded_nal::Ipv4Addr;
use fugit::ExtU32;
use fugit_timer::Timer;

/// Maximum number of parallel connections supported by the firmware
pub const MAX_SOCKETS: usize = 5;

/// Link id the firmware reports for a free slot
pub const LINK_UNUSED: u8 = 255;

/// Record marker preceding the station status code
const STATION_MARKER: &[u8] = b"STATUS:";

/// Record marker preceding each per-link record
const LINK_MARKER: &[u8] = b"+CIPSTATUS:";

/// Transport protocol of a link
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    /// The firmware reported a type this driver does not know
    Undefined,
}

impl Protocol {
    /// Connection type parameter of the `AT+CIPSTART` command
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Undefined => "",
        }
    }
}

/// Whether the local side acts as client or server on a link
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Overall station interface status, the `<stat>` code of the report
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StationStatus {
    /// Connected to an access point and an IP is assigned (code 2)
    GotIp,
    /// At least one TCP or UDP transmission is open (code 3)
    Connected,
    /// All transmissions are closed, WiFi still joined (code 4)
    Disconnected,
    /// Not joined to an access point (code 5)
    NoWifi,
}

impl StationStatus {
    /// Maps the documented code range, anything else is a protocol violation
    fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::GotIp),
            3 => Some(Self::Connected),
            4 => Some(Self::Disconnected),
            5 => Some(Self::NoWifi),
            _ => None,
        }
    }
}

/// One slot of the firmware's link table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkStatus {
    /// Firmware link id, [LINK_UNUSED] while the slot is free
    pub link_id: u8,

    /// Transport protocol of the link
    pub protocol: Protocol,

    /// Remote peer address
    pub remote_address: Ipv4Addr,

    /// Remote peer port
    pub remote_port: u16,

    /// Local port of the link
    pub local_port: u16,

    /// Client or server role of the local side
    pub role: Role,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            link_id: LINK_UNUSED,
            protocol: Protocol::Undefined,
            remote_address: Ipv4Addr::new(0, 0, 0, 0),
            remote_port: 0,
            local_port: 0,
            role: Role::Client,
        }
    }
}

/// Locally requested state of a slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Slot may be handed out by the next connect
    Available,
    /// Slot is bound to a socket handle
    Taken,
}

/// Reconciles locally requested connections with the firmware's report.
///
/// A slot is usable only while it is locally [SlotState::Taken] and the last
/// refresh reported the same link as active.
pub(crate) struct SocketTable {
    /// Locally requested slot states, index = link id
    pub(crate) local: [SlotState; MAX_SOCKETS],

    /// Authoritative per-link state from the last refresh
    pub(crate) links: [LinkStatus; MAX_SOCKETS],

    /// Station status from the last refresh, None before the first one
    pub(crate) station: Option<StationStatus>,
}

impl SocketTable {
    pub(crate) fn new() -> Self {
        Self {
            local: [SlotState::Available; MAX_SOCKETS],
            links: [LinkStatus::default(); MAX_SOCKETS],
            station: None,
        }
    }

    /// Issues a status query and replaces the authoritative snapshot
    pub(crate) fn refresh<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize>(
        &mut self,
        channel: &mut CommandChannel<S, T, TIMER_HZ, RX_SIZE>,
    ) -> Result<(), CommandError> {
        channel.send_command(commands::CONNECTION_STATUS, CommandKind::Execute);
        channel.await_token(commands::TOKEN_OK, commands::COMMAND_TIMEOUT_MS.millis())?;

        let (station, links) = parse_report(channel.window())?;
        self.station = Some(station);
        self.links = links;
        Ok(())
    }

    /// First slot the firmware considers free, None if all are occupied
    pub(crate) fn first_free(&self) -> Option<usize> {
        self.links.iter().position(|link| link.link_id == LINK_UNUSED)
    }

    /// Returns true if the last snapshot reported the given link as active
    pub(crate) fn is_link_active(&self, link_id: usize) -> bool {
        self.links[link_id].link_id != LINK_UNUSED
    }
}

/// Parses the full `AT+CIPSTATUS` reply window.
///
/// Slots without a record are reported as free. A missing record marker or a
/// non-decimal byte where a number is expected yields
/// [CommandError::Unknown], never a panic.
pub(crate) fn parse_report(
    window: &[u8],
) -> Result<(StationStatus, [LinkStatus; MAX_SOCKETS]), CommandError> {
    let marker = find(window, STATION_MARKER).ok_or(CommandError::Unknown)?;
    let mut cursor = marker + STATION_MARKER.len();

    let code = take_number(window, &mut cursor).ok_or(CommandError::Unknown)?;
    let station = StationStatus::from_code(code).ok_or(CommandError::Unknown)?;

    let mut links = [LinkStatus::default(); MAX_SOCKETS];

    for _ in 0..MAX_SOCKETS {
        // Absent records leave the remaining slots marked free
        let Some(offset) = find(&window[cursor..], LINK_MARKER) else {
            break;
        };

        cursor += offset + LINK_MARKER.len();
        let record = parse_record(window, &mut cursor)?;

        // Out-of-range ids terminate the scan, matching the firmware limit
        if usize::from(record.link_id) >= MAX_SOCKETS {
            break;
        }

        links[usize::from(record.link_id)] = record;
    }

    Ok((station, links))
}

/// Parses one `<linkId>,"<type>","<ip>",<remotePort>,<localPort>,<role>` record
fn parse_record(window: &[u8], cursor: &mut usize) -> Result<LinkStatus, CommandError> {
    let link_id = take_number(window, cursor).ok_or(CommandError::Unknown)?;
    let link_id = u8::try_from(link_id).map_err(|_| CommandError::Unknown)?;

    expect(window, cursor, b",\"")?;
    let protocol = match take_until(window, cursor, b'"')? {
        b"TCP" => Protocol::Tcp,
        b"UDP" => Protocol::Udp,
        _ => Protocol::Undefined,
    };

    expect(window, cursor, b",\"")?;
    let remote_address = take_address(window, cursor)?;
    expect(window, cursor, b"\",")?;

    let remote_port = take_port(window, cursor)?;
    expect(window, cursor, b",")?;
    let local_port = take_port(window, cursor)?;
    expect(window, cursor, b",")?;

    let role = match take_number(window, cursor).ok_or(CommandError::Unknown)? {
        0 => Role::Client,
        1 => Role::Server,
        _ => return Err(CommandError::Unknown),
    };

    Ok(LinkStatus {
        link_id,
        protocol,
        remote_address,
        remote_port,
        local_port,
        role,
    })
}

/// Parses four period-delimited decimal octets
pub(crate) fn take_address(window: &[u8], cursor: &mut usize) -> Result<Ipv4Addr, CommandError> {
    let mut octets = [0u8; 4];

    for (index, octet) in octets.iter_mut().enumerate() {
        let value = take_number(window, cursor).ok_or(CommandError::Unknown)?;
        *octet = u8::try_from(value).map_err(|_| CommandError::Unknown)?;

        if index < 3 {
            expect(window, cursor, b".")?;
        }
    }

    Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

/// Parses a decimal port number
fn take_port(window: &[u8], cursor: &mut usize) -> Result<u16, CommandError> {
    let value = take_number(window, cursor).ok_or(CommandError::Unknown)?;
    u16::try_from(value).map_err(|_| CommandError::Unknown)
}

/// Scans the maximal run of decimal digits at the cursor.
/// None if the run is empty or the value overflows.
pub(crate) fn take_number(window: &[u8], cursor: &mut usize) -> Option<u32> {
    let start = *cursor;
    let mut value: u32 = 0;

    while let Some(&byte) = window.get(*cursor) {
        if !byte.is_ascii_digit() {
            break;
        }

        value = value.checked_mul(10)?.checked_add(u32::from(byte - b'0'))?;
        *cursor += 1;
    }

    if *cursor == start {
        return None;
    }

    Some(value)
}

/// Consumes the exact literal at the cursor
pub(crate) fn expect(window: &[u8], cursor: &mut usize, literal: &[u8]) -> Result<(), CommandError> {
    let end = *cursor + literal.len();

    if window.len() < end || &window[*cursor..end] != literal {
        return Err(CommandError::Unknown);
    }

    *cursor = end;
    Ok(())
}

/// Consumes bytes up to (and including) the delimiter, returning the field
fn take_until<'a>(window: &'a [u8], cursor: &mut usize, delimiter: u8) -> Result<&'a [u8], CommandError> {
    let start = *cursor;

    while let Some(&byte) = window.get(*cursor) {
        *cursor += 1;

        if byte == delimiter {
            return Ok(&window[start..*cursor - 1]);
        }
    }

    Err(CommandError::Unknown)
}
