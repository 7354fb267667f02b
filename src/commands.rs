//! AT command codes and response tokens of the ESP8266 AT firmware v1.3.

/// Command confirmed
pub(crate) const TOKEN_OK: &[u8] = b"OK\r\n";
/// Command rejected
pub(crate) const TOKEN_ERROR: &[u8] = b"ERROR\r\n";
/// Join to access point failed
pub(crate) const TOKEN_FAIL: &[u8] = b"FAIL";
/// Firmware finished booting after a reset
pub(crate) const TOKEN_READY: &[u8] = b"READY!";
/// Payload transmission confirmed
pub(crate) const TOKEN_SEND_OK: &[u8] = b"SEND OK";
/// Marker inside a failed connect reply signaling the link is already open
pub(crate) const TOKEN_ALREADY: &[u8] = b"ALREADY";

/// Liveness test, the bare "AT"
pub(crate) const TEST: &str = "";
/// Restarts the firmware
pub(crate) const RESET: &str = "+RST";
/// Enables command echo
pub(crate) const ECHO_ENABLE: &str = "E1";
/// Disables command echo
pub(crate) const ECHO_DISABLE: &str = "E0";
/// WiFi mode, persisted to flash
pub(crate) const WIFI_MODE: &str = "+CWMODE_DEF";
/// Joins an access point, persisted to flash
pub(crate) const JOIN_ACCESS_POINT: &str = "+CWJAP_DEF";
/// Leaves the current access point
pub(crate) const QUIT_ACCESS_POINT: &str = "+CWQAP";
/// Queries the station and per-link connection status
pub(crate) const CONNECTION_STATUS: &str = "+CIPSTATUS";
/// Opens a TCP or UDP connection
pub(crate) const START_CONNECTION: &str = "+CIPSTART";
/// Announces a payload transmission
pub(crate) const SEND_DATA: &str = "+CIPSEND";
/// Closes a connection
pub(crate) const CLOSE_CONNECTION: &str = "+CIPCLOSE";
/// Queries the local station address
pub(crate) const LOCAL_ADDRESS: &str = "+CIFSR";
/// Enables/disables multiple connections
pub(crate) const MULTIPLE_CONNECTIONS: &str = "+CIPMUX";

/// Response budget for ordinary commands
pub(crate) const COMMAND_TIMEOUT_MS: u32 = 1_000;
/// Response budget for a firmware reset
pub(crate) const RESET_TIMEOUT_MS: u32 = 5_000;
/// Response budget for opening a TCP/UDP connection
pub(crate) const CONNECT_TIMEOUT_MS: u32 = 5_000;
/// Response budget for joining an access point
pub(crate) const JOIN_TIMEOUT_MS: u32 = 30_000;

/// Line shape of an AT command: `AT<code>[? | =<params>]\r\n`
pub(crate) enum CommandKind<'a> {
    /// Plain execution, e.g. `AT+CIPSTATUS`
    Execute,
    /// Reads a setting, e.g. `AT+CWMODE_DEF?`
    Query,
    /// Writes a setting with parameters, e.g. `AT+CIPMUX=1`
    Set(core::fmt::Arguments<'a>),
}
