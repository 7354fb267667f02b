use crate::channel::{CommandChannel, CommandError};
use crate::status::{parse_report, Protocol, Role, SocketTable, StationStatus, LINK_UNUSED};
use crate::tests::mock::{instant_timer, MockSerial, MockTimer, TIMER_HZ};
use embedded_nal::Ipv4Addr;

type Channel = CommandChannel<MockSerial, MockTimer, TIMER_HZ, 128>;

const REPORT: &[u8] = b"STATUS:3\r\n\
    +CIPSTATUS:0,\"TCP\",\"192.168.2.5\",8080,333,0\r\n\
    +CIPSTATUS:2,\"UDP\",\"10.0.0.1\",53,1025,1\r\n\
    \r\nOK\r\n";

#[test]
fn parses_station_and_link_records() {
    let (station, links) = parse_report(REPORT).unwrap();

    assert_eq!(StationStatus::Connected, station);

    assert_eq!(0, links[0].link_id);
    assert_eq!(Protocol::Tcp, links[0].protocol);
    assert_eq!(Ipv4Addr::new(192, 168, 2, 5), links[0].remote_address);
    assert_eq!(8080, links[0].remote_port);
    assert_eq!(333, links[0].local_port);
    assert_eq!(Role::Client, links[0].role);

    assert_eq!(2, links[2].link_id);
    assert_eq!(Protocol::Udp, links[2].protocol);
    assert_eq!(Role::Server, links[2].role);
}

#[test]
fn slots_without_record_stay_free() {
    let (_, links) = parse_report(REPORT).unwrap();

    assert_eq!(LINK_UNUSED, links[1].link_id);
    assert_eq!(LINK_UNUSED, links[3].link_id);
    assert_eq!(LINK_UNUSED, links[4].link_id);
}

#[test]
fn report_without_records_marks_all_slots_free() {
    let (station, links) = parse_report(b"STATUS:2\r\n\r\nOK\r\n").unwrap();

    assert_eq!(StationStatus::GotIp, station);
    assert!(links.iter().all(|link| link.link_id == LINK_UNUSED));
}

#[test]
fn station_codes_map_to_documented_range() {
    assert_eq!(
        StationStatus::Disconnected,
        parse_report(b"STATUS:4\r\nOK\r\n").unwrap().0
    );
    assert_eq!(StationStatus::NoWifi, parse_report(b"STATUS:5\r\nOK\r\n").unwrap().0);
}

#[test]
fn out_of_range_station_code_is_a_violation() {
    assert_eq!(Err(CommandError::Unknown), parse_report(b"STATUS:7\r\nOK\r\n"));
    assert_eq!(Err(CommandError::Unknown), parse_report(b"STATUS:1\r\nOK\r\n"));
}

#[test]
fn missing_station_marker_is_a_violation() {
    assert_eq!(Err(CommandError::Unknown), parse_report(b"OK\r\n"));
}

#[test]
fn non_decimal_field_is_a_violation() {
    let report = b"STATUS:3\r\n+CIPSTATUS:0,\"TCP\",\"192.168.2.5\",80x0,333,0\r\nOK\r\n";
    assert_eq!(Err(CommandError::Unknown), parse_report(report));
}

#[test]
fn unknown_connection_type_is_reported_undefined() {
    let report = b"STATUS:3\r\n+CIPSTATUS:0,\"SSL\",\"192.168.2.5\",443,333,0\r\nOK\r\n";
    let (_, links) = parse_report(report).unwrap();

    assert_eq!(Protocol::Undefined, links[0].protocol);
}

/// Link ids past the five slots terminate the scan instead of indexing out
/// of range
#[test]
fn out_of_range_link_id_terminates_scan() {
    let report = b"STATUS:3\r\n+CIPSTATUS:9,\"TCP\",\"192.168.2.5\",80,333,0\r\nOK\r\n";
    let (_, links) = parse_report(report).unwrap();

    assert!(links.iter().all(|link| link.link_id == LINK_UNUSED));
}

#[test]
fn refresh_replaces_the_snapshot() {
    let serial = MockSerial::new();
    serial.enqueue(REPORT);

    let mut channel = Channel::new(serial.clone(), instant_timer());
    let mut table = SocketTable::new();

    table.refresh(&mut channel).unwrap();

    assert_eq!("AT+CIPSTATUS\r\n", serial.written_string());
    assert_eq!(Some(StationStatus::Connected), table.station);
    assert!(table.is_link_active(0));
    assert!(!table.is_link_active(1));
    assert_eq!(Some(1), table.first_free());

    // Next refresh overwrites, stale links do not linger
    serial.enqueue(b"STATUS:4\r\n\r\nOK\r\n");
    table.refresh(&mut channel).unwrap();

    assert_eq!(Some(StationStatus::Disconnected), table.station);
    assert!(!table.is_link_active(0));
    assert_eq!(Some(0), table.first_free());
}

#[test]
fn refresh_propagates_timeouts() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial, instant_timer());
    let mut table = SocketTable::new();

    assert_eq!(Err(CommandError::Timeout), table.refresh(&mut channel));
}

#[test]
fn all_slots_occupied_leaves_no_free_slot() {
    let report = b"STATUS:3\r\n\
        +CIPSTATUS:0,\"TCP\",\"10.0.0.1\",80,1,0\r\n\
        +CIPSTATUS:1,\"TCP\",\"10.0.0.1\",80,2,0\r\n\
        +CIPSTATUS:2,\"TCP\",\"10.0.0.1\",80,3,0\r\n\
        +CIPSTATUS:3,\"TCP\",\"10.0.0.1\",80,4,0\r\n\
        +CIPSTATUS:4,\"TCP\",\"10.0.0.1\",80,5,0\r\n\
        OK\r\n";

    let (_, links) = parse_report(report).unwrap();
    assert!(links.iter().all(|link| link.link_id != LINK_UNUSED));
}
