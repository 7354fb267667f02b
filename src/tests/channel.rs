use crate::channel::{CommandChannel, CommandError};
use crate::commands::CommandKind;
use crate::tests::mock::{instant_timer, MockSerial, MockTimer, TIMER_HZ};
use fugit::ExtU32;

type Channel = CommandChannel<MockSerial, MockTimer, TIMER_HZ, 128>;

#[test]
fn execute_command_line() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial.clone(), instant_timer());

    channel.send_command("+CIPSTATUS", CommandKind::Execute);
    assert_eq!("AT+CIPSTATUS\r\n", serial.written_string());
}

#[test]
fn bare_test_command_line() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial.clone(), instant_timer());

    channel.send_command("", CommandKind::Execute);
    assert_eq!("AT\r\n", serial.written_string());
}

#[test]
fn query_command_line() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial.clone(), instant_timer());

    channel.send_command("+CWMODE_DEF", CommandKind::Query);
    assert_eq!("AT+CWMODE_DEF?\r\n", serial.written_string());
}

#[test]
fn set_command_line_with_parameters() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial.clone(), instant_timer());

    channel.send_command("+CIPSTART", CommandKind::Set(format_args!("{},\"{}\"", 2, "TCP")));
    assert_eq!("AT+CIPSTART=2,\"TCP\"\r\n", serial.written_string());
}

#[test]
fn await_token_counts_bytes_up_to_token() {
    let serial = MockSerial::new();
    serial.enqueue(b"no change\r\nOK\r\n");

    let mut channel = Channel::new(serial, instant_timer());
    assert_eq!(Ok(15), channel.await_token(b"OK\r\n", 1_000u32.millis()));
}

#[test]
fn await_token_unknown_on_unmatched_reply() {
    let serial = MockSerial::new();
    serial.enqueue(b"boot garbage");

    let mut channel = Channel::new(serial, instant_timer());
    assert_eq!(
        Err(CommandError::Unknown),
        channel.await_token(b"OK\r\n", 1_000u32.millis())
    );
}

#[test]
fn await_token_timeout_on_silence() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial, instant_timer());

    assert_eq!(
        Err(CommandError::Timeout),
        channel.await_token(b"OK\r\n", 1_000u32.millis())
    );
}

#[test]
fn await_token_starts_timer_with_given_deadline() {
    let serial = MockSerial::new();
    serial.enqueue(b"OK\r\n");

    let mut timer = MockTimer::new();
    timer.expect_start().times(1).returning(|duration| {
        assert_eq!(5_000, duration.to_millis());
        Ok(())
    });
    timer.expect_wait().returning(|| Ok(()));

    let mut channel = Channel::new(serial, timer);
    channel.await_token(b"OK\r\n", 5_000u32.millis()).unwrap();
}

#[test]
fn await_response_passes_on_pass_token() {
    let serial = MockSerial::new();
    serial.enqueue(b"0,CONNECT\r\n\r\nOK\r\n");

    let mut channel = Channel::new(serial, instant_timer());
    assert!(channel.await_response(b"OK\r\n", b"ERROR\r\n", 5_000u32.millis()).is_ok());
}

#[test]
fn await_response_fails_on_fail_token() {
    let serial = MockSerial::new();
    serial.enqueue(b"\r\nERROR\r\n");

    let mut channel = Channel::new(serial, instant_timer());
    assert_eq!(
        Err(CommandError::Fail),
        channel.await_response(b"OK\r\n", b"ERROR\r\n", 5_000u32.millis())
    );
}

/// Both tokens complete on the same byte, the failure wins
#[test]
fn await_response_checks_fail_token_first() {
    let serial = MockSerial::new();
    serial.enqueue(b"OK\r\n");

    let mut channel = Channel::new(serial, instant_timer());
    assert_eq!(
        Err(CommandError::Fail),
        channel.await_response(b"OK\r\n", b"K\r\n", 1_000u32.millis())
    );
}

#[test]
fn await_response_timeout_on_silence() {
    let serial = MockSerial::new();
    let mut channel = Channel::new(serial, instant_timer());

    assert_eq!(
        Err(CommandError::Timeout),
        channel.await_response(b"OK\r\n", b"ERROR\r\n", 1_000u32.millis())
    );
}

#[test]
fn window_holds_the_reply_of_the_last_command() {
    let serial = MockSerial::new();
    serial.enqueue(b"STATUS:2\r\nOK\r\n");

    let mut channel = Channel::new(serial, instant_timer());
    channel.await_token(b"OK\r\n", 1_000u32.millis()).unwrap();

    assert_eq!(b"STATUS:2\r\nOK\r\n", channel.window());
    assert!(channel.window_contains(b"STATUS:"));
}

#[test]
fn window_is_cleared_between_commands() {
    let serial = MockSerial::new();
    serial.enqueue(b"first OK\r\n");

    let mut channel = Channel::new(serial.clone(), instant_timer());
    channel.await_token(b"OK\r\n", 1_000u32.millis()).unwrap();

    serial.enqueue(b"second OK\r\n");
    channel.await_token(b"OK\r\n", 1_000u32.millis()).unwrap();

    assert!(!channel.window_contains(b"first"));
    assert!(channel.window_contains(b"second"));
}
