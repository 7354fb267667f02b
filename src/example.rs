//! Canned serial port and timer used by the documentation examples.
//!
//! [ExampleSerial] answers every command line with a plausible firmware
//! reply, so the examples run without hardware. Not intended for anything
//! beyond documentation.
use crate::serial::SerialPort;
use fugit::{TimerDurationU32, TimerInstantU32};
use heapless::{Deque, Vec};

/// Serial port stub replying to each command with a canned firmware answer
#[derive(Default)]
pub struct ExampleSerial {
    /// Pending inbound bytes
    rx: Deque<u8, 1024>,

    /// Command line currently being written
    line: Vec<u8, 128>,

    /// Raw payload bytes still expected after a transmission announcement
    pending_payload: usize,
}

impl ExampleSerial {
    fn enqueue(&mut self, reply: &[u8]) {
        for &byte in reply {
            let _ = self.rx.push_back(byte);
        }
    }

    fn dispatch(&mut self) {
        if self.line.starts_with(b"AT+CIPSEND=") {
            self.pending_payload = announced_length(self.line.as_slice());
            self.enqueue(b"OK\r\n> ");
            return;
        }

        if self.line.starts_with(b"AT+CIFSR") {
            self.enqueue(b"+CIFSR:STAIP,\"10.0.0.181\"\r\n\r\nOK\r\n");
            return;
        }

        if self.line.starts_with(b"AT+CIPSTATUS") {
            self.enqueue(b"STATUS:2\r\n\r\nOK\r\n");
            return;
        }

        if self.line.starts_with(b"AT+CIPSTART=") {
            self.enqueue(b"0,CONNECT\r\n\r\nOK\r\n");
            return;
        }

        if self.line.starts_with(b"AT+CIPCLOSE=") {
            self.enqueue(b"0,CLOSED\r\n\r\nOK\r\n");
            return;
        }

        self.enqueue(b"OK\r\n");
    }

    /// Confirms the finished transmission and hands back a response payload
    fn payload_received(&mut self) {
        self.enqueue(b"\r\nRecv bytes\r\nSEND OK\r\n");
        self.enqueue(b"\r\n+IPD,0,8:HTTP/1.1");
    }
}

impl SerialPort for ExampleSerial {
    fn write(&mut self, buffer: &[u8]) {
        for &byte in buffer {
            if self.pending_payload > 0 {
                self.pending_payload -= 1;

                if self.pending_payload == 0 {
                    self.payload_received();
                }

                continue;
            }

            let _ = self.line.push(byte);

            if self.line.ends_with(b"\r\n") {
                self.dispatch();
                self.line.clear();
            }
        }
    }

    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn read(&mut self) -> nb::Result<u8, core::convert::Infallible> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Extracts the byte count of `AT+CIPSEND=<linkId>,<length>`
fn announced_length(line: &[u8]) -> usize {
    let mut length = 0;
    let Some(comma) = line.iter().rposition(|&byte| byte == b',') else {
        return 0;
    };

    for &byte in &line[comma + 1..] {
        if !byte.is_ascii_digit() {
            break;
        }

        length = length * 10 + usize::from(byte - b'0');
    }

    length
}

/// Timer stub whose deadlines expire immediately
#[derive(Default)]
pub struct ExampleTimer;

impl fugit_timer::Timer<1_000_000> for ExampleTimer {
    type Error = core::convert::Infallible;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        TimerInstantU32::from_ticks(0)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}
