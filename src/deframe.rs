//! # Inbound payload de-framing
//!
//! The firmware announces inbound socket data inline in the byte stream as
//! `+IPD,<linkId>,<count>:` followed by exactly `count` raw payload bytes,
//! usually preceded by a CR/LF run. Continuation chunks of a payload split
//! across transport reads arrive without the marker, preceded only by a bare
//! line break. This module strips the framing so the application only ever
//! sees payload bytes.
//!
//! The announcement fields are parsed explicitly, digit widths of link id and
//! byte count do not matter.
use crate::channel::{CommandChannel, CommandError};
use crate::serial::SerialPort;
use fugit::ExtU32;
use fugit_timer::Timer;
use heapless::Vec;

/// Marker introducing an inbound payload announcement
const PAYLOAD_MARKER: &[u8] = b"+IPD";

/// Bounded number of drain rounds per fill step
const FILL_ATTEMPTS: usize = 5;

/// Pause between drain rounds, giving the UART time to deliver more bytes
const FILL_PAUSE_MS: u32 = 10;

/// Parse state of the announcement bytes following the marker
enum Announcement {
    /// Fully arrived: `skip` announcement bytes follow the marker, then
    /// `count` payload bytes
    Complete { skip: usize, count: usize },
    /// The announcement is still arriving, wait for more bytes
    Partial,
    /// The bytes after the marker are no announcement
    Invalid,
}

/// Per-socket buffer holding transport bytes with the framing stripped.
///
/// N is intentionally smaller than the worst-case announced chunk (~1450
/// bytes). Oversized payloads stream through across multiple fill steps, but
/// bytes the transport drops meanwhile are lost silently. This is a known
/// limitation of the fixed window, not an error condition.
pub(crate) struct DeframeBuffer<const N: usize> {
    /// Bytes pulled from the transport, framing already removed at the head
    data: Vec<u8, N>,

    /// Payload bytes of the last announcement not yet handed out
    remaining: usize,
}

impl<const N: usize> DeframeBuffer<N> {
    pub(crate) fn new() -> Self {
        Self {
            data: Vec::new(),
            remaining: 0,
        }
    }

    /// Drops buffered bytes and announcement state, used on connect and close
    pub(crate) fn reset(&mut self) {
        self.data.clear();
        self.remaining = 0;
    }

    /// Number of buffered bytes
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Pops the first buffered payload byte.
    ///
    /// Bytes that may still turn into a framing marker are held back until
    /// the announcement either completes or turns out to be none.
    pub(crate) fn pop(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            self.strip_framing();
        }

        if self.data.is_empty() {
            return None;
        }

        if self.remaining == 0 && holds_partial_announcement(self.data.as_slice()) {
            return None;
        }

        let byte = self.data[0];
        self.truncate_head(0, 1);
        self.remaining = self.remaining.saturating_sub(1);
        Some(byte)
    }

    /// Drains currently available transport bytes into the buffer, with a
    /// short pause between the bounded drain rounds, then strips framing.
    pub(crate) fn fill<S: SerialPort, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize>(
        &mut self,
        channel: &mut CommandChannel<S, T, TIMER_HZ, RX_SIZE>,
    ) -> Result<(), CommandError> {
        for _ in 0..FILL_ATTEMPTS {
            while channel.bytes_pending() > 0 && !self.data.is_full() {
                let Some(byte) = channel.read_raw() else {
                    break;
                };

                let _ = self.data.push(byte);
            }

            if self.data.is_full() {
                break;
            }

            channel.pause(FILL_PAUSE_MS.millis())?;
        }

        self.strip_framing();
        Ok(())
    }

    /// Removes at most one framing run from the buffer head.
    ///
    /// Framing is resolved strictly head-first: a later marker never
    /// outranks the bytes in front of it, and announced payload is never
    /// scanned for markers.
    pub(crate) fn strip_framing(&mut self) {
        if self.remaining > 0 {
            return;
        }

        let run = leading_line_break_run(self.data.as_slice());

        if run == self.data.len() {
            // Line breaks only so far, the next chunk decides what follows
            return;
        }

        let rest = &self.data[run..];

        if is_marker_prefix(rest) {
            if rest.len() < PAYLOAD_MARKER.len() {
                // Marker still arriving
                return;
            }

            match parse_announcement(&rest[PAYLOAD_MARKER.len()..]) {
                Announcement::Complete { skip, count } => {
                    self.truncate_head(0, run + PAYLOAD_MARKER.len() + skip);
                    self.remaining = count;
                }
                Announcement::Partial => {}
                Announcement::Invalid => {
                    // Malformed marker, drop it to keep the stream moving
                    self.truncate_head(0, run + PAYLOAD_MARKER.len());
                }
            }

            return;
        }

        if run > 0 {
            // Abbreviated continuation: a bare line break run, then raw
            // payload. Only bytes up to the next potential framing boundary
            // are claimed, a trailing line break or marker fragment may
            // belong to the next announcement.
            self.truncate_head(0, run);
            self.remaining = claimable(self.data.as_slice());
        }
    }

    /// Closes the gap left by removed framing bytes, an O(length) compaction
    fn truncate_head(&mut self, offset: usize, length: usize) {
        let end = self.data.len();
        self.data.copy_within(offset + length..end, offset);
        self.data.truncate(end - length);
    }
}

/// Parses `,<linkId>,<count>:` following the marker
fn parse_announcement(window: &[u8]) -> Announcement {
    let mut cursor = 0;

    match step_literal(window, &mut cursor, b',') {
        Step::Done => {}
        Step::Incomplete => return Announcement::Partial,
        Step::Violation => return Announcement::Invalid,
    }

    // The link id is not used for routing, the firmware interleaves at most
    // one announcement at a time on the shared transport
    match step_digits(window, &mut cursor) {
        (Step::Done, _) => {}
        (Step::Incomplete, _) => return Announcement::Partial,
        (Step::Violation, _) => return Announcement::Invalid,
    }

    match step_literal(window, &mut cursor, b',') {
        Step::Done => {}
        Step::Incomplete => return Announcement::Partial,
        Step::Violation => return Announcement::Invalid,
    }

    let count = match step_digits(window, &mut cursor) {
        (Step::Done, count) => count,
        (Step::Incomplete, _) => return Announcement::Partial,
        (Step::Violation, _) => return Announcement::Invalid,
    };

    match step_literal(window, &mut cursor, b':') {
        Step::Done => Announcement::Complete { skip: cursor, count },
        Step::Incomplete => Announcement::Partial,
        Step::Violation => Announcement::Invalid,
    }
}

enum Step {
    Done,
    Incomplete,
    Violation,
}

fn step_literal(window: &[u8], cursor: &mut usize, literal: u8) -> Step {
    match window.get(*cursor) {
        None => Step::Incomplete,
        Some(&byte) if byte == literal => {
            *cursor += 1;
            Step::Done
        }
        Some(_) => Step::Violation,
    }
}

/// Scans the maximal digit run. The run is only complete once a non-digit
/// byte follows, further digits may still be in flight at the window end.
fn step_digits(window: &[u8], cursor: &mut usize) -> (Step, usize) {
    let start = *cursor;
    let mut value: usize = 0;

    while let Some(&byte) = window.get(*cursor) {
        if !byte.is_ascii_digit() {
            break;
        }

        value = value.saturating_mul(10).saturating_add(usize::from(byte - b'0'));
        *cursor += 1;
    }

    if *cursor == start {
        if *cursor == window.len() {
            return (Step::Incomplete, 0);
        }

        return (Step::Violation, 0);
    }

    if *cursor == window.len() {
        return (Step::Incomplete, 0);
    }

    (Step::Done, value)
}

/// True if the buffer head may still grow into a full announcement
fn holds_partial_announcement(data: &[u8]) -> bool {
    let run = leading_line_break_run(data);

    if run == data.len() {
        return run > 0;
    }

    let rest = &data[run..];

    if rest.len() < PAYLOAD_MARKER.len() {
        return PAYLOAD_MARKER.starts_with(rest);
    }

    if rest.starts_with(PAYLOAD_MARKER) {
        return matches!(
            parse_announcement(&rest[PAYLOAD_MARKER.len()..]),
            Announcement::Partial
        );
    }

    false
}

/// True if the bytes are (a prefix of) the payload marker
fn is_marker_prefix(rest: &[u8]) -> bool {
    if rest.len() < PAYLOAD_MARKER.len() {
        return PAYLOAD_MARKER.starts_with(rest);
    }

    rest.starts_with(PAYLOAD_MARKER)
}

fn leading_line_break_run(data: &[u8]) -> usize {
    data.iter().take_while(|&&byte| byte == b'\r' || byte == b'\n').count()
}

/// Length of the continuation payload claim: stops at the next line break or
/// (fragment of a) marker, which may open the next announcement
fn claimable(data: &[u8]) -> usize {
    for (index, &byte) in data.iter().enumerate() {
        if byte == b'\r' || byte == b'\n' {
            return index;
        }

        if byte == PAYLOAD_MARKER[0] && is_marker_prefix(&data[index..]) {
            return index;
        }
    }

    data.len()
}
