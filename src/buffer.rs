//! Fixed window over the most recent bytes received from the modem.

use heapless::Vec;

/// Returns the position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    if needle.len() > haystack.len() {
        return None;
    }

    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Byte window holding the reply of the command currently in flight.
///
/// The window never grows past `N`: once full, the oldest byte is discarded
/// for every new one. Losing the head of an oversized reply is accepted, the
/// expected tokens sit at the end of the reply stream.
pub(crate) struct ResponseBuffer<const N: usize> {
    data: Vec<u8, N>,
}

impl<const N: usize> ResponseBuffer<N> {
    pub(crate) fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Drops all content. Called before every command issuance.
    pub(crate) fn clear(&mut self) {
        self.data.clear();
    }

    /// Appends one byte, discarding the oldest byte if the window is full.
    pub(crate) fn push(&mut self, byte: u8) {
        if self.data.push(byte).is_err() {
            let length = self.data.len();
            self.data.copy_within(1..length, 0);
            self.data[length - 1] = byte;
        }
    }

    /// All currently buffered bytes, oldest first. The search window is the
    /// whole content, also when the buffer is completely full.
    pub(crate) fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Returns true if `token` occurs anywhere in the window.
    pub(crate) fn contains(&self, token: &[u8]) -> bool {
        find(self.data.as_slice(), token).is_some()
    }
}
