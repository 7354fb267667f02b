use crate::buffer::{find, ResponseBuffer};

#[test]
fn find_returns_first_occurrence() {
    assert_eq!(Some(0), find(b"ababab", b"ab"));
    assert_eq!(Some(1), find(b"xabab", b"ab"));
    assert_eq!(Some(6), find(b"no gps OK\r\n", b"OK\r\n"));
}

#[test]
fn find_missing_needle() {
    assert_eq!(None, find(b"ERROR", b"OK"));
    assert_eq!(None, find(b"OK", b"OK\r\n"));
}

#[test]
fn find_empty_needle_matches_at_start() {
    assert_eq!(Some(0), find(b"anything", b""));
}

#[test]
fn push_discards_oldest_byte_when_full() {
    let mut buffer = ResponseBuffer::<4>::new();

    for byte in b"abcdef" {
        buffer.push(*byte);
    }

    assert_eq!(b"cdef", buffer.as_slice());
}

#[test]
fn contains_searches_the_whole_window() {
    let mut buffer = ResponseBuffer::<8>::new();

    for byte in b"xxOK\r\nyy" {
        buffer.push(*byte);
    }

    assert!(buffer.contains(b"OK\r\n"));
    assert!(!buffer.contains(b"ERROR"));
}

#[test]
fn clear_empties_the_window() {
    let mut buffer = ResponseBuffer::<8>::new();
    buffer.push(b'x');
    buffer.clear();

    assert_eq!(b"", buffer.as_slice());
    assert!(!buffer.contains(b"x"));
}
