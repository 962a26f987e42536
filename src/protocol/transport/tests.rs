//! Transfer descriptor tests: bytes left on the line per window.
use super::*;
use crate::core::{HEADER_LEN, MAX_FRAME_LEN};

#[test]
/// Preamble and outbound windows come entirely from the line
fn test_wire_len_full_windows() {
    let mut preamble = [0u8; RX_PREAMBLE_LEN];
    let transfer = Transfer::Receive {
        offset: 0,
        bytes: &mut preamble,
    };
    assert_eq!(transfer.wire_len(), RX_PREAMBLE_LEN);

    let ack = [0u8; 10];
    let transfer = Transfer::Send {
        offset: 0,
        bytes: &ack,
    };
    assert_eq!(transfer.wire_len(), 10);
}

#[test]
/// The payload window skips the footer-sized tail of the preamble
fn test_wire_len_payload_window() {
    // 3-byte payload: frame of 13, window 6..13, 3 bytes still on the line.
    let mut window = [0u8; 7];
    let transfer = Transfer::Receive {
        offset: HEADER_LEN,
        bytes: &mut window,
    };
    assert_eq!(transfer.len(), 7);
    assert_eq!(transfer.wire_len(), 3);

    let mut largest = [0u8; MAX_FRAME_LEN - HEADER_LEN];
    let transfer = Transfer::Receive {
        offset: HEADER_LEN,
        bytes: &mut largest,
    };
    assert_eq!(transfer.wire_len(), MAX_FRAME_LEN - RX_PREAMBLE_LEN);
}

#[test]
/// An empty payload leaves nothing to wait for
fn test_wire_len_empty_payload() {
    let mut window = [0u8; 4];
    let transfer = Transfer::Receive {
        offset: HEADER_LEN,
        bytes: &mut window,
    };
    assert_eq!(transfer.wire_len(), 0);
}
