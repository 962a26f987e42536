//! Packet framer: computes transfer boundaries, appends and checks the
//! sequence/CRC footer, and lays out acknowledgment frames. No I/O happens here.
use crate::core::{
    ACK_FRAME_LEN, ACK_HEADER, ACK_STATUS_OFFSET, CHECKSUM_LEN, FOOTER_LEN, HEADER_LEN,
    PAYLOAD_LEN_OFFSET, SEQUENCE_LEN,
};
use crate::error::MpipeError;
use crate::infra::checksum::Checksum;

//==================================================================================DATA_FRAMES
/// Payload length announced by a header, `None` when fewer than
/// [`HEADER_LEN`] bytes are available.
pub fn payload_length(header: &[u8]) -> Option<usize> {
    if header.len() < HEADER_LEN {
        return None;
    }
    Some(header[PAYLOAD_LEN_OFFSET] as usize)
}

/// Total on-wire length of the frame opened by `header`:
/// header + announced payload + footer.
pub fn frame_length(header: &[u8]) -> Option<usize> {
    payload_length(header).map(|payload| HEADER_LEN + payload + FOOTER_LEN)
}

/// Write `sequence` (big-endian) right after the first `used` bytes, then the
/// CRC of everything up to and including that sequence.
///
/// Returns the new total length (`used + 4`).
///
/// # Errors
///
/// [`MpipeError::BufferTooSmall`] when the buffer has less than four spare
/// bytes after `used`.
pub fn append_footer<C: Checksum>(
    buffer: &mut [u8],
    used: usize,
    sequence: u16,
    codec: &C,
) -> Result<usize, MpipeError> {
    let total = used + FOOTER_LEN;
    if buffer.len() < total {
        return Err(MpipeError::BufferTooSmall {
            needed: total,
            available: buffer.len(),
        });
    }

    let checksum_at = used + SEQUENCE_LEN;
    buffer[used..checksum_at].copy_from_slice(&sequence.to_be_bytes());
    let crc = codec.checksum(&buffer[..checksum_at]);
    buffer[checksum_at..total].copy_from_slice(&crc.to_be_bytes());

    Ok(total)
}

/// Check a complete received frame, footer included: the checksum over the
/// whole frame must be zero.
pub fn validate<C: Checksum>(frame: &[u8], codec: &C) -> bool {
    frame.len() >= CHECKSUM_LEN && codec.verify(frame)
}

/// Sequence number carried by the footer of a complete frame.
pub fn footer_sequence(frame: &[u8]) -> Option<u16> {
    let at = frame.len().checked_sub(FOOTER_LEN)?;
    Some(u16::from_be_bytes([frame[at], frame[at + 1]]))
}

//==================================================================================ACK_FRAMES
/// Fill `ack` with an acknowledgment for `sequence`.
///
/// Layout: `DD 00 00 02 00 <status> <seq hi> <seq lo> <crc hi> <crc lo>`.
/// A zero `status` is an ACK, anything else a NACK.
pub fn write_ack<C: Checksum>(
    ack: &mut [u8; ACK_FRAME_LEN],
    sequence: u16,
    status: u8,
    codec: &C,
) {
    ack[..HEADER_LEN].copy_from_slice(&ACK_HEADER);
    ack[ACK_STATUS_OFFSET] = status;
    ack[HEADER_LEN..HEADER_LEN + SEQUENCE_LEN].copy_from_slice(&sequence.to_be_bytes());
    let crc = codec.checksum(&ack[..HEADER_LEN + SEQUENCE_LEN]);
    ack[HEADER_LEN + SEQUENCE_LEN..].copy_from_slice(&crc.to_be_bytes());
}

/// Build a fresh acknowledgment frame.
pub fn build_ack<C: Checksum>(sequence: u16, status: u8, codec: &C) -> [u8; ACK_FRAME_LEN] {
    let mut ack = [0; ACK_FRAME_LEN];
    write_ack(&mut ack, sequence, status, codec);
    ack
}

/// Status byte of an acknowledgment (0 = ACK).
pub fn ack_status(ack: &[u8; ACK_FRAME_LEN]) -> u8 {
    ack[ACK_STATUS_OFFSET]
}

/// Sequence number echoed by an acknowledgment.
pub fn ack_sequence(ack: &[u8; ACK_FRAME_LEN]) -> u16 {
    u16::from_be_bytes([ack[HEADER_LEN], ack[HEADER_LEN + 1]])
}
