//! Wire constants and the small value types shared by the framer, the
//! protocol state machine and the public transaction API.
//!
//! Frame layout on the wire:
//!
//! ```text
//! [ NDEF header ] [ NDEF payload ] [ sequence ] [ CRC16 ]
//!        6            0..=255           2          2
//! ```
//!
//! Acknowledgment frame (`YY` = 0 for ACK, nonzero for NACK):
//!
//! ```text
//! 0xDD 0x00 0x00 0x02 0x00 0xYY [ sequence ] [ CRC16 ]
//! ```

//==================================================================================FRAME_LAYOUT
/// Size of the NDEF header that opens every frame.
pub const HEADER_LEN: usize = 6;
/// Offset of the payload-length byte inside the header.
pub const PAYLOAD_LEN_OFFSET: usize = 2;
/// Size of the sequence number carried by the footer.
pub const SEQUENCE_LEN: usize = 2;
/// Size of the CRC16 closing every frame.
pub const CHECKSUM_LEN: usize = 2;
/// Footer appended after the payload: sequence + checksum.
pub const FOOTER_LEN: usize = SEQUENCE_LEN + CHECKSUM_LEN;
/// Largest payload the one-byte length field can announce.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;
/// Largest frame the pipe can carry.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN + FOOTER_LEN;
/// Bytes requested by the first receive transfer, before the payload length is known.
pub const RX_PREAMBLE_LEN: usize = HEADER_LEN + FOOTER_LEN;

//==================================================================================ACK_LAYOUT
/// Total size of an ACK/NACK frame.
pub const ACK_FRAME_LEN: usize = HEADER_LEN + FOOTER_LEN;
/// Offset of the status byte (0 = ACK) inside an acknowledgment frame.
pub const ACK_STATUS_OFFSET: usize = 5;
/// Fixed header of an acknowledgment: short NDEF record, no type, no payload,
/// two-byte ID whose last byte is rewritten with the status.
pub const ACK_HEADER: [u8; HEADER_LEN] = [0xDD, 0x00, 0x00, 0x02, 0x00, 0x00];
/// Status byte of a positive acknowledgment.
pub const ACK_STATUS: u8 = 0x00;
/// Canonical status byte of a negative acknowledgment.
pub const NACK_STATUS: u8 = 0x7F;

//==================================================================================STATE
/// Phase of the single in-flight transaction.
///
/// `Idle` is both the initial and the terminal state. Each byte-level wait
/// state is directly followed by its done state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MpipeState {
    #[default]
    Idle,
    /// Waiting for a fresh header after a NACK was sent.
    RxHeader,
    /// Header seen, pulling payload and footer.
    RxPayload,
    /// Data frame handed to DMA, waiting for the last byte to shift out.
    TxWait,
    /// Data frame fully on the wire.
    TxDone,
    /// ACK/NACK handed to DMA, waiting for the last byte to shift out.
    TxAckWait,
    /// ACK/NACK fully on the wire.
    TxAckDone,
    /// Waiting for the peer's acknowledgment of our data frame.
    RxAck,
}

impl MpipeState {
    /// Whether the state is part of an acknowledgment round-trip.
    pub fn is_ack_phase(self) -> bool {
        matches!(self, Self::TxAckWait | Self::TxAckDone | Self::RxAck)
    }
}

//==================================================================================PRIORITY
/// Classification of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    #[default]
    Low,
    /// Reserved, handled like `Low`.
    High,
    /// Control traffic generated by the engine itself.
    Ack,
    /// No acknowledgment round-trip.
    Broadcast,
}

//==================================================================================OUTCOME
/// How a transaction ended. Carried by [`crate::protocol::mpipe::Finished`]
/// and reported to the completion signals through [`Outcome::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The exchange completed (acknowledged, or broadcast).
    Delivered,
    /// The configured retry limit was reached before a clean exchange.
    RetriesExhausted,
    /// An armed receive was replaced by a newer transaction before any byte arrived.
    Superseded,
}

impl Outcome {
    /// Status code handed to signal callbacks: 0 on success, negative otherwise.
    pub fn code(self) -> i16 {
        match self {
            Self::Delivered => 0,
            Self::RetriesExhausted => -1,
            Self::Superseded => -2,
        }
    }
}

/// Direction of a transfer or transaction, seen from this end of the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Send,
    Receive,
}
