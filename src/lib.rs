//! `mpipe-link` library: the message-pipe link layer used between a
//! microcontroller and its host over a DMA-driven serial port, in a `no_std`
//! environment. Frames are NDEF records followed by a sequence number and a
//! CRC16; every non-broadcast frame is answered with an ACK or NACK and
//! retransmitted until it goes through clean.
#![no_std]
//==================================================================================
/// Engine configuration (acknowledgments, retry limit, NACK code).
pub mod config;
/// Wire constants and the value types shared by every layer.
pub mod core;
/// Errors reported synchronously by the transaction API.
pub mod error;
/// Checksum codec.
pub mod infra;
/// Framing, protocol state machine, transport seam and the public engine.
pub mod protocol;
//==================================================================================
pub use crate::config::MpipeConfig;
pub use crate::core::{Direction, MpipeState, Outcome, Priority};
pub use crate::error::{MpipeError, Rejected};
pub use crate::protocol::mpipe::{Finished, Mpipe, SharedMpipe};
pub use crate::protocol::transport::CompletionSource;
