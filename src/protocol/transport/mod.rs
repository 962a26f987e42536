//! Transport boundary of the pipe: the completion events raised by the
//! hardware and the transfer descriptors handed to it.
//!
//! Two interrupt sources drive the protocol:
//!
//! - the DMA channel, once per programmed block;
//! - the serial peripheral's byte interrupt, enabled only while the last
//!   bytes of an outbound frame are still shifting out.
//!
//! Both are funneled into [`CompletionSource`] and delivered one at a time, in
//! the order the transfers were armed.

use crate::core::RX_PREAMBLE_LEN;

pub mod traits;

/// Which interrupt completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionSource {
    /// The DMA channel finished the programmed block.
    Dma,
    /// The serial peripheral raised its byte-level (TX ready) interrupt.
    Serial,
}

/// One byte-stream transfer to program into the DMA channel.
///
/// `offset` is the position of `bytes` inside the frame being exchanged, so
/// the first receive of a frame has `offset == 0` and the payload pull that
/// follows the header starts at offset 6.
///
/// The first receive pulls [`RX_PREAMBLE_LEN`] bytes, so the payload window
/// starts inside data that already arrived. Only [`Transfer::wire_len`] bytes
/// are still to come off the line.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Memory to serial TX register.
    Send { offset: usize, bytes: &'a [u8] },
    /// Serial RX register to memory.
    Receive { offset: usize, bytes: &'a mut [u8] },
}

impl Transfer<'_> {
    /// Number of bytes the transfer moves.
    pub fn len(&self) -> usize {
        match self {
            Transfer::Send { bytes, .. } => bytes.len(),
            Transfer::Receive { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the peer still has to put on the line for this transfer.
    ///
    /// A receive window past offset 0 continues the frame whose first
    /// [`RX_PREAMBLE_LEN`] bytes already landed. Those are excluded, and the
    /// result is 0 when the frame fits in the preamble (empty payload).
    pub fn wire_len(&self) -> usize {
        match self {
            Transfer::Receive { offset, bytes } if *offset > 0 => {
                (offset + bytes.len()).saturating_sub(RX_PREAMBLE_LEN.max(*offset))
            }
            _ => self.len(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Transfer::Send { offset, .. } | Transfer::Receive { offset, .. } => *offset,
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
