//! Engine configuration. Defaults reproduce the reference link behavior:
//! software acknowledgments on, unbounded retries, NACK status `0x7F`.
use core::num::NonZeroU8;

use crate::core::NACK_STATUS;

/// Tunables applied when an engine is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MpipeConfig {
    /// Run the ACK/NACK round-trip for non-broadcast transactions.
    ///
    /// Turn off when the underlying link already guarantees delivery (USB
    /// converter style bridges): every transaction then finalizes like a broadcast.
    pub link_acks: bool,
    /// Consecutive retransmissions (or NACKs) tolerated before giving up.
    /// `None` retries forever.
    pub retry_limit: Option<u16>,
    /// Status byte written into outgoing NACKs.
    pub nack_code: NonZeroU8,
}

impl Default for MpipeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MpipeConfig {
    pub const fn new() -> Self {
        Self {
            link_acks: true,
            retry_limit: None,
            // NACK_STATUS is a nonzero literal.
            nack_code: match NonZeroU8::new(NACK_STATUS) {
                Some(code) => code,
                None => NonZeroU8::MIN,
            },
        }
    }

    /// Disable the software acknowledgment round-trip.
    pub const fn without_acks(mut self) -> Self {
        self.link_acks = false;
        self
    }

    /// Give up after `limit` consecutive retries and report
    /// [`Outcome::RetriesExhausted`](crate::core::Outcome::RetriesExhausted).
    pub const fn with_retry_limit(mut self, limit: u16) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    /// Override the NACK status byte.
    pub const fn with_nack_code(mut self, code: NonZeroU8) -> Self {
        self.nack_code = code;
        self
    }
}
