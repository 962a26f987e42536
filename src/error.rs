//! Error definitions surfaced across the public boundary.
//! Transient link errors (corrupted frames or acknowledgments) never show up
//! here: the state machine resolves them by retrying.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors reported synchronously by `send`/`receive`.
pub enum MpipeError {
    /// A transaction is already in flight; nothing was changed.
    #[error("Engine busy: a transaction is already in flight")]
    Busy,
    /// The caller's buffer cannot hold the frame it must carry.
    #[error("Buffer too small -> needed: {needed}, available: {available}")]
    BufferTooSmall { needed: usize, available: usize },
    /// `Priority::Ack` transactions are generated by the engine only.
    #[error("Ack priority is reserved for engine-generated control frames")]
    ReservedPriority,
}

//==================================================================================REJECTED
/// A refused `send`/`receive`: the error plus the buffer handed back untouched.
#[derive(Debug)]
pub struct Rejected<B> {
    pub error: MpipeError,
    pub buffer: B,
}

impl<B> Rejected<B> {
    pub(crate) fn new(error: MpipeError, buffer: B) -> Self {
        Self { error, buffer }
    }

    /// Split into the error and the returned buffer.
    pub fn into_parts(self) -> (MpipeError, B) {
        (self.error, self.buffer)
    }
}
