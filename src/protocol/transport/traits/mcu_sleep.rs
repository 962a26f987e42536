//! Low-power wait used by the synchronous idle wait.

/// Put the core to sleep until the next interrupt.
pub trait McuSleep {
    /// Returns after any interrupt woke the core. Spurious returns are fine:
    /// callers re-check their condition.
    fn sleep(&mut self);
}
