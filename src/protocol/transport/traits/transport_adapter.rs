//! Minimal abstraction of the serial peripheral and its DMA channel. Register
//! programming (clocks, bit rate, pin muxing, trigger selection) lives behind
//! this trait so the protocol core stays hardware independent.
use super::super::Transfer;

/// Contract between the protocol core and the serial/DMA hardware.
///
/// Every method is called from the context that runs the state machine,
/// which may be an interrupt handler: implementations must not block.
///
/// # Memory
///
/// The slices inside a [`Transfer`] stay owned by the engine and are not
/// touched by it until the matching completion is delivered. Implementations
/// that hand their address to a DMA engine must keep the engine pinned (for
/// instance in a `static`) while a transfer is outstanding.
pub trait TransportAdapter {
    /// Program a byte-stream transfer. With `enable == false` the channel is
    /// only pre-armed and waits for [`trigger`](Self::trigger).
    ///
    /// The payload receive (offset 6) overlaps the bytes 6..10 already pulled
    /// by the preamble receive. Those bytes are in place in `bytes`. The
    /// adapter must wait only for [`Transfer::wire_len`] new bytes, written at
    /// the tail of the window. When that count is 0 (empty payload) it must
    /// raise the DMA completion right away.
    fn configure(&mut self, transfer: Transfer<'_>, enable: bool);

    /// Start the configured outbound transfer.
    fn trigger(&mut self);

    /// Take the serial peripheral out of reset.
    fn open(&mut self);

    /// Put the serial peripheral back into reset.
    fn close(&mut self);

    /// Enable or disable the byte-level interrupt that reports the last bytes
    /// of an outbound frame leaving the shifter.
    fn set_byte_interrupt(&mut self, enabled: bool);
}
