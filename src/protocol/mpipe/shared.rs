//! Interrupt-safe handle around an [`Mpipe`] engine.
//!
//! The engine lives in a critical-section mutex: interrupt handlers call
//! [`SharedMpipe::on_interrupt`], the application context starts
//! transactions and waits for them to settle. Every transition back to
//! `Idle`, and every armed listen replaced by a newer transaction, raises an
//! embassy [`Signal`] carrying the finished direction.
//!
//! The signal wakes a single waiter. Waiters re-check the engine after each
//! wake, so a stale signal only costs one extra iteration.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_sync::signal::Signal;

use super::{Finished, Mpipe, SignalHandler};
use crate::core::{Direction, MpipeState, Priority};
use crate::error::Rejected;
use crate::infra::checksum::{Checksum, Crc16Ccitt};
use crate::protocol::transport::traits::mcu_sleep::McuSleep;
use crate::protocol::transport::traits::transport_adapter::TransportAdapter;
use crate::protocol::transport::CompletionSource;

pub struct SharedMpipe<T, B, C: Checksum = Crc16Ccitt> {
    engine: Mutex<CriticalSectionRawMutex, RefCell<Mpipe<T, B, C>>>,
    settled: Signal<CriticalSectionRawMutex, Direction>,
}

impl<T, B, C> SharedMpipe<T, B, C>
where
    T: TransportAdapter,
    B: AsRef<[u8]> + AsMut<[u8]>,
    C: Checksum,
{
    pub const fn new(engine: Mpipe<T, B, C>) -> Self {
        Self {
            engine: Mutex::new(RefCell::new(engine)),
            settled: Signal::new(),
        }
    }

    /// Run `f` on the engine inside the critical section.
    ///
    /// Signal handlers run inside this section too and must not call back
    /// into the same `SharedMpipe`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Mpipe<T, B, C>) -> R) -> R {
        self.engine.lock(|cell| f(&mut cell.borrow_mut()))
    }

    //==================================================================================Interrupt side
    /// Entry point for the DMA and serial interrupt handlers.
    pub fn on_interrupt(&self, source: CompletionSource) {
        if let Some((direction, _outcome)) = self.lock(|engine| engine.on_event(source)) {
            #[cfg(feature = "defmt")]
            defmt::trace!("mpipe: {} settled ({})", direction, _outcome);
            self.settled.signal(direction);
        }
    }

    //==================================================================================Application side
    /// Start a send. With `blocking`, resolve only once the engine is idle
    /// again; the buffer is then available from [`Self::take_finished`].
    ///
    /// A receive armed with `blocking` elsewhere resolves when this send
    /// supersedes it.
    pub async fn send(
        &self,
        buffer: B,
        priority: Priority,
        blocking: bool,
    ) -> Result<usize, Rejected<B>> {
        let len = self.start(|engine| engine.send(buffer, priority))?;
        if blocking {
            self.wait_for_idle().await;
        }
        Ok(len)
    }

    /// Arm a receive. With `blocking`, resolve once a frame was received
    /// (or the receive gave up).
    ///
    /// An armed receive leaves the engine idle, so the blocking variant waits
    /// until the engine no longer holds the receive: settled, given up, or
    /// superseded by a newer transaction.
    pub async fn receive(
        &self,
        buffer: B,
        priority: Priority,
        blocking: bool,
    ) -> Result<(), Rejected<B>> {
        let ticket = self.start(|engine| {
            engine.receive(buffer, priority)?;
            Ok(engine.ticket())
        })?;
        if blocking {
            while self.lock(|engine| engine.ticket() == ticket && engine.pending().is_some()) {
                self.settled.wait().await;
            }
        }
        Ok(())
    }

    /// Run a transaction start. A listen it supersedes counts as a settled
    /// receive for whoever waits on it.
    fn start<R>(
        &self,
        f: impl FnOnce(&mut Mpipe<T, B, C>) -> Result<R, Rejected<B>>,
    ) -> Result<R, Rejected<B>> {
        let (result, superseded) = self.lock(|engine| {
            let listening = engine.is_listening();
            let result = f(engine);
            let superseded = listening && result.is_ok();
            (result, superseded)
        });
        if superseded {
            self.settled.signal(Direction::Receive);
        }
        result
    }

    /// Resolve once no transaction is in flight.
    pub async fn wait_for_idle(&self) {
        while self.status() != MpipeState::Idle {
            self.settled.wait().await;
        }
    }

    /// Busy-wait variant for contexts without an executor: sleeps the MCU
    /// until an interrupt wakes it, then re-checks.
    pub fn wait_for_idle_blocking<S: McuSleep>(&self, sleeper: &mut S) {
        while self.status() != MpipeState::Idle {
            sleeper.sleep();
        }
    }

    pub fn status(&self) -> MpipeState {
        self.lock(|engine| engine.status())
    }

    pub fn footer_size(&self) -> usize {
        self.lock(|engine| engine.footer_size())
    }

    pub fn take_finished(&self) -> Option<Finished<B>> {
        self.lock(|engine| engine.take_finished())
    }

    pub fn on_send_done(&self, signal: SignalHandler) {
        self.lock(|engine| engine.on_send_done(signal));
    }

    pub fn on_receive_done(&self, signal: SignalHandler) {
        self.lock(|engine| engine.on_receive_done(signal));
    }

    pub fn on_receive_detected(&self, signal: SignalHandler) {
        self.lock(|engine| engine.on_receive_detected(signal));
    }
}
