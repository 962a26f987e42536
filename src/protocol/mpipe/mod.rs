//! Public transaction API of the message pipe.
//!
//! [`Mpipe`] owns the transport adapter, the protocol state machine and the
//! buffer of the transaction in flight. Callers move a buffer in with
//! [`Mpipe::send`] / [`Mpipe::receive`], feed every hardware completion to
//! [`Mpipe::on_event`], and get the buffer back from
//! [`Mpipe::take_finished`] once the transaction reached its terminal state.
//!
//! [`SharedMpipe`] wraps an engine so that interrupt handlers and the main
//! context can share it, and adds the blocking waits.
use crate::config::MpipeConfig;
use crate::core::{Direction, MpipeState, Outcome, Priority, FOOTER_LEN, MAX_FRAME_LEN};
use crate::error::{MpipeError, Rejected};
use crate::infra::checksum::{Checksum, Crc16Ccitt};
use crate::protocol::machine::{Action, Actions, Notice, Region, StateMachine, Window};
use crate::protocol::transport::traits::transport_adapter::TransportAdapter;
use crate::protocol::transport::{CompletionSource, Transfer};
use heapless::Deque;

mod shared;
pub use shared::SharedMpipe;

/// Application callback, invoked with a status code (0 = success).
pub type SignalHandler = fn(i16);

fn signal_null(_code: i16) {}

//==================================================================================FINISHED
/// A transaction that reached its terminal state, with its buffer handed back.
#[derive(Debug)]
pub struct Finished<B> {
    pub direction: Direction,
    pub outcome: Outcome,
    /// Frame length in the buffer (header + payload + footer).
    pub len: usize,
    pub buffer: B,
}

impl<B: AsRef<[u8]>> Finished<B> {
    /// The frame bytes, footer included.
    pub fn frame(&self) -> &[u8] {
        let bytes = self.buffer.as_ref();
        bytes.get(..self.len).unwrap_or(bytes)
    }
}

//==================================================================================ENGINE
/// Finished transactions held until claimed: a superseded listen plus the
/// transaction that replaced it.
pub const FINISHED_CAPACITY: usize = 2;

/// One message pipe bound to one physical transport.
pub struct Mpipe<T, B, C: Checksum = Crc16Ccitt> {
    transport: T,
    machine: StateMachine<C>,
    /// Buffer of the transaction in flight, or of the armed listen.
    buffer: Option<B>,
    /// Direction of the transaction owning `buffer`.
    direction: Direction,
    /// Bumped on every accepted send/receive.
    ticket: u32,
    finished: Deque<Finished<B>, FINISHED_CAPACITY>,
    sig_txdone: SignalHandler,
    sig_rxdone: SignalHandler,
    sig_rxdetect: SignalHandler,
}

impl<T, B, C> Mpipe<T, B, C>
where
    T: TransportAdapter,
    B: AsRef<[u8]> + AsMut<[u8]>,
    C: Checksum + Default,
{
    /// Idle engine: sequence 0, priority `Low`, every signal a no-op.
    pub fn new(transport: T, config: MpipeConfig) -> Self {
        Self::with_codec(transport, config, C::default())
    }
}

impl<T, B, C> Mpipe<T, B, C>
where
    T: TransportAdapter,
    B: AsRef<[u8]> + AsMut<[u8]>,
    C: Checksum,
{
    pub fn with_codec(transport: T, config: MpipeConfig, codec: C) -> Self {
        Self {
            transport,
            machine: StateMachine::with_codec(config, codec),
            buffer: None,
            direction: Direction::Receive,
            ticket: 0,
            finished: Deque::new(),
            sig_txdone: signal_null,
            sig_rxdone: signal_null,
            sig_rxdetect: signal_null,
        }
    }

    //==================================================================================Transactions
    /// Send the frame whose header and payload start `buffer`.
    ///
    /// The sequence and checksum footer is written in place right after the
    /// payload, so `buffer` needs four spare bytes past
    /// `6 + header[2]`. Returns the frame length on the wire.
    ///
    /// # Errors
    ///
    /// The buffer comes back inside [`Rejected`] with
    /// [`MpipeError::Busy`], [`MpipeError::BufferTooSmall`] or
    /// [`MpipeError::ReservedPriority`].
    pub fn send(&mut self, mut buffer: B, priority: Priority) -> Result<usize, Rejected<B>> {
        if priority == Priority::Ack {
            return Err(Rejected::new(MpipeError::ReservedPriority, buffer));
        }

        match self.machine.begin_send(priority, buffer.as_mut()) {
            Ok((len, actions)) => {
                self.attach(buffer, Direction::Send);
                self.apply(actions);
                Ok(len)
            }
            Err(error) => Err(Rejected::new(error, buffer)),
        }
    }

    /// Arm reception of the next frame into `buffer`, which must hold
    /// [`MAX_FRAME_LEN`] bytes.
    ///
    /// The engine stays `Idle` (listening) until the first block arrives.
    pub fn receive(&mut self, buffer: B, priority: Priority) -> Result<(), Rejected<B>> {
        if priority == Priority::Ack {
            return Err(Rejected::new(MpipeError::ReservedPriority, buffer));
        }
        if let Err(error) = self.machine.admit(priority) {
            return Err(Rejected::new(error, buffer));
        }

        let available = buffer.as_ref().len();
        if available < MAX_FRAME_LEN {
            return Err(Rejected::new(
                MpipeError::BufferTooSmall {
                    needed: MAX_FRAME_LEN,
                    available,
                },
                buffer,
            ));
        }

        match self.machine.begin_receive(priority) {
            Ok(actions) => {
                self.attach(buffer, Direction::Receive);
                self.apply(actions);
                Ok(())
            }
            Err(error) => Err(Rejected::new(error, buffer)),
        }
    }

    /// Feed one hardware completion to the state machine.
    ///
    /// Returns the direction and outcome of the transaction this event
    /// finalized, if any.
    pub fn on_event(&mut self, source: CompletionSource) -> Option<(Direction, Outcome)> {
        if self.buffer.is_none() && self.machine.state() == MpipeState::Idle {
            #[cfg(feature = "defmt")]
            defmt::trace!("mpipe: completion {} with nothing armed", source);
            return None;
        }

        let actions = {
            let packet: &[u8] = match self.buffer.as_ref() {
                Some(buffer) => buffer.as_ref(),
                None => &[],
            };
            self.machine.handle(source, packet)
        };
        self.apply(actions)
    }

    /// Take the oldest unclaimed finished transaction and its buffer.
    pub fn take_finished(&mut self) -> Option<Finished<B>> {
        self.finished.pop_front()
    }

    //==================================================================================Status
    pub fn status(&self) -> MpipeState {
        self.machine.state()
    }

    /// Bytes appended after the payload: 2-byte sequence + 2-byte CRC.
    pub fn footer_size(&self) -> usize {
        FOOTER_LEN
    }

    /// Sequence number the next data frame will carry.
    pub fn sequence(&self) -> u16 {
        self.machine.sequence()
    }

    pub fn priority(&self) -> Priority {
        self.machine.priority()
    }

    /// Direction of the transaction holding a buffer, armed listens included.
    pub fn pending(&self) -> Option<Direction> {
        self.buffer.as_ref().map(|_| self.direction)
    }

    /// Identifies the last accepted transaction. Together with
    /// [`Self::pending`] it tells whether that transaction still holds its
    /// buffer.
    pub fn ticket(&self) -> u32 {
        self.ticket
    }

    /// A receive is armed but no byte has arrived yet.
    pub fn is_listening(&self) -> bool {
        self.buffer.is_some() && self.machine.state() == MpipeState::Idle
    }

    pub fn machine(&self) -> &StateMachine<C> {
        &self.machine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    //==================================================================================Signals
    pub fn on_send_done(&mut self, signal: SignalHandler) {
        self.sig_txdone = signal;
    }

    pub fn on_receive_done(&mut self, signal: SignalHandler) {
        self.sig_rxdone = signal;
    }

    /// Fired when an unsolicited frame starts arriving (useful to leave a
    /// low-power mode early).
    pub fn on_receive_detected(&mut self, signal: SignalHandler) {
        self.sig_rxdetect = signal;
    }

    //==================================================================================Internals
    /// Hold the buffer of a new transaction. A listen that never saw a byte is
    /// handed back as superseded.
    fn attach(&mut self, buffer: B, direction: Direction) {
        self.direction = direction;
        self.ticket = self.ticket.wrapping_add(1);
        if let Some(previous) = self.buffer.replace(buffer) {
            #[cfg(feature = "defmt")]
            defmt::debug!("mpipe: armed receive superseded");
            self.park(Finished {
                direction: Direction::Receive,
                outcome: Outcome::Superseded,
                len: 0,
                buffer: previous,
            });
        }
    }

    fn park(&mut self, finished: Finished<B>) {
        if self.finished.is_full() {
            #[cfg(feature = "defmt")]
            defmt::warn!("mpipe: oldest unclaimed transaction dropped");
            self.finished.pop_front();
        }
        let _ = self.finished.push_back(finished);
    }

    fn apply(&mut self, actions: Actions) -> Option<(Direction, Outcome)> {
        let mut settled = None;
        for action in actions {
            match action {
                Action::Configure {
                    direction,
                    window,
                    enable,
                } => self.configure(direction, window, enable),
                Action::Trigger => self.transport.trigger(),
                Action::Open => self.transport.open(),
                Action::Close => self.transport.close(),
                Action::ByteInterrupt(enabled) => self.transport.set_byte_interrupt(enabled),
                Action::Notify(Notice::ReceiveDetected) => (self.sig_rxdetect)(0),
                Action::Notify(Notice::ReceiveDone(outcome)) => {
                    self.settle(Direction::Receive, outcome);
                    settled = Some((Direction::Receive, outcome));
                    (self.sig_rxdone)(outcome.code());
                }
                Action::Notify(Notice::SendDone(outcome)) => {
                    self.settle(Direction::Send, outcome);
                    settled = Some((Direction::Send, outcome));
                    (self.sig_txdone)(outcome.code());
                }
            }
        }
        settled
    }

    fn settle(&mut self, direction: Direction, outcome: Outcome) {
        if let Some(buffer) = self.buffer.take() {
            let len = self.machine.frame_len();
            self.park(Finished {
                direction,
                outcome,
                len,
                buffer,
            });
        }
    }

    fn configure(&mut self, direction: Direction, window: Window, enable: bool) {
        let Self {
            transport,
            machine,
            buffer,
            ..
        } = self;

        let memory: &mut [u8] = match window.region {
            Region::Ack => &mut machine.ack_frame_mut()[..],
            Region::Packet => match buffer.as_mut() {
                Some(buffer) => buffer.as_mut(),
                None => return,
            },
        };
        let Some(bytes) = memory.get_mut(window.offset..window.offset + window.len) else {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "mpipe: window {}..{} outside buffer",
                window.offset,
                window.offset + window.len
            );
            return;
        };

        let transfer = match direction {
            Direction::Send => Transfer::Send {
                offset: window.offset,
                bytes,
            },
            Direction::Receive => Transfer::Receive {
                offset: window.offset,
                bytes,
            },
        };
        transport.configure(transfer, enable);
    }
}
