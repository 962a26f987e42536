//! Protocol state machine of the message pipe.
//!
//! The machine never touches hardware. Each call takes the current state plus
//! one event and returns the side effects to perform, as a short list of
//! [`Action`]s that the engine applies to the transport in order:
//!
//! ```text
//! (state, completion) -> (state', [Configure | Open | Trigger | Close | ByteInterrupt | Notify])
//! ```
//!
//! Send path: `Idle -> TxWait -> TxDone -> RxAck -> Idle`, with `RxAck -> TxWait`
//! when the acknowledgment is corrupted or negative.
//!
//! Receive path: `Idle -> RxPayload -> TxAckWait -> TxAckDone -> Idle`, with
//! `TxAckDone -> RxHeader -> RxPayload` after a NACK.
//!
//! Broadcast transactions (and every transaction when link acknowledgments are
//! disabled) skip the acknowledgment states.
use crate::config::MpipeConfig;
use crate::core::{
    Direction, MpipeState, Outcome, Priority, ACK_FRAME_LEN, ACK_STATUS, HEADER_LEN,
    RX_PREAMBLE_LEN,
};
use crate::error::MpipeError;
use crate::infra::checksum::{Checksum, Crc16Ccitt};
use crate::protocol::framing;
use crate::protocol::transport::CompletionSource;

//==================================================================================ACTIONS
/// Upper bound on the side effects of a single transition.
pub const MAX_ACTIONS: usize = 4;

/// Memory a transfer works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    /// The caller's transaction buffer.
    Packet,
    /// The engine's acknowledgment buffer.
    Ack,
}

/// Byte range of a [`Region`] involved in a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    pub region: Region,
    pub offset: usize,
    pub len: usize,
}

/// Completion signals raised towards the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    /// First bytes of an unsolicited frame arrived.
    ReceiveDetected,
    ReceiveDone(Outcome),
    SendDone(Outcome),
}

/// One side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Program (and start, when `enable`) a DMA transfer.
    Configure {
        direction: Direction,
        window: Window,
        enable: bool,
    },
    /// Kick the outbound transfer.
    Trigger,
    /// Enable the serial channel.
    Open,
    /// Disable the serial channel.
    Close,
    /// Toggle the byte-level completion interrupt.
    ByteInterrupt(bool),
    /// Fire an application signal.
    Notify(Notice),
}

/// Ordered side effects of one transition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Actions(heapless::Vec<Action, MAX_ACTIONS>);

impl Actions {
    pub const fn new() -> Self {
        Self(heapless::Vec::new())
    }

    fn push(&mut self, action: Action) {
        // MAX_ACTIONS covers the longest transition (three effects).
        let pushed = self.0.push(action).is_ok();
        debug_assert!(pushed, "action list overflow");
    }

    fn extend(&mut self, other: Actions) {
        for action in other {
            self.push(action);
        }
    }

    pub fn as_slice(&self) -> &[Action] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.0.iter()
    }
}

impl IntoIterator for Actions {
    type Item = Action;
    type IntoIter = <heapless::Vec<Action, MAX_ACTIONS> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

//==================================================================================MACHINE
/// Bookkeeping of the single in-flight transaction plus the engine-wide
/// sequence counter and acknowledgment buffer.
#[derive(Debug, Clone)]
pub struct StateMachine<C: Checksum = Crc16Ccitt> {
    codec: C,
    config: MpipeConfig,
    state: MpipeState,
    priority: Priority,
    /// Stamped on outgoing data frames, bumped once per delivered send.
    sequence: u16,
    /// Sequence of the last received data frame, echoed in its ACK/NACK.
    ack_sequence: u16,
    ack: [u8; ACK_FRAME_LEN],
    /// Known length of the frame in the packet buffer.
    frame_len: usize,
    /// Consecutive corrupted exchanges in the current transaction.
    retries: u16,
}

impl<C: Checksum + Default> Default for StateMachine<C> {
    fn default() -> Self {
        Self::new(MpipeConfig::default())
    }
}

impl<C: Checksum + Default> StateMachine<C> {
    /// Idle machine with sequence 0 and the default checksum codec.
    pub fn new(config: MpipeConfig) -> Self {
        Self::with_codec(config, C::default())
    }
}

impl<C: Checksum> StateMachine<C> {
    pub fn with_codec(config: MpipeConfig, codec: C) -> Self {
        Self {
            codec,
            config,
            state: MpipeState::Idle,
            priority: Priority::Low,
            sequence: 0,
            ack_sequence: 0,
            ack: [0; ACK_FRAME_LEN],
            frame_len: 0,
            retries: 0,
        }
    }

    //==================================================================================Accessors
    pub fn state(&self) -> MpipeState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Sequence number the next data frame will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn config(&self) -> &MpipeConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Current length of the frame held in the packet buffer.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn retries(&self) -> u16 {
        self.retries
    }

    /// Last acknowledgment built or received.
    pub fn ack_frame(&self) -> &[u8; ACK_FRAME_LEN] {
        &self.ack
    }

    pub(crate) fn ack_frame_mut(&mut self) -> &mut [u8; ACK_FRAME_LEN] {
        &mut self.ack
    }

    //==================================================================================Transaction start
    /// Reject the request unless the machine is idle. Engine-generated
    /// acknowledgments bypass the check.
    pub fn admit(&self, priority: Priority) -> Result<(), MpipeError> {
        if priority != Priority::Ack && self.state != MpipeState::Idle {
            return Err(MpipeError::Busy);
        }
        Ok(())
    }

    /// Start sending the frame whose header and payload sit at the start of
    /// `packet`: stamps the footer in place and arms the transfer.
    ///
    /// Returns the full frame length and the actions to apply.
    ///
    /// # Errors
    ///
    /// - [`MpipeError::Busy`] when a transaction is active (non-Ack priority);
    /// - [`MpipeError::BufferTooSmall`] when `packet` cannot hold the header,
    ///   or the announced payload plus the four footer bytes.
    pub fn begin_send(
        &mut self,
        priority: Priority,
        packet: &mut [u8],
    ) -> Result<(usize, Actions), MpipeError> {
        self.admit(priority)?;

        let payload = framing::payload_length(packet).ok_or(MpipeError::BufferTooSmall {
            needed: HEADER_LEN,
            available: packet.len(),
        })?;
        let total = framing::append_footer(packet, HEADER_LEN + payload, self.sequence, &self.codec)?;

        if priority != Priority::Ack {
            self.priority = priority;
            self.frame_len = total;
            self.retries = 0;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "mpipe: send {} bytes, seq={}, priority={}",
            total,
            self.sequence,
            priority
        );

        self.enter(MpipeState::TxWait);
        Ok((total, self.arm_send(Region::Packet, total)))
    }

    /// Arm reception of the next frame into the packet buffer.
    ///
    /// The state stays `Idle` until the first block lands: an armed receive is
    /// a listen, not an active transaction.
    pub fn begin_receive(&mut self, priority: Priority) -> Result<Actions, MpipeError> {
        self.admit(priority)?;

        if priority != Priority::Ack {
            self.priority = priority;
            self.frame_len = HEADER_LEN;
            self.retries = 0;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("mpipe: listening, priority={}", priority);

        self.enter(MpipeState::Idle);
        Ok(self.arm_receive(Region::Packet, 0, RX_PREAMBLE_LEN))
    }

    //==================================================================================Completion handling
    /// Advance on one completion. `packet` is the transaction buffer (empty
    /// when none is attached).
    pub fn handle(&mut self, source: CompletionSource, packet: &[u8]) -> Actions {
        match (source, self.state) {
            // The shifter drained: the frame is on the wire, the done state
            // runs on the next byte interrupt.
            (CompletionSource::Serial, MpipeState::TxWait) => {
                self.enter(MpipeState::TxDone);
                Actions::new()
            }
            (CompletionSource::Serial, MpipeState::TxAckWait) => {
                self.enter(MpipeState::TxAckDone);
                Actions::new()
            }
            (CompletionSource::Serial, MpipeState::TxDone | MpipeState::TxAckDone)
            | (CompletionSource::Dma, _) => self.dispatch(packet),
            (CompletionSource::Serial, _state) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("mpipe: spurious byte interrupt in {}", _state);
                Actions::new()
            }
        }
    }

    fn dispatch(&mut self, packet: &[u8]) -> Actions {
        match self.state {
            MpipeState::Idle => {
                let mut actions = Actions::new();
                actions.push(Action::Notify(Notice::ReceiveDetected));
                actions.extend(self.header_received(packet));
                actions
            }
            MpipeState::RxHeader => self.header_received(packet),
            MpipeState::RxPayload => self.payload_received(packet),
            MpipeState::TxWait | MpipeState::TxAckWait => {
                let mut actions = Actions::new();
                actions.push(Action::ByteInterrupt(true));
                actions
            }
            MpipeState::TxAckDone => self.ack_sent(),
            MpipeState::TxDone => self.data_sent(),
            MpipeState::RxAck => self.ack_received(),
        }
    }

    /// Header landed: pull the rest of the frame behind it.
    fn header_received(&mut self, packet: &[u8]) -> Actions {
        self.frame_len = framing::frame_length(packet).unwrap_or(RX_PREAMBLE_LEN);
        self.enter(MpipeState::RxPayload);

        let mut actions = Actions::new();
        actions.push(Action::Configure {
            direction: Direction::Receive,
            window: Window {
                region: Region::Packet,
                offset: HEADER_LEN,
                len: self.frame_len - HEADER_LEN,
            },
            enable: true,
        });
        actions
    }

    /// Full frame landed: acknowledge it, unless nobody expects an answer.
    fn payload_received(&mut self, packet: &[u8]) -> Actions {
        if !self.acknowledged() {
            return self.finish_receive(Outcome::Delivered);
        }

        let frame = packet.get(..self.frame_len).unwrap_or(packet);
        self.ack_sequence = framing::footer_sequence(frame).unwrap_or(0);
        let status = if framing::validate(frame, &self.codec) {
            ACK_STATUS
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("mpipe: corrupted frame seq={}, sending NACK", self.ack_sequence);
            self.config.nack_code.get()
        };
        framing::write_ack(&mut self.ack, self.ack_sequence, status, &self.codec);

        let actions = self.arm_send(Region::Ack, ACK_FRAME_LEN);
        self.enter(MpipeState::TxAckWait);
        actions
    }

    /// ACK/NACK left the wire.
    fn ack_sent(&mut self) -> Actions {
        let mut actions = Actions::new();
        actions.push(Action::ByteInterrupt(false));

        if framing::ack_status(&self.ack) == ACK_STATUS {
            actions.extend(self.finish_receive(Outcome::Delivered));
            return actions;
        }

        if self.exhausted() {
            actions.extend(self.finish_receive(Outcome::RetriesExhausted));
            return actions;
        }

        // The sender retries after our NACK: listen for the fresh copy.
        self.frame_len = HEADER_LEN;
        actions.extend(self.arm_receive(Region::Packet, 0, RX_PREAMBLE_LEN));
        self.enter(MpipeState::RxHeader);
        actions
    }

    /// Data frame left the wire.
    fn data_sent(&mut self) -> Actions {
        let mut actions = Actions::new();
        actions.push(Action::ByteInterrupt(false));

        if self.acknowledged() {
            actions.extend(self.arm_receive(Region::Ack, 0, ACK_FRAME_LEN));
            self.enter(MpipeState::RxAck);
        } else {
            actions.extend(self.finish_send(Outcome::Delivered));
        }
        actions
    }

    /// Peer's acknowledgment landed in the ack buffer.
    fn ack_received(&mut self) -> Actions {
        let intact = framing::validate(&self.ack, &self.codec);
        if intact && framing::ack_status(&self.ack) == ACK_STATUS {
            return self.finish_send(Outcome::Delivered);
        }

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "mpipe: {} acknowledgment for seq={}, retransmitting",
            if intact { "negative" } else { "corrupted" },
            self.sequence
        );

        if self.exhausted() {
            return self.finish_send(Outcome::RetriesExhausted);
        }

        // Footer is still in place: resend the frame verbatim.
        let actions = self.arm_send(Region::Packet, self.frame_len);
        self.enter(MpipeState::TxWait);
        actions
    }

    //==================================================================================Finalization
    fn finish_receive(&mut self, outcome: Outcome) -> Actions {
        #[cfg(feature = "defmt")]
        defmt::info!("mpipe: receive finished ({}), {} bytes", outcome, self.frame_len);

        self.enter(MpipeState::Idle);
        self.priority = Priority::Low;
        self.retries = 0;

        let mut actions = Actions::new();
        actions.push(Action::Close);
        actions.push(Action::Notify(Notice::ReceiveDone(outcome)));
        actions
    }

    fn finish_send(&mut self, outcome: Outcome) -> Actions {
        #[cfg(feature = "defmt")]
        defmt::info!("mpipe: send finished ({}), seq={}", outcome, self.sequence);

        if outcome == Outcome::Delivered {
            self.sequence = self.sequence.wrapping_add(1);
        }
        self.enter(MpipeState::Idle);
        self.priority = Priority::Low;
        self.retries = 0;

        let mut actions = Actions::new();
        actions.push(Action::Close);
        actions.push(Action::Notify(Notice::SendDone(outcome)));
        actions
    }

    //==================================================================================Helpers
    fn acknowledged(&self) -> bool {
        self.config.link_acks && self.priority != Priority::Broadcast
    }

    /// Count one corrupted exchange; true once the configured limit is passed.
    fn exhausted(&mut self) -> bool {
        self.retries = self.retries.saturating_add(1);
        match self.config.retry_limit {
            Some(limit) if self.retries > limit => {
                #[cfg(feature = "defmt")]
                defmt::warn!("mpipe: giving up after {} retries", limit);
                true
            }
            _ => false,
        }
    }

    fn arm_send(&self, region: Region, len: usize) -> Actions {
        let mut actions = Actions::new();
        actions.push(Action::Configure {
            direction: Direction::Send,
            window: Window {
                region,
                offset: 0,
                len,
            },
            enable: true,
        });
        actions.push(Action::Open);
        actions.push(Action::Trigger);
        actions
    }

    fn arm_receive(&self, region: Region, offset: usize, len: usize) -> Actions {
        let mut actions = Actions::new();
        actions.push(Action::Configure {
            direction: Direction::Receive,
            window: Window {
                region,
                offset,
                len,
            },
            enable: true,
        });
        actions.push(Action::Open);
        actions
    }

    fn enter(&mut self, next: MpipeState) {
        #[cfg(feature = "defmt")]
        if next != self.state {
            defmt::debug!("mpipe: {} -> {}", self.state, next);
        }
        self.state = next;
    }
}
