/// Test doubles simulating the DMA serial transport during integration tests.
use mpipe_link::core::{Direction, HEADER_LEN, MAX_FRAME_LEN};
use mpipe_link::protocol::transport::traits::transport_adapter::TransportAdapter;
use mpipe_link::protocol::transport::Transfer;
use tokio::sync::mpsc;

/// One call made by the engine on its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Configure {
        direction: Direction,
        offset: usize,
        len: usize,
    },
    Trigger,
    Open,
    Close,
    ByteInterrupt(bool),
}

#[allow(dead_code)]
/// In-memory serial line reproducing the `TransportAdapter` behavior.
///
/// A send window is pushed on the wire as one frame when it is configured.
/// A receive window at offset 0 pops the next frame off the wire; windows
/// further in the frame copy the matching bytes of that same frame. The peer
/// therefore has to transmit before the receive window is armed.
pub struct MockTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    current: Vec<u8>,
    /// Flip one payload bit in the next frame put on the wire.
    pub corrupt_next: bool,
    pub calls: Vec<Call>,
    pub sent: Vec<Vec<u8>>,
    /// New bytes each receive window waits for on the line.
    pub wire_lens: Vec<usize>,
    pub open: bool,
    pub byte_interrupt: bool,
}

#[allow(dead_code)]
impl MockTransport {
    /// Build two interconnected endpoints (device ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();
        (Self::with_wire(dut_tx, dut_rx), Self::with_wire(host_tx, host_rx))
    }

    fn with_wire(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            current: Vec::new(),
            corrupt_next: false,
            calls: Vec::new(),
            sent: Vec::new(),
            wire_lens: Vec::new(),
            open: false,
            byte_interrupt: false,
        }
    }

    /// Put raw bytes on the wire towards the other endpoint.
    pub fn push_frame(&self, frame: &[u8]) {
        self.tx.send(frame.to_vec()).expect("peer endpoint dropped");
    }

    /// Take the next frame the other endpoint transmitted.
    pub fn pop_frame(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }
}

impl TransportAdapter for MockTransport {
    fn configure(&mut self, transfer: Transfer<'_>, _enable: bool) {
        let direction = match &transfer {
            Transfer::Send { .. } => Direction::Send,
            Transfer::Receive { .. } => Direction::Receive,
        };
        self.calls.push(Call::Configure {
            direction,
            offset: transfer.offset(),
            len: transfer.len(),
        });
        if direction == Direction::Receive {
            self.wire_lens.push(transfer.wire_len());
        }

        match transfer {
            Transfer::Send { bytes, .. } => {
                let mut frame = bytes.to_vec();
                if std::mem::take(&mut self.corrupt_next) {
                    if let Some(byte) = frame.get_mut(HEADER_LEN) {
                        *byte ^= 0x01;
                    }
                }
                self.sent.push(bytes.to_vec());
                let _ = self.tx.send(frame);
            }
            Transfer::Receive { offset, bytes } => {
                if offset == 0 {
                    self.current = self.rx.try_recv().unwrap_or_default();
                }
                let source = self.current.get(offset..).unwrap_or(&[]);
                let n = source.len().min(bytes.len());
                bytes[..n].copy_from_slice(&source[..n]);
            }
        }
    }

    fn trigger(&mut self) {
        self.calls.push(Call::Trigger);
    }

    fn open(&mut self) {
        self.open = true;
        self.calls.push(Call::Open);
    }

    fn close(&mut self) {
        self.open = false;
        self.calls.push(Call::Close);
    }

    fn set_byte_interrupt(&mut self, enabled: bool) {
        self.byte_interrupt = enabled;
        self.calls.push(Call::ByteInterrupt(enabled));
    }
}

#[allow(dead_code)]
/// Send buffer holding `header ++ payload`, sized for the largest frame.
pub fn data_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; MAX_FRAME_LEN];
    frame[..HEADER_LEN].copy_from_slice(&[0xDD, 0x00, payload.len() as u8, 0x00, 0x00, 0x00]);
    frame[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    frame
}

#[allow(dead_code)]
/// Zeroed receive buffer.
pub fn rx_buffer() -> Vec<u8> {
    vec![0u8; MAX_FRAME_LEN]
}
