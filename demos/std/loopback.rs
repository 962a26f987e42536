//! Loopback example: two engines joined by an in-memory serial line, showing
//! an acknowledged exchange and a retransmission after line noise.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mpipe_link::protocol::transport::traits::transport_adapter::TransportAdapter;
use mpipe_link::protocol::transport::Transfer;
use mpipe_link::CompletionSource::{Dma, Serial};
use mpipe_link::{CompletionSource, Mpipe, MpipeConfig, Priority};

type Wire = Rc<RefCell<VecDeque<Vec<u8>>>>;

// ============================================================================
// TransportAdapter over an in-memory line
// ============================================================================

/// Completes every transfer instantly: a send window lands on `outbound` as
/// one frame, a receive window copies from the frame waiting on `inbound`.
struct Uart {
    name: &'static str,
    outbound: Wire,
    inbound: Wire,
    current: Vec<u8>,
    noisy: bool,
}

impl TransportAdapter for Uart {
    fn configure(&mut self, transfer: Transfer<'_>, _enable: bool) {
        match transfer {
            Transfer::Send { bytes, .. } => {
                let mut frame = bytes.to_vec();
                if std::mem::take(&mut self.noisy) {
                    frame[6] ^= 0x20;
                    println!("  [{}] line noise flips a payload bit", self.name);
                }
                println!("  [{}] tx {:02X?}", self.name, frame);
                self.outbound.borrow_mut().push_back(frame);
            }
            Transfer::Receive { offset, bytes } => {
                if offset == 0 {
                    self.current = self.inbound.borrow_mut().pop_front().unwrap_or_default();
                }
                let source = self.current.get(offset..).unwrap_or(&[]);
                let n = source.len().min(bytes.len());
                bytes[..n].copy_from_slice(&source[..n]);
            }
        }
    }

    fn trigger(&mut self) {}

    fn open(&mut self) {}

    fn close(&mut self) {}

    fn set_byte_interrupt(&mut self, _enabled: bool) {}
}

type Engine = Mpipe<Uart, Vec<u8>>;

fn fire(engine: &mut Engine, sources: &[CompletionSource]) {
    for source in sources {
        if let Some((direction, outcome)) = engine.on_event(*source) {
            println!("  {:?} settled: {:?}", direction, outcome);
        }
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0u8; 265];
    buffer[..6].copy_from_slice(&[0xDD, 0x00, payload.len() as u8, 0x00, 0x00, 0x00]);
    buffer[6..6 + payload.len()].copy_from_slice(payload);
    buffer
}

/// Host sends `payload`, device receives it; the interleaving follows what
/// both ends would observe on a real line.
fn exchange(host: &mut Engine, device: &mut Engine, payload: &[u8]) {
    host.send(frame(payload), Priority::Low).expect("host idle");
    fire(host, &[Dma, Serial]);
    device.receive(vec![0u8; 265], Priority::Low).expect("device idle");

    // Device answers; host resends until it reads an ACK.
    loop {
        fire(device, &[Dma, Dma]);
        fire(host, &[Serial, Dma]);
        fire(device, &[Dma, Serial, Serial]);
        if host.take_finished().is_some() {
            break;
        }
        fire(host, &[Dma, Serial]);
    }

    let received = device.take_finished().expect("device settled");
    println!(
        "  device got {:?} (seq {:?})\n",
        String::from_utf8_lossy(&received.frame()[6..6 + payload.len()]),
        mpipe_link::protocol::framing::footer_sequence(received.frame())
    );
}

fn main() {
    println!("=== mpipe loopback ===\n");

    let to_device: Wire = Rc::default();
    let to_host: Wire = Rc::default();
    let host_uart = Uart {
        name: "host",
        outbound: to_device.clone(),
        inbound: to_host.clone(),
        current: Vec::new(),
        noisy: false,
    };
    let device_uart = Uart {
        name: "device",
        outbound: to_host,
        inbound: to_device,
        current: Vec::new(),
        noisy: false,
    };

    let mut host: Engine = Mpipe::new(host_uart, MpipeConfig::default());
    let mut device: Engine = Mpipe::new(device_uart, MpipeConfig::default());
    println!("footer size: {} bytes\n", host.footer_size());

    println!("1. Clean exchange:");
    exchange(&mut host, &mut device, b"hello");

    println!("2. Exchange with a corrupted first copy:");
    host.transport_mut().noisy = true;
    exchange(&mut host, &mut device, b"again");

    println!("host sequence is now {}", host.sequence());
}
