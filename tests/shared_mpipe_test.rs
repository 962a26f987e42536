//! `SharedMpipe` driven from a task on one side and simulated interrupt
//! handlers on the other.
mod helpers;

use std::sync::atomic::{AtomicI16, Ordering};

use helpers::{data_frame, rx_buffer, MockTransport};
use mpipe_link::core::{ACK_STATUS, HEADER_LEN};
use mpipe_link::infra::checksum::Crc16Ccitt;
use mpipe_link::protocol::framing;
use mpipe_link::protocol::transport::traits::mcu_sleep::McuSleep;
use mpipe_link::CompletionSource::{self, Dma, Serial};
use mpipe_link::{Direction, Mpipe, MpipeConfig, MpipeState, Outcome, Priority, SharedMpipe};
use static_cell::StaticCell;
use tokio::time::Duration;

type Link = SharedMpipe<MockTransport, Vec<u8>>;

static SEND_LINK: StaticCell<Link> = StaticCell::new();
static RECEIVE_LINK: StaticCell<Link> = StaticCell::new();
static SUPERSEDE_LINK: StaticCell<Link> = StaticCell::new();
static SEND_STATUS: AtomicI16 = AtomicI16::new(i16::MIN);

/// Fire completions one by one, yielding to the waiting task in between.
async fn interrupts(link: &Link, sources: &[CompletionSource]) {
    for source in sources {
        tokio::task::yield_now().await;
        link.on_interrupt(*source);
    }
}

#[tokio::test]
async fn blocking_send_resolves_once_acknowledged() {
    let (device, host) = MockTransport::create_pair();
    host.push_frame(&framing::build_ack(0, ACK_STATUS, &Crc16Ccitt));

    let link: &Link = SEND_LINK.init(SharedMpipe::new(Mpipe::new(device, MpipeConfig::default())));
    link.on_send_done(|code| SEND_STATUS.store(code, Ordering::SeqCst));

    let (sent, ()) = tokio::join!(
        link.send(data_frame(b"status?"), Priority::Low, true),
        interrupts(link, &[Dma, Serial, Serial, Dma]),
    );

    assert_eq!(sent.unwrap(), HEADER_LEN + 7 + 4);
    assert_eq!(link.status(), MpipeState::Idle);
    assert_eq!(SEND_STATUS.load(Ordering::SeqCst), 0);

    let finished = link.take_finished().expect("send must hand its buffer back");
    assert_eq!(finished.direction, Direction::Send);
    assert_eq!(finished.outcome, Outcome::Delivered);
    assert_eq!(link.lock(|engine| engine.sequence()), 1);
}

#[tokio::test]
async fn blocking_receive_waits_for_the_frame() {
    let (device, mut host) = MockTransport::create_pair();
    let mut frame = data_frame(b"reply");
    let len = framing::append_footer(&mut frame, HEADER_LEN + 5, 9, &Crc16Ccitt).unwrap();
    host.push_frame(&frame[..len]);

    let link: &Link = RECEIVE_LINK.init(SharedMpipe::new(Mpipe::new(device, MpipeConfig::default())));

    let (received, ()) = tokio::join!(
        link.receive(rx_buffer(), Priority::Low, true),
        interrupts(link, &[Dma, Dma, Dma, Serial, Serial]),
    );
    received.unwrap();

    let finished = link.take_finished().unwrap();
    assert_eq!(finished.direction, Direction::Receive);
    assert_eq!(finished.frame(), &frame[..len]);
    assert_eq!(
        host.pop_frame(),
        Some(framing::build_ack(9, ACK_STATUS, &Crc16Ccitt).to_vec())
    );
}

#[tokio::test]
async fn blocking_receive_resolves_when_superseded() {
    let (device, mut host) = MockTransport::create_pair();
    let link: &Link = SUPERSEDE_LINK.init(SharedMpipe::new(Mpipe::new(device, MpipeConfig::default())));

    let replier = async {
        tokio::task::yield_now().await;
        assert!(link.lock(|engine| engine.is_listening()));
        link.send(data_frame(b"hello"), Priority::Broadcast, false)
            .await
            .unwrap();
        interrupts(link, &[Dma, Serial, Serial]).await;
    };

    let (received, ()) = tokio::time::timeout(
        Duration::from_millis(300),
        async { tokio::join!(link.receive(rx_buffer(), Priority::Low, true), replier) },
    )
    .await
    .expect("blocking receive must resolve once its listen is replaced");
    received.unwrap();

    let superseded = link.take_finished().unwrap();
    assert_eq!(superseded.direction, Direction::Receive);
    assert_eq!(superseded.outcome, Outcome::Superseded);
    let sent = link.take_finished().unwrap();
    assert_eq!(sent.direction, Direction::Send);
    assert_eq!(sent.outcome, Outcome::Delivered);
    assert!(host.pop_frame().is_some());
}

#[tokio::test]
async fn wait_for_idle_returns_at_once_when_idle() {
    let (device, _host) = MockTransport::create_pair();
    let link: Link = SharedMpipe::new(Mpipe::new(device, MpipeConfig::default()));
    link.wait_for_idle().await;
    assert_eq!(link.footer_size(), 4);
}

/// Sleep double: every wake-up is the next scripted interrupt.
struct ScriptedSleep<'a> {
    link: &'a Link,
    script: std::vec::IntoIter<CompletionSource>,
    naps: usize,
}

impl McuSleep for ScriptedSleep<'_> {
    fn sleep(&mut self) {
        self.naps += 1;
        let source = self.script.next().expect("slept with no interrupt left");
        self.link.on_interrupt(source);
    }
}

/// Blocking wait without an executor sleeps until the broadcast settles
#[tokio::test]
async fn blocking_wait_sleeps_between_interrupts() {
    let (device, mut host) = MockTransport::create_pair();
    let link: Link = SharedMpipe::new(Mpipe::new(device, MpipeConfig::default()));

    let started = link.send(data_frame(b"hello"), Priority::Broadcast, false).await;
    assert!(started.is_ok());
    assert_eq!(link.status(), MpipeState::TxWait);

    let mut sleeper = ScriptedSleep {
        link: &link,
        script: vec![Dma, Serial, Serial].into_iter(),
        naps: 0,
    };
    link.wait_for_idle_blocking(&mut sleeper);

    assert_eq!(sleeper.naps, 3);
    assert_eq!(link.status(), MpipeState::Idle);
    assert_eq!(host.pop_frame().map(|f| f.len()), Some(HEADER_LEN + 5 + 4));
}
