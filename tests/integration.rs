//! Integration tests for rf2usb host-testable logic.
//!
//! Transmitters and the receiver run against an in-memory "air": frames a
//! node sends are decoded and handed to the other side by hand.

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use rf2usb::config::{LINK_DOWN_MS, MAX_NODES};
use rf2usb::error::{RadioError, TransportError};
use rf2usb::hid::keyboard::keys;
use rf2usb::hid::{BindingTable, HidAction, HidBinding, HidReport, HidTransport};
use rf2usb::link::LinkState;
use rf2usb::node::{RxEvent, RxNode, TxNode};
use rf2usb::protocol::{
    AssignmentEvent, DenyReason, Fingerprint, Frame, Header, NackReason, PacketType, RadioLink, Received,
    StatusPacket, TxMode,
};
use rf2usb::storage::MemoryStore;

fn block_on<F: Future>(f: F) -> F::Output {
    fn raw() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            raw()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }
    // SAFETY: the vtable never touches the data pointer.
    let waker = unsafe { Waker::from_raw(raw()) };
    let mut cx = Context::from_waker(&waker);
    match pin!(f).as_mut().poll(&mut cx) {
        Poll::Ready(out) => out,
        Poll::Pending => panic!("test future is not expected to wait"),
    }
}

#[derive(Default)]
struct Air {
    sent: Vec<Vec<u8>>,
}

impl RadioLink for Air {
    async fn send(&mut self, frame: &[u8]) -> Result<u32, RadioError> {
        self.sent.push(frame.to_vec());
        Ok(1_200)
    }

    async fn receive(&mut self, _buf: &mut [u8]) -> Result<Received, RadioError> {
        Err(RadioError::Timeout)
    }

    fn last_rssi(&self) -> i16 {
        -55
    }
}

#[derive(Default)]
struct Host {
    reports: Vec<HidReport>,
}

impl HidTransport for Host {
    fn is_ready(&self) -> bool {
        true
    }

    fn send(&mut self, report: HidReport) -> Result<(), TransportError> {
        self.reports.push(report);
        Ok(())
    }
}

type Tx = TxNode<Air, MemoryStore>;
type Rx = RxNode<Air, MemoryStore>;

fn transmitter(fingerprint: u16) -> Tx {
    block_on(TxNode::start(Air::default(), MemoryStore::new(), Fingerprint(fingerprint), 0))
}

fn receiver(bindings: BindingTable) -> Rx {
    block_on(RxNode::start(Air::default(), MemoryStore::new(), bindings, 0))
}

fn drain(radio: &mut Air) -> Vec<Frame> {
    radio
        .sent
        .drain(..)
        .map(|raw| Frame::decode(&raw).expect("frame on air decodes"))
        .collect()
}

/// Hand everything the transmitter sent to the receiver.
fn tx_to_rx(tx: &mut Tx, rx: &mut Rx, now_ms: u64) -> Vec<RxEvent> {
    drain(tx.radio_mut())
        .iter()
        .filter_map(|frame| block_on(rx.on_frame(frame, -50, now_ms)).expect("receiver handles frame"))
        .collect()
}

/// Hand everything the receiver sent to the transmitter.
fn rx_to_tx(rx: &mut Rx, tx: &mut Tx, now_ms: u64) -> Vec<AssignmentEvent> {
    drain(rx.radio_mut())
        .iter()
        .filter_map(|frame| block_on(tx.on_frame(frame, now_ms)))
        .collect()
}

/// Run a full request for `target`, returning the transmitter's outcome.
fn claim(tx: &mut Tx, rx: &mut Rx, target: u8, now_ms: u64) -> Vec<AssignmentEvent> {
    block_on(tx.poll(now_ms)).expect("advertise");
    tx.request_address(target);
    block_on(tx.poll(now_ms + 1)).expect("request");
    tx_to_rx(tx, rx, now_ms + 2);
    rx_to_tx(rx, tx, now_ms + 3)
}

fn pin_frame(from: u8, pins: u16) -> Frame {
    Frame::Status(StatusPacket {
        header: Header {
            from,
            to: 0xFE,
            kind: PacketType::Pin,
        },
        pins,
        seq: 0,
        last_airtime: 0,
        airtime_total: 0,
        fingerprint: Fingerprint(0x0101),
    })
}

fn advertise(fingerprint: u16) -> Frame {
    Frame::Status(StatusPacket {
        header: Header {
            from: 0,
            to: 0xFF,
            kind: PacketType::Advertise,
        },
        pins: 0xFFFF,
        seq: 0,
        last_airtime: 0,
        airtime_total: 0,
        fingerprint: Fingerprint(fingerprint),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Assignment handshake
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn fresh_transmitter_gets_its_address() {
    let mut rx = receiver(BindingTable::default());
    let mut tx = transmitter(0xA001);
    assert_eq!(tx.client().mode(), TxMode::Ephemeral);

    let events = claim(&mut tx, &mut rx, 2, 0);
    assert!(matches!(events.as_slice(), [AssignmentEvent::Assigned { address: 2, .. }]));
    assert_eq!(tx.client().mode(), TxMode::Assigned);
    assert_eq!(tx.identity().address, 2);
    assert_eq!(tx.store().identity().map(|i| i.address), Some(2));
    assert_eq!(rx.registry().holder_of(2).map(|e| e.fingerprint), Some(Fingerprint(0xA001)));
    assert!(rx.store().node(2).is_some());
}

#[test]
fn taken_address_is_refused_and_requester_reverts() {
    let mut rx = receiver(BindingTable::default());
    let mut first = transmitter(0xA001);
    let mut second = transmitter(0xB002);

    claim(&mut first, &mut rx, 2, 0);
    let events = claim(&mut second, &mut rx, 2, 100);

    assert_eq!(
        events,
        vec![AssignmentEvent::Denied {
            target: 2,
            reason: DenyReason::Nack(NackReason::InUse),
        }]
    );
    assert_eq!(second.client().mode(), TxMode::Ephemeral);
    assert_eq!(rx.registry().holder_of(2).map(|e| e.fingerprint), Some(Fingerprint(0xA001)));
}

#[test]
fn silent_receiver_times_out_to_ephemeral() {
    let mut tx = transmitter(0xC003);
    tx.request_address(3);
    block_on(tx.poll(0)).unwrap();
    assert!(matches!(tx.client().mode(), TxMode::Requesting { target: 3, .. }));

    assert_eq!(block_on(tx.poll(1_000)).unwrap(), None);
    let event = block_on(tx.poll(1_001)).unwrap();
    assert_eq!(
        event,
        Some(AssignmentEvent::Denied {
            target: 3,
            reason: DenyReason::Timeout,
        })
    );
    assert_eq!(tx.client().mode(), TxMode::Ephemeral);

    // free to try again
    tx.request_address(3);
    block_on(tx.poll(1_002)).unwrap();
    assert!(matches!(tx.client().mode(), TxMode::Requesting { target: 3, .. }));
}

#[test]
fn no_two_entries_share_an_address() {
    let mut rx = receiver(BindingTable::default());
    let mut nodes: Vec<Tx> = (0..6).map(|n| transmitter(0x1000 + n)).collect();

    for (n, tx) in nodes.iter_mut().enumerate() {
        let target = (n % MAX_NODES) as u8 + 1;
        claim(tx, &mut rx, target, n as u64 * 10);
    }

    for address in 1..=MAX_NODES as u8 {
        let holders = rx
            .registry()
            .entries()
            .filter(|e| e.assigned && e.node_id == address)
            .count();
        assert!(holders <= 1, "address {} held {} times", address, holders);
    }
    let assigned = nodes.iter().filter(|tx| tx.client().is_assigned()).count();
    assert_eq!(assigned, MAX_NODES);
}

#[test]
fn full_registry_drops_unseen_advertisement() {
    let mut rx = receiver(BindingTable::default());
    for n in 0..MAX_NODES as u16 {
        let event = block_on(rx.on_frame(&advertise(0x2000 + n), -70, 0)).unwrap();
        assert_eq!(event, Some(RxEvent::Discovered(Fingerprint(0x2000 + n))));
    }
    let before: Vec<_> = rx.registry().entries().cloned().collect();

    let event = block_on(rx.on_frame(&advertise(0x3000), -70, 10)).unwrap();
    assert_eq!(event, None);
    let after: Vec<_> = rx.registry().entries().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn moving_transmitter_frees_its_old_address() {
    let mut rx = receiver(BindingTable::default());
    let mut first = transmitter(0xA001);
    let mut second = transmitter(0xB002);

    claim(&mut first, &mut rx, 2, 0);
    let moved = claim(&mut first, &mut rx, 3, 100);
    assert!(matches!(moved.as_slice(), [AssignmentEvent::Assigned { address: 3, .. }]));
    assert!(rx.registry().holder_of(2).is_none());
    assert!(rx.store().node(2).is_none());

    let events = claim(&mut second, &mut rx, 2, 200);
    assert!(matches!(events.as_slice(), [AssignmentEvent::Assigned { address: 2, .. }]));
    assert_eq!(rx.registry().holder_of(2).map(|e| e.fingerprint), Some(Fingerprint(0xB002)));
    assert_eq!(rx.registry().holder_of(3).map(|e| e.fingerprint), Some(Fingerprint(0xA001)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Pins to HID
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn shared_key_held_until_last_node_releases() {
    let a = HidBinding::single(HidAction::key(keys::A), 0, 0);
    let table = BindingTable::empty().with(0, 0, a).with(1, 0, a);
    let mut rx = receiver(table);
    let mut host = Host::default();

    block_on(rx.on_frame(&pin_frame(1, !1), -50, 0)).unwrap();
    block_on(rx.on_frame(&pin_frame(2, !1), -50, 5)).unwrap();
    assert!(rx.engine().keyboard_report().contains(keys::A));

    block_on(rx.on_frame(&pin_frame(1, 0xFFFF), -50, 10)).unwrap();
    assert!(rx.engine().keyboard_report().contains(keys::A));

    block_on(rx.on_frame(&pin_frame(2, 0xFFFF), -50, 15)).unwrap();
    assert!(!rx.engine().keyboard_report().contains(keys::A));

    rx.flush(&mut host);
    match host.reports.last() {
        Some(HidReport::Keyboard(report)) => assert!(report.is_empty()),
        other => panic!("expected a keyboard report, got {:?}", other),
    }
}

#[test]
fn assigned_transmitter_presses_reach_the_host() {
    let mut rx = receiver(rf2usb::hid::default_bindings());
    let mut tx = transmitter(0xD004);
    let mut host = Host::default();
    claim(&mut tx, &mut rx, 2, 0);

    // node 2 button 4 is 'A' in the stock layout
    block_on(tx.on_pins(!(1 << 4), 50)).unwrap();
    let events = tx_to_rx(&mut tx, &mut rx, 51);
    assert!(matches!(events.as_slice(), [RxEvent::Pins { address: 2, .. }]));

    rx.poll(52);
    rx.flush(&mut host);
    assert!(host
        .reports
        .iter()
        .any(|r| matches!(r, HidReport::Keyboard(k) if k.contains(keys::A))));

    block_on(tx.on_pins(0xFFFF, 100)).unwrap();
    tx_to_rx(&mut tx, &mut rx, 101);
    assert!(!rx.engine().keyboard_report().contains(keys::A));
}

#[test]
fn steady_hold_survives_past_link_timeout() {
    let mut rx = receiver(rf2usb::hid::default_bindings());
    let mut tx = transmitter(0xD006);
    claim(&mut tx, &mut rx, 2, 0);

    let held = !(1u16 << 4);
    block_on(tx.on_pins(held, 50)).unwrap();
    tx_to_rx(&mut tx, &mut rx, 50);

    // both loops tick every 5 ms; the pins never change so only heartbeats go out
    for now in (55..=6 * LINK_DOWN_MS).step_by(5) {
        block_on(tx.on_pins(held, now)).unwrap();
        block_on(tx.poll(now)).unwrap();
        tx_to_rx(&mut tx, &mut rx, now);
        rx.poll(now);
        assert!(rx.engine().keyboard_report().contains(keys::A), "'A' dropped at {} ms", now);
        assert_eq!(rx.link_state(2), LinkState::Up, "link down at {} ms", now);
    }
}

#[test]
fn ephemeral_transmitter_sends_no_pins() {
    let mut tx = transmitter(0xE005);
    block_on(tx.on_pins(!1, 0)).unwrap();
    assert!(drain(tx.radio_mut()).is_empty());
}

#[test]
fn unmount_drops_held_state() {
    let mut rx = receiver(rf2usb::hid::default_bindings());
    block_on(rx.on_frame(&pin_frame(2, !(1 << 4)), -50, 0)).unwrap();
    assert!(rx.engine().keyboard_report().contains(keys::A));

    rx.usb_unmounted();
    assert!(!rx.engine().keyboard_report().contains(keys::A));
    assert_eq!(rx.node_pins(2), 0xFFFF);
}
