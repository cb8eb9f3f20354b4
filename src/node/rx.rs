//! Receiver role: hands out addresses and turns remote pins into HID
//! reports.

use crate::config::{ALLOW_AUTO_NAMING, BROADCAST_ADDRESS, MAX_NODES, RECEIVER_ADDRESS};
use crate::error::Error;
use crate::hid::{BindingTable, HidEngine, HidTransport};
use crate::link::{LinkMonitor, LinkState};
use crate::pins::{PinDelta, PinTracker, Transition, ALL_RELEASED};
use crate::protocol::identity::{node_index, Fingerprint};
use crate::protocol::radio::{Link, RadioLink};
use crate::protocol::registry::{Grant, NodeRegistry};
use crate::protocol::wire::{AssignNack, Assignment, Frame, NackReason, PacketType, StatusPacket};
use crate::storage::{ErrorCode, IdentityStore};
use heapless::Vec;
use log::{debug, info, warn};

/// Something the display may want to show.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    Pins { address: u8, delta: PinDelta },
    Discovered(Fingerprint),
    Assigned(Grant),
    Refused { address: u8, reason: NackReason },
}

pub struct RxNode<R, S> {
    link: Link<R>,
    store: S,
    registry: NodeRegistry,
    engine: HidEngine,
    pins: [PinTracker; MAX_NODES],
    links: [LinkMonitor; MAX_NODES],
}

impl<R: RadioLink, S: IdentityStore> RxNode<R, S> {
    /// Restore stored node records into the registry.
    pub async fn start(radio: R, mut store: S, bindings: BindingTable, now_ms: u64) -> Self {
        let mut registry = NodeRegistry::new();
        for address in 1..=MAX_NODES as u8 {
            match store.load_node(address).await {
                Ok(Some(name)) => registry.restore(address, name),
                Ok(None) => {}
                Err(e) => {
                    warn!("node {} record unreadable: {:?}", address, e);
                    store.record_error(ErrorCode::LoadFail, now_ms).await;
                }
            }
        }
        info!("rx up, {} known nodes", registry.entries().count());
        Self {
            link: Link::new(radio, RECEIVER_ADDRESS),
            store,
            registry,
            engine: HidEngine::new(bindings),
            pins: [PinTracker::default(); MAX_NODES],
            links: [LinkMonitor::new(); MAX_NODES],
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &HidEngine {
        &self.engine
    }

    pub fn link(&mut self) -> &mut Link<R> {
        &mut self.link
    }

    pub fn radio_mut(&mut self) -> &mut R {
        self.link.radio_mut()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Link state of node `address`.
    pub fn link_state(&self, address: u8) -> LinkState {
        node_index(address).map_or(LinkState::Down, |i| self.links[i].state())
    }

    /// Last pin snapshot seen from node `address`.
    pub fn node_pins(&self, address: u8) -> u16 {
        node_index(address).map_or(ALL_RELEASED, |i| self.pins[i].pins())
    }

    /// Dispatch a received frame.
    pub async fn on_frame(&mut self, frame: &Frame, rssi: i16, now_ms: u64) -> Result<Option<RxEvent>, Error> {
        let to = frame.header().to;
        if to != RECEIVER_ADDRESS && to != BROADCAST_ADDRESS {
            return Ok(None);
        }
        match frame {
            Frame::Status(packet) => Ok(self.on_status(packet, rssi, now_ms)),
            Frame::AssignRequest(request) => self.on_request(request, rssi, now_ms).await.map(Some),
            Frame::AssignAck(_) | Frame::AssignNack(_) => Ok(None),
        }
    }

    fn on_status(&mut self, packet: &StatusPacket, rssi: i16, now_ms: u64) -> Option<RxEvent> {
        match packet.header.kind {
            PacketType::Advertise => self
                .registry
                .observe_advertisement(packet.fingerprint, rssi, now_ms)
                .then_some(RxEvent::Discovered(packet.fingerprint)),
            PacketType::Pin | PacketType::Heartbeat => {
                let address = packet.header.from;
                let index = node_index(address)?;
                self.links[index].note_packet(now_ms);
                self.registry.touch(address, rssi, now_ms);
                let delta = self.pins[index].update(packet.pins);
                if delta.is_empty() {
                    return None;
                }
                self.apply(index, &delta, now_ms);
                Some(RxEvent::Pins { address, delta })
            }
            other => {
                debug!("ignoring {:?} from {}", other, packet.header.from);
                None
            }
        }
    }

    async fn on_request(&mut self, request: &Assignment, rssi: i16, now_ms: u64) -> Result<RxEvent, Error> {
        let outcome = match self.registry.validate(request, ALLOW_AUTO_NAMING) {
            Ok(grant) => match self.store.save_node(grant.address, &grant.name).await {
                Ok(()) => Ok(grant),
                Err(e) => {
                    warn!("node {} not saved: {:?}", grant.address, e);
                    self.store.record_error(ErrorCode::SaveFail, now_ms).await;
                    Err(NackReason::SaveFailure)
                }
            },
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(grant) => {
                if let Some(old) = self.registry.install(&grant, rssi, now_ms) {
                    self.release_address(old, now_ms).await;
                }
                let ack = Frame::AssignAck(Assignment {
                    header: self.link.header(BROADCAST_ADDRESS, PacketType::AssignAck),
                    fingerprint: grant.fingerprint,
                    address: grant.address,
                    name: grant.name.clone(),
                });
                self.link.send_frame(&ack, now_ms).await?;
                Ok(RxEvent::Assigned(grant))
            }
            Err(reason) => {
                info!("refusing address {}: {}", request.address, reason.message());
                let nack = Frame::AssignNack(AssignNack {
                    header: self.link.header(BROADCAST_ADDRESS, PacketType::AssignNack),
                    fingerprint: request.fingerprint,
                    reason,
                });
                self.link.send_frame(&nack, now_ms).await?;
                Ok(RxEvent::Refused {
                    address: request.address,
                    reason,
                })
            }
        }
    }

    /// Auto-repeat and link supervision. Nodes whose link dropped have
    /// their held buttons released. Returns the link changes.
    pub fn poll(&mut self, now_ms: u64) -> Vec<(u8, LinkState), MAX_NODES> {
        self.engine.tick(now_ms);
        let mut changes = Vec::new();
        for index in 0..MAX_NODES {
            let Some(state) = self.links[index].update(now_ms) else {
                continue;
            };
            if state == LinkState::Down {
                let delta = self.pins[index].update(ALL_RELEASED);
                self.apply(index, &delta, now_ms);
            }
            let _ = changes.push((index as u8 + 1, state));
        }
        changes
    }

    /// Push pending reports. Returns how many were sent.
    pub fn flush<T: HidTransport>(&mut self, transport: &mut T) -> usize {
        self.engine.flush(transport)
    }

    /// Host dropped the USB device: forget all held state.
    pub fn usb_unmounted(&mut self) {
        info!("usb unmounted, resetting hid state");
        self.engine.reset();
        for tracker in self.pins.iter_mut() {
            tracker.reset();
        }
    }

    /// A node moved off `address`: drop its record and anything it held there.
    async fn release_address(&mut self, address: u8, now_ms: u64) {
        if let Err(e) = self.store.forget_node(address).await {
            warn!("node {} record not cleared: {:?}", address, e);
            self.store.record_error(ErrorCode::SaveFail, now_ms).await;
        }
        if let Some(index) = node_index(address) {
            let delta = self.pins[index].update(ALL_RELEASED);
            self.apply(index, &delta, now_ms);
        }
    }

    fn apply(&mut self, index: usize, delta: &PinDelta, now_ms: u64) {
        for transition in delta.transitions() {
            match transition {
                Transition::Pressed(pin) => self.engine.press(index, usize::from(pin), now_ms),
                Transition::Released(pin) => self.engine.release(index, usize::from(pin), now_ms),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::LINK_DOWN_MS;
    use crate::hid::gamepad::buttons;
    use crate::hid::keyboard::keys;
    use crate::hid::HidReport;
    use crate::protocol::identity::NodeName;
    use crate::protocol::wire::Header;
    use crate::storage::MemoryStore;
    use crate::testing::{block_on, MockRadio};
    use std::vec::Vec as StdVec;

    struct Usb {
        reports: StdVec<HidReport>,
    }

    impl HidTransport for Usb {
        fn is_ready(&self) -> bool {
            true
        }
        fn send(&mut self, report: HidReport) -> Result<(), crate::error::TransportError> {
            self.reports.push(report);
            Ok(())
        }
    }

    fn node() -> RxNode<MockRadio, MemoryStore> {
        block_on(RxNode::start(MockRadio::new(), MemoryStore::new(), BindingTable::default(), 0))
    }

    fn status(kind: PacketType, from: u8, pins: u16) -> Frame {
        Frame::Status(StatusPacket {
            header: Header {
                from,
                to: RECEIVER_ADDRESS,
                kind,
            },
            pins,
            seq: 1,
            last_airtime: 0,
            airtime_total: 0,
            fingerprint: Fingerprint(0x42),
        })
    }

    fn request(fingerprint: u16, address: u8, name: &str) -> Frame {
        Frame::AssignRequest(Assignment {
            header: Header {
                from: 0,
                to: RECEIVER_ADDRESS,
                kind: PacketType::AssignRequest,
            },
            fingerprint: Fingerprint(fingerprint),
            address,
            name: NodeName::new(name),
        })
    }

    #[test]
    fn restores_stored_nodes() {
        let mut store = MemoryStore::new();
        store.set_node(2, NodeName::new("Left"));
        let rx = block_on(RxNode::start(MockRadio::new(), store, BindingTable::default(), 0));
        let entry = rx.registry().holder_of(2).unwrap();
        assert_eq!(entry.name.as_str(), "Left");
        assert_eq!(entry.fingerprint, Fingerprint::UNKNOWN);
    }

    #[test]
    fn request_is_acked_and_persisted() {
        let mut rx = node();
        let event = block_on(rx.on_frame(&request(0x77, 2, ""), -50, 10)).unwrap();
        assert!(matches!(event, Some(RxEvent::Assigned(ref g)) if g.name.as_str() == "TX2"));
        assert_eq!(rx.store().node(2).map(NodeName::as_str), Some("TX2"));
        match rx.link().radio().decoded().last() {
            Some(Frame::AssignAck(ack)) => {
                assert_eq!(ack.header.to, BROADCAST_ADDRESS);
                assert_eq!(ack.header.from, RECEIVER_ADDRESS);
                assert_eq!(ack.fingerprint, Fingerprint(0x77));
                assert_eq!(ack.address, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn refusal_leaves_registry_untouched() {
        let mut rx = node();
        block_on(rx.on_frame(&request(0x10, 1, "A"), -50, 0)).unwrap();
        let event = block_on(rx.on_frame(&request(0x20, 1, "B"), -50, 5)).unwrap();
        assert_eq!(
            event,
            Some(RxEvent::Refused {
                address: 1,
                reason: NackReason::InUse
            })
        );
        assert_eq!(rx.registry().holder_of(1).unwrap().fingerprint, Fingerprint(0x10));
        match rx.link().radio().decoded().last() {
            Some(Frame::AssignNack(nack)) => {
                assert_eq!(nack.fingerprint, Fingerprint(0x20));
                assert_eq!(nack.reason, NackReason::InUse);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn moved_node_frees_its_old_record() {
        let mut rx = node();
        block_on(rx.on_frame(&request(0x10, 2, "Left"), -50, 0)).unwrap();
        block_on(rx.on_frame(&request(0x10, 3, "Left"), -50, 10)).unwrap();
        assert_eq!(rx.store().node(2), None);
        assert_eq!(rx.store().node(3).map(NodeName::as_str), Some("Left"));

        let event = block_on(rx.on_frame(&request(0x20, 2, "Right"), -50, 20)).unwrap();
        assert!(matches!(event, Some(RxEvent::Assigned(ref g)) if g.address == 2));
        assert_eq!(rx.store().node(2).map(NodeName::as_str), Some("Right"));
    }

    #[test]
    fn frames_for_other_addresses_are_ignored() {
        let mut rx = node();
        let mut frame = status(PacketType::Pin, 1, 0xFFFE);
        if let Frame::Status(p) = &mut frame {
            p.header.to = 7;
        }
        assert_eq!(block_on(rx.on_frame(&frame, -50, 0)).unwrap(), None);
        assert!(!rx.engine().is_pressed(0, 0));
    }

    #[test]
    fn pins_drive_the_engine() {
        let mut rx = node();
        let mut usb = Usb { reports: StdVec::new() };

        // node 2 button 4 is 'A' in the default table
        let event = block_on(rx.on_frame(&status(PacketType::Pin, 2, !(1 << 4)), -40, 0)).unwrap();
        assert!(matches!(event, Some(RxEvent::Pins { address: 2, .. })));
        assert_eq!(rx.link_state(2), LinkState::Up);
        assert!(rx.engine().keyboard_report().contains(keys::A));
        assert_eq!(rx.flush(&mut usb), 1);

        block_on(rx.on_frame(&status(PacketType::Heartbeat, 2, 0xFFFF), -40, 100)).unwrap();
        assert!(rx.engine().keyboard_report().is_empty());
    }

    #[test]
    fn link_loss_releases_held_buttons() {
        let mut rx = node();
        block_on(rx.on_frame(&status(PacketType::Pin, 1, !1), -40, 0)).unwrap();
        assert!(rx.engine().gamepad_report().is_pressed(buttons::A));

        assert!(rx.poll(LINK_DOWN_MS).is_empty());
        let changes = rx.poll(LINK_DOWN_MS + 1);
        assert_eq!(changes.as_slice(), &[(1, LinkState::Down)]);
        assert!(!rx.engine().gamepad_report().is_pressed(buttons::A));
        assert_eq!(rx.node_pins(1), ALL_RELEASED);
    }

    #[test]
    fn usb_unmount_resets_everything() {
        let mut rx = node();
        block_on(rx.on_frame(&status(PacketType::Pin, 1, !1), -40, 0)).unwrap();
        rx.usb_unmounted();
        assert!(!rx.engine().is_pressed(0, 0));
        assert!(!rx.engine().is_dirty());

        // the held button is seen as a fresh press on the next packet
        block_on(rx.on_frame(&status(PacketType::Heartbeat, 1, !1), -40, 10)).unwrap();
        assert!(rx.engine().is_pressed(0, 0));
    }
}
