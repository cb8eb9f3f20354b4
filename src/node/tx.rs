//! Transmitter role: relays local button pins to the receiver.

use crate::config::{BROADCAST_ADDRESS, HEARTBEAT_INTERVAL_MS, PIN_INVERT_MASK, RECEIVER_ADDRESS};
use crate::error::Error;
use crate::pins::{PinDelta, PinTracker};
use crate::protocol::identity::{Fingerprint, NodeIdentity, UNASSIGNED};
use crate::protocol::radio::{Link, RadioLink};
use crate::protocol::transmitter::{AssignmentClient, AssignmentEvent, ClientStep};
use crate::protocol::wire::{Assignment, Frame, PacketType};
use crate::storage::{load_identity_or_default, ErrorCode, IdentityStore};
use log::{debug, info, warn};

pub struct TxNode<R, S> {
    link: Link<R>,
    store: S,
    identity: NodeIdentity,
    client: AssignmentClient,
    pins: PinTracker,
    last_heartbeat_ms: u64,
}

impl<R: RadioLink, S: IdentityStore> TxNode<R, S> {
    /// Load the stored identity and come up assigned or ephemeral.
    pub async fn start(radio: R, mut store: S, fingerprint: Fingerprint, now_ms: u64) -> Self {
        let identity = load_identity_or_default(&mut store, now_ms).await;
        let assigned = identity.is_assigned();
        let address = if assigned { identity.address } else { UNASSIGNED };
        info!(
            "tx up as {} ({}), fp {}",
            address, identity.name, fingerprint
        );
        Self {
            link: Link::new(radio, address),
            store,
            identity,
            client: AssignmentClient::new(fingerprint, assigned),
            pins: PinTracker::new(PIN_INVERT_MASK),
            last_heartbeat_ms: now_ms,
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn client(&self) -> &AssignmentClient {
        &self.client
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

    pub fn pins(&self) -> u16 {
        self.pins.pins()
    }

    /// Ask the receiver for `target`; the request goes out on the next poll.
    pub fn request_address(&mut self, target: u8) {
        self.client.request_address(target);
    }

    /// New raw reading from the expander. Sends a pin packet when
    /// something changed and the node holds an address.
    pub async fn on_pins(&mut self, raw: u16, now_ms: u64) -> Result<PinDelta, Error> {
        let delta = self.pins.update(raw);
        if !delta.is_empty() && self.client.is_assigned() {
            debug!("pins {}", delta);
            self.send_status(PacketType::Pin, now_ms).await?;
        }
        Ok(delta)
    }

    /// Drive the assignment handshake and the heartbeat.
    pub async fn poll(&mut self, now_ms: u64) -> Result<Option<AssignmentEvent>, Error> {
        match self.client.poll(now_ms) {
            ClientStep::Idle => {}
            ClientStep::Advertise => {
                let fingerprint = self.client.fingerprint();
                let pins = self.pins.pins();
                self.link
                    .send_status(PacketType::Advertise, BROADCAST_ADDRESS, pins, fingerprint, now_ms)
                    .await?;
            }
            ClientStep::SendRequest { target } => {
                let request = Frame::AssignRequest(Assignment {
                    header: self.link.header(RECEIVER_ADDRESS, PacketType::AssignRequest),
                    fingerprint: self.client.fingerprint(),
                    address: target,
                    name: self.identity.name.clone(),
                });
                self.link.send_frame(&request, now_ms).await?;
            }
            ClientStep::Finished(event) => {
                self.store.record_error(ErrorCode::AssignDenied, now_ms).await;
                return Ok(Some(event));
            }
        }

        if self.client.is_assigned()
            && now_ms.saturating_sub(self.last_heartbeat_ms) >= HEARTBEAT_INTERVAL_MS
        {
            self.send_status(PacketType::Heartbeat, now_ms).await?;
        }
        Ok(None)
    }

    /// Handle a frame from the receiver.
    pub async fn on_frame(&mut self, frame: &Frame, now_ms: u64) -> Option<AssignmentEvent> {
        let to = frame.header().to;
        if to != BROADCAST_ADDRESS && to != self.link.address() {
            return None;
        }
        match frame {
            Frame::AssignAck(ack) => {
                let event = self.client.on_ack(ack)?;
                self.identity = NodeIdentity {
                    address: ack.address,
                    name: ack.name.clone(),
                };
                self.link.set_address(ack.address);
                self.last_heartbeat_ms = now_ms;
                if let Err(e) = self.store.save_identity(&self.identity).await {
                    warn!("identity not saved: {:?}", e);
                    self.store.record_error(ErrorCode::SaveFail, now_ms).await;
                }
                Some(event)
            }
            Frame::AssignNack(nack) => {
                let event = self.client.on_nack(nack)?;
                self.store.record_error(ErrorCode::AssignDenied, now_ms).await;
                Some(event)
            }
            _ => None,
        }
    }

    async fn send_status(&mut self, kind: PacketType, now_ms: u64) -> Result<(), Error> {
        self.last_heartbeat_ms = now_ms;
        let fingerprint = self.client.fingerprint();
        let pins = self.pins.pins();
        self.link
            .send_status(kind, RECEIVER_ADDRESS, pins, fingerprint, now_ms)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::identity::NodeName;
    use crate::protocol::transmitter::{DenyReason, TxMode};
    use crate::protocol::wire::{AssignNack, Header, NackReason};
    use crate::storage::MemoryStore;
    use crate::testing::{block_on, MockRadio};

    const FP: Fingerprint = Fingerprint(0x1234);

    fn fresh() -> TxNode<MockRadio, MockStore> {
        block_on(TxNode::start(MockRadio::new(), MockStore::default(), FP, 0))
    }

    #[derive(Default)]
    struct MockStore {
        inner: MemoryStore,
        fail_saves: bool,
    }

    impl IdentityStore for MockStore {
        async fn load_identity(&mut self) -> Result<NodeIdentity, crate::error::StorageError> {
            self.inner.load_identity().await
        }
        async fn save_identity(&mut self, identity: &NodeIdentity) -> Result<(), crate::error::StorageError> {
            if self.fail_saves {
                return Err(crate::error::StorageError::Write);
            }
            self.inner.save_identity(identity).await
        }
        async fn load_node(&mut self, address: u8) -> Result<Option<NodeName>, crate::error::StorageError> {
            self.inner.load_node(address).await
        }
        async fn save_node(&mut self, address: u8, name: &NodeName) -> Result<(), crate::error::StorageError> {
            self.inner.save_node(address, name).await
        }
        async fn forget_node(&mut self, address: u8) -> Result<(), crate::error::StorageError> {
            self.inner.forget_node(address).await
        }
        async fn record_error(&mut self, code: ErrorCode, now_ms: u64) {
            self.inner.record_error(code, now_ms).await
        }
    }

    fn ack(fingerprint: Fingerprint, address: u8, name: &str) -> Frame {
        Frame::AssignAck(Assignment {
            header: Header {
                from: RECEIVER_ADDRESS,
                to: BROADCAST_ADDRESS,
                kind: PacketType::AssignAck,
            },
            fingerprint,
            address,
            name: NodeName::new(name),
        })
    }

    #[test]
    fn boots_ephemeral_and_records_missing_config() {
        let mut node = fresh();
        assert_eq!(node.identity(), &NodeIdentity::default());
        assert_eq!(node.link().address(), UNASSIGNED);
        assert_eq!(node.store().inner.errors().latest().unwrap().code, ErrorCode::ConfigMissing);

        block_on(node.poll(0)).unwrap();
        let sent = node.link().radio().decoded();
        match &sent[0] {
            Frame::Status(p) => {
                assert_eq!(p.header.kind, PacketType::Advertise);
                assert_eq!(p.header.to, BROADCAST_ADDRESS);
                assert_eq!(p.fingerprint, FP);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn boots_assigned_from_stored_identity() {
        let mut store = MockStore::default();
        store.inner.set_identity(NodeIdentity::new(3, "Pedal"));
        let mut node = block_on(TxNode::start(MockRadio::new(), store, FP, 0));
        assert!(node.client().is_assigned());
        assert_eq!(node.link().address(), 3);
        assert!(node.store().inner.errors().is_empty());
    }

    #[test]
    fn ephemeral_node_does_not_send_pins() {
        let mut node = fresh();
        let delta = block_on(node.on_pins(0xFFFE, 10)).unwrap();
        assert!(!delta.is_empty());
        assert!(node.link().radio().sent.is_empty());
    }

    #[test]
    fn ack_adopts_and_persists_address() {
        let mut node = fresh();
        node.request_address(2);
        block_on(node.poll(0)).unwrap();
        match node.link().radio().decoded().last() {
            Some(Frame::AssignRequest(req)) => {
                assert_eq!(req.address, 2);
                assert_eq!(req.fingerprint, FP);
                assert_eq!(req.header.to, RECEIVER_ADDRESS);
                assert_eq!(req.name.as_str(), "Default Node");
            }
            other => panic!("unexpected {:?}", other),
        }

        let event = block_on(node.on_frame(&ack(FP, 2, "TX2"), 50));
        assert_eq!(
            event,
            Some(AssignmentEvent::Assigned {
                address: 2,
                name: NodeName::new("TX2")
            })
        );
        assert_eq!(node.link().address(), 2);
        assert_eq!(node.store().inner.identity(), Some(&NodeIdentity::new(2, "TX2")));

        block_on(node.on_pins(0xFFFE, 60)).unwrap();
        match node.link().radio().decoded().last() {
            Some(Frame::Status(p)) => {
                assert_eq!(p.header.kind, PacketType::Pin);
                assert_eq!(p.header.from, 2);
                assert_eq!(p.pins, 0xFFFE);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ack_for_someone_else_is_ignored() {
        let mut node = fresh();
        node.request_address(2);
        block_on(node.poll(0)).unwrap();
        assert_eq!(block_on(node.on_frame(&ack(Fingerprint(0x9999), 2, "TX2"), 10)), None);
        assert!(matches!(node.client().mode(), TxMode::Requesting { .. }));
    }

    #[test]
    fn failed_save_still_adopts_address() {
        let store = MockStore {
            fail_saves: true,
            ..MockStore::default()
        };
        let mut node = block_on(TxNode::start(MockRadio::new(), store, FP, 0));
        node.request_address(1);
        block_on(node.poll(0)).unwrap();
        assert!(block_on(node.on_frame(&ack(FP, 1, "TX1"), 10)).is_some());
        assert_eq!(node.link().address(), 1);
        assert_eq!(node.store().inner.errors().latest().unwrap().code, ErrorCode::SaveFail);
    }

    #[test]
    fn nack_and_timeout_are_recorded() {
        let mut node = fresh();
        node.request_address(4);
        block_on(node.poll(0)).unwrap();
        let nack = Frame::AssignNack(AssignNack {
            header: Header {
                from: RECEIVER_ADDRESS,
                to: BROADCAST_ADDRESS,
                kind: PacketType::AssignNack,
            },
            fingerprint: FP,
            reason: NackReason::InUse,
        });
        assert_eq!(
            block_on(node.on_frame(&nack, 20)),
            Some(AssignmentEvent::Denied {
                target: 4,
                reason: DenyReason::Nack(NackReason::InUse)
            })
        );
        assert_eq!(node.store().inner.errors().latest().unwrap().code, ErrorCode::AssignDenied);

        node.request_address(4);
        block_on(node.poll(100)).unwrap();
        assert_eq!(block_on(node.poll(1_000)).unwrap(), None);
        assert_eq!(
            block_on(node.poll(1_101)).unwrap(),
            Some(AssignmentEvent::Denied {
                target: 4,
                reason: DenyReason::Timeout
            })
        );
        assert_eq!(node.client().mode(), TxMode::Ephemeral);
        assert_eq!(node.link().address(), UNASSIGNED);
    }

    #[test]
    fn assigned_node_sends_heartbeats() {
        let mut store = MockStore::default();
        store.inner.set_identity(NodeIdentity::new(1, "Left"));
        let mut node = block_on(TxNode::start(MockRadio::new(), store, FP, 0));
        block_on(node.on_pins(0xFFFD, 100)).unwrap();

        block_on(node.poll(100 + HEARTBEAT_INTERVAL_MS - 1)).unwrap();
        assert_eq!(node.link().radio().sent.len(), 1);
        block_on(node.poll(100 + HEARTBEAT_INTERVAL_MS)).unwrap();
        match node.link().radio().decoded().last() {
            Some(Frame::Status(p)) => {
                assert_eq!(p.header.kind, PacketType::Heartbeat);
                assert_eq!(p.pins, 0xFFFD);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
