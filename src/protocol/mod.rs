//! Radio protocol: frames, identities and the address assignment
//! handshake between transmitters and the receiver.

pub mod airtime;
pub mod identity;
pub mod radio;
pub mod registry;
pub mod transmitter;
pub mod wire;

pub use airtime::{AirtimeStats, AirtimeTracker};
pub use identity::{Fingerprint, NodeIdentity, NodeName};
pub use radio::{Link, RadioLink, Received};
pub use registry::{Grant, NodeEntry, NodeRegistry};
pub use transmitter::{AssignmentClient, AssignmentEvent, ClientStep, DenyReason, TxMode};
pub use wire::{AssignNack, Assignment, Frame, Header, NackReason, PacketType, StatusPacket};
