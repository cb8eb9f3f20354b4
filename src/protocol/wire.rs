//! Over-the-air frame layouts.
//!
//! All multi-byte fields are little-endian. Every frame starts with the
//! same four bytes:
//!
//! ```text
//! 0: from      sender address (0 = unassigned transmitter)
//! 1: to        destination address (0xFF = broadcast)
//! 2: type      packet type code
//! 3: reserved
//! ```
//!
//! The type code selects the body:
//!
//! ```text
//! status (16 bytes)        4: pins u16, 6: seq u32, 10: last airtime u16 (0.1 ms),
//!                          12: airtime total u16 (ms), 14: fingerprint u16
//! assign request (23)      4: fingerprint u16, 6: requested address, 7: name[16]
//! assign ack (23)          4: fingerprint u16, 6: assigned address, 7: name[16]
//! assign nack (7)          4: fingerprint u16, 6: reason
//! ```

use super::identity::{Fingerprint, NodeName, NODE_NAME_WIRE_LEN};
use crate::error::WireError;

pub const HEADER_LEN: usize = 4;
pub const STATUS_LEN: usize = 16;
pub const ASSIGN_LEN: usize = HEADER_LEN + 3 + NODE_NAME_WIRE_LEN;
pub const NACK_LEN: usize = HEADER_LEN + 3;

/// Longest frame any node sends.
pub const MAX_FRAME_LEN: usize = ASSIGN_LEN;

/// Packet type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    Pin = 1,
    Heartbeat = 2,
    Hello = 3,
    HelloAck = 4,
    Role = 5,
    AssignConfirm = 6,
    AssignDeny = 7,
    Advertise = 10,
    AssignRequest = 11,
    AssignAck = 12,
    AssignNack = 13,
}

impl TryFrom<u8> for PacketType {
    type Error = WireError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => PacketType::Pin,
            2 => PacketType::Heartbeat,
            3 => PacketType::Hello,
            4 => PacketType::HelloAck,
            5 => PacketType::Role,
            6 => PacketType::AssignConfirm,
            7 => PacketType::AssignDeny,
            10 => PacketType::Advertise,
            11 => PacketType::AssignRequest,
            12 => PacketType::AssignAck,
            13 => PacketType::AssignNack,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

/// Why the receiver refused an assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NackReason {
    InUse = 1,
    Malformed = 2,
    NameRequired = 3,
    SaveFailure = 4,
    GeneralError = 5,
}

impl NackReason {
    /// Unknown codes read as `GeneralError`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => NackReason::InUse,
            2 => NackReason::Malformed,
            3 => NackReason::NameRequired,
            4 => NackReason::SaveFailure,
            _ => NackReason::GeneralError,
        }
    }

    /// Short text for the display and logs.
    pub fn message(self) -> &'static str {
        match self {
            NackReason::InUse => "Node ID in use",
            NackReason::Malformed => "Malformed request",
            NackReason::NameRequired => "Name required",
            NackReason::SaveFailure => "Save failure",
            NackReason::GeneralError => "General error",
        }
    }
}

/// Source/destination/type prefix shared by every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub from: u8,
    pub to: u8,
    pub kind: PacketType,
}

impl Header {
    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.from;
        buf[1] = self.to;
        buf[2] = self.kind as u8;
        buf[3] = 0;
    }
}

/// Pin state, heartbeat, advertisement and the other fixed-size packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusPacket {
    pub header: Header,
    pub pins: u16,
    pub seq: u32,
    /// Airtime of the sender's previous transmission, 0.1 ms units.
    pub last_airtime: u16,
    /// Sender's airtime over the rolling window, ms.
    pub airtime_total: u16,
    pub fingerprint: Fingerprint,
}

/// Request (transmitter → receiver) or ack (receiver → transmitter).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Assignment {
    pub header: Header,
    pub fingerprint: Fingerprint,
    pub address: u8,
    pub name: NodeName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssignNack {
    pub header: Header,
    pub fingerprint: Fingerprint,
    pub reason: NackReason,
}

/// Any decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    Status(StatusPacket),
    AssignRequest(Assignment),
    AssignAck(Assignment),
    AssignNack(AssignNack),
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

impl Frame {
    pub fn header(&self) -> &Header {
        match self {
            Frame::Status(p) => &p.header,
            Frame::AssignRequest(a) | Frame::AssignAck(a) => &a.header,
            Frame::AssignNack(n) => &n.header,
        }
    }

    /// Encoded size.
    pub fn encoded_len(&self) -> usize {
        match self {
            Frame::Status(_) => STATUS_LEN,
            Frame::AssignRequest(_) | Frame::AssignAck(_) => ASSIGN_LEN,
            Frame::AssignNack(_) => NACK_LEN,
        }
    }

    /// Decode a received buffer. Trailing bytes are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated);
        }
        let header = Header {
            from: buf[0],
            to: buf[1],
            kind: PacketType::try_from(buf[2])?,
        };

        let needed = match header.kind {
            PacketType::AssignRequest | PacketType::AssignAck => ASSIGN_LEN,
            PacketType::AssignNack => NACK_LEN,
            _ => STATUS_LEN,
        };
        if buf.len() < needed {
            return Err(WireError::Truncated);
        }

        Ok(match header.kind {
            PacketType::AssignRequest | PacketType::AssignAck => {
                let body = Assignment {
                    header,
                    fingerprint: Fingerprint(u16_at(buf, 4)),
                    address: buf[6],
                    name: NodeName::from_wire(&buf[7..ASSIGN_LEN]),
                };
                if header.kind == PacketType::AssignRequest {
                    Frame::AssignRequest(body)
                } else {
                    Frame::AssignAck(body)
                }
            }
            PacketType::AssignNack => Frame::AssignNack(AssignNack {
                header,
                fingerprint: Fingerprint(u16_at(buf, 4)),
                reason: NackReason::from_code(buf[6]),
            }),
            _ => Frame::Status(StatusPacket {
                header,
                pins: u16_at(buf, 4),
                seq: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
                last_airtime: u16_at(buf, 10),
                airtime_total: u16_at(buf, 12),
                fingerprint: Fingerprint(u16_at(buf, 14)),
            }),
        })
    }

    /// Encode into `buf`. Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        let len = self.encoded_len();
        if buf.len() < len {
            return Err(WireError::BufferTooSmall);
        }
        self.header().write(buf);

        match self {
            Frame::Status(p) => {
                buf[4..6].copy_from_slice(&p.pins.to_le_bytes());
                buf[6..10].copy_from_slice(&p.seq.to_le_bytes());
                buf[10..12].copy_from_slice(&p.last_airtime.to_le_bytes());
                buf[12..14].copy_from_slice(&p.airtime_total.to_le_bytes());
                buf[14..16].copy_from_slice(&p.fingerprint.0.to_le_bytes());
            }
            Frame::AssignRequest(a) | Frame::AssignAck(a) => {
                buf[4..6].copy_from_slice(&a.fingerprint.0.to_le_bytes());
                buf[6] = a.address;
                buf[7..ASSIGN_LEN].copy_from_slice(&a.name.to_wire());
            }
            Frame::AssignNack(n) => {
                buf[4..6].copy_from_slice(&n.fingerprint.0.to_le_bytes());
                buf[6] = n.reason as u8;
            }
        }
        Ok(len)
    }
}
