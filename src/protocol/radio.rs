//! Radio seam and the sending side of the link.
//!
//! [`RadioLink`] is implemented by the RFM69 driver on target and by mocks
//! in tests. [`Link`] wraps it with the node's address, the status packet
//! sequence counter and airtime accounting.

use core::future::Future;

use super::airtime::AirtimeTracker;
use super::identity::Fingerprint;
use super::wire::{Frame, Header, PacketType, StatusPacket, MAX_FRAME_LEN};
use crate::error::{Error, RadioError};
use log::{debug, trace};

/// Metadata of a received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Received {
    pub len: usize,
    /// Signal strength in dBm.
    pub rssi: i16,
}

/// Raw packet radio.
pub trait RadioLink {
    /// Transmit one frame and wait until it left the antenna.
    /// Returns the on-air time in microseconds.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<u32, RadioError>>;

    /// Wait for the next frame and copy it into `buf`.
    fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<Received, RadioError>>;

    /// Signal strength of the last received frame (dBm).
    fn last_rssi(&self) -> i16;
}

/// Sending half of a node: stamps and accounts every outgoing frame.
pub struct Link<R> {
    radio: R,
    address: u8,
    seq: u32,
    airtime: AirtimeTracker,
}

impl<R: RadioLink> Link<R> {
    pub fn new(radio: R, address: u8) -> Self {
        Self {
            radio,
            address,
            seq: 0,
            airtime: AirtimeTracker::new(),
        }
    }

    /// Address written into the `from` field.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Sequence number of the last status packet sent.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn airtime(&mut self) -> &mut AirtimeTracker {
        &mut self.airtime
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Header from this node.
    pub fn header(&self, to: u8, kind: PacketType) -> Header {
        Header {
            from: self.address,
            to,
            kind,
        }
    }

    /// Send a status packet, filling sequence and airtime fields.
    pub async fn send_status(
        &mut self,
        kind: PacketType,
        to: u8,
        pins: u16,
        fingerprint: Fingerprint,
        now_ms: u64,
    ) -> Result<(), Error> {
        self.seq = self.seq.wrapping_add(1);
        self.airtime.evict(now_ms);
        let packet = StatusPacket {
            header: self.header(to, kind),
            pins,
            seq: self.seq,
            last_airtime: self.airtime.last_airtime_field(),
            airtime_total: self.airtime.total_field(),
            fingerprint,
        };
        trace!("tx {:?} seq {} pins {:#06x}", kind, self.seq, pins);
        self.send_frame(&Frame::Status(packet), now_ms).await
    }

    /// Encode and send any frame, recording its airtime.
    pub async fn send_frame(&mut self, frame: &Frame, now_ms: u64) -> Result<(), Error> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = frame.encode(&mut buf)?;
        match self.radio.send(&buf[..len]).await {
            Ok(airtime_us) => {
                self.airtime.record(now_ms, airtime_us);
                Ok(())
            }
            Err(e) => {
                debug!("radio send failed: {:?}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block_on, MockRadio};

    #[test]
    fn status_packets_carry_seq_and_airtime() {
        let mut link = Link::new(MockRadio::new(), 2);
        block_on(link.send_status(PacketType::Pin, 0xFE, 0xFFFE, Fingerprint(9), 0)).unwrap();
        block_on(link.send_status(PacketType::Heartbeat, 0xFE, 0xFFFF, Fingerprint(9), 10)).unwrap();

        let frames = link.radio().decoded();
        assert_eq!(frames.len(), 2);
        match (&frames[0], &frames[1]) {
            (Frame::Status(first), Frame::Status(second)) => {
                assert_eq!(first.seq, 1);
                assert_eq!(first.last_airtime, 0);
                assert_eq!(second.seq, 2);
                assert_eq!(second.header.from, 2);
                assert_eq!(second.header.kind, PacketType::Heartbeat);
                // mock reports 1500 µs per frame
                assert_eq!(second.last_airtime, 15);
                assert_eq!(second.airtime_total, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_send_is_not_accounted() {
        let mut radio = MockRadio::new();
        radio.fail_sends = true;
        let mut link = Link::new(radio, 1);
        let result = block_on(link.send_status(PacketType::Pin, 0xFE, 0, Fingerprint(1), 0));
        assert_eq!(result, Err(Error::Radio(RadioError::Bus)));
        assert_eq!(link.airtime().count(), 0);
    }
}
