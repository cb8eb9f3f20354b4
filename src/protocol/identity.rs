//! Node identity: address, display name and the per-boot fingerprint.

use core::fmt::{self, Write};

use crate::config::{DEFAULT_NODE_ADDRESS, DEFAULT_NODE_NAME, MAX_NODES};
use heapless::String;
use rand_core::RngCore;

/// Longest name in bytes.
pub const NODE_NAME_MAX: usize = 15;

/// Size of the nul-padded name field on the wire.
pub const NODE_NAME_WIRE_LEN: usize = NODE_NAME_MAX + 1;

/// Address an unassigned (ephemeral) transmitter sends from.
pub const UNASSIGNED: u8 = 0;

/// Registry slot of a node address, `None` outside `1..=MAX_NODES`.
pub fn node_index(address: u8) -> Option<usize> {
    let address = usize::from(address);
    (1..=MAX_NODES).contains(&address).then(|| address - 1)
}

/// Next address when cycling through `1..=MAX_NODES`.
pub fn next_address(address: u8) -> u8 {
    match node_index(address) {
        Some(index) if index + 1 < MAX_NODES => address + 1,
        _ => 1,
    }
}

/// Display name, at most 15 bytes of UTF-8.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeName(String<NODE_NAME_MAX>);

impl NodeName {
    /// Copy `text`, truncating on a character boundary.
    pub fn new(text: &str) -> Self {
        let mut name = String::new();
        for c in text.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        Self(name)
    }

    /// `"TX<n>"`, the name handed out when a request carries none.
    pub fn auto(address: u8) -> Self {
        let mut name = String::new();
        let _ = write!(name, "TX{}", address);
        Self(name)
    }

    /// Decode a nul-padded wire field. Invalid UTF-8 ends the name.
    pub fn from_wire(field: &[u8]) -> Self {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let bytes = &field[..end];
        let text = match core::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        };
        Self::new(text)
    }

    /// Encode into the nul-padded wire field.
    pub fn to_wire(&self) -> [u8; NODE_NAME_WIRE_LEN] {
        let mut field = [0u8; NODE_NAME_WIRE_LEN];
        let bytes = self.0.as_bytes();
        field[..bytes.len()].copy_from_slice(bytes);
        field
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random per-boot tag that lets the receiver address an unassigned node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fingerprint(pub u16);

impl Fingerprint {
    /// Marker for registry entries restored from storage; never generated.
    pub const UNKNOWN: Self = Self(0);

    /// Draw a fingerprint in `1..=65534`.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let value = (rng.next_u32() & 0xFFFF) as u16;
            if value != 0 && value != u16::MAX {
                return Self(value);
            }
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Who this transmitter is. Address 0 means unassigned.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeIdentity {
    pub address: u8,
    pub name: NodeName,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            address: DEFAULT_NODE_ADDRESS,
            name: NodeName::new(DEFAULT_NODE_NAME),
        }
    }
}

impl NodeIdentity {
    pub fn new(address: u8, name: &str) -> Self {
        Self {
            address,
            name: NodeName::new(name),
        }
    }

    /// `true` when the address is a valid node address.
    pub fn is_assigned(&self) -> bool {
        node_index(self.address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sequence(&'static [u32], usize);

    impl RngCore for Sequence {
        fn next_u32(&mut self) -> u32 {
            let v = self.0[self.1 % self.0.len()];
            self.1 += 1;
            v
        }
        fn next_u64(&mut self) -> u64 {
            u64::from(self.next_u32())
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest {
                *b = self.next_u32() as u8;
            }
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn name_truncates_on_char_boundary() {
        let name = NodeName::new("Kitchen Controller");
        assert_eq!(name.as_str(), "Kitchen Control");

        // 'é' is two bytes; the 15-byte limit falls inside the 8th one.
        let name = NodeName::new("ééééééééé");
        assert_eq!(name.as_str().len(), 14);
    }

    #[test]
    fn name_wire_field_is_nul_padded() {
        let field = NodeName::new("TX2").to_wire();
        assert_eq!(&field[..4], b"TX2\0");
        assert!(field[3..].iter().all(|&b| b == 0));
        assert_eq!(NodeName::from_wire(&field).as_str(), "TX2");
    }

    #[test]
    fn name_from_wire_without_terminator_is_capped() {
        let field = [b'a'; NODE_NAME_WIRE_LEN];
        assert_eq!(NodeName::from_wire(&field).as_str().len(), NODE_NAME_MAX);
    }

    #[test]
    fn name_from_wire_stops_at_invalid_utf8() {
        let mut field = [0u8; NODE_NAME_WIRE_LEN];
        field[..4].copy_from_slice(&[b'o', b'k', 0xFF, b'x']);
        assert_eq!(NodeName::from_wire(&field).as_str(), "ok");
    }

    #[test]
    fn auto_name() {
        assert_eq!(NodeName::auto(3).as_str(), "TX3");
    }

    #[test]
    fn fingerprint_skips_reserved_values() {
        let mut rng = Sequence(&[0x0001_0000, 0xFFFF, 0x1234_BEEF], 0);
        assert_eq!(Fingerprint::generate(&mut rng), Fingerprint(0xBEEF));
    }

    #[test]
    fn address_helpers() {
        assert_eq!(node_index(0), None);
        assert_eq!(node_index(1), Some(0));
        assert_eq!(node_index(MAX_NODES as u8), Some(MAX_NODES - 1));
        assert_eq!(node_index(MAX_NODES as u8 + 1), None);
        assert_eq!(next_address(0), 1);
        assert_eq!(next_address(1), 2);
        assert_eq!(next_address(MAX_NODES as u8), 1);
    }

    #[test]
    fn default_identity_is_unassigned() {
        let id = NodeIdentity::default();
        assert!(!id.is_assigned());
        assert_eq!(id.name.as_str(), "Default Node");
    }
}
