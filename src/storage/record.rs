//! Byte layout of persisted identity records.
//!
//! The same record serves the transmitter's own identity and the
//! receiver's per-node `(address → name)` entries:
//!
//! ```text
//! [1 address][1 name_len][name_len bytes UTF-8]
//! ```

use crate::protocol::identity::{NodeIdentity, NodeName, NODE_NAME_MAX};

/// Largest encoded record.
pub const MAX_RECORD_LEN: usize = 2 + NODE_NAME_MAX;

/// Serialize to bytes for flash storage. Returns 0 if `buf` is too small.
pub fn serialize(identity: &NodeIdentity, buf: &mut [u8]) -> usize {
    let name = identity.name.as_str().as_bytes();
    let total = 2 + name.len();
    if buf.len() < total {
        return 0;
    }
    buf[0] = identity.address;
    buf[1] = name.len() as u8;
    buf[2..total].copy_from_slice(name);
    total
}

/// Deserialize from bytes. `None` when truncated or not UTF-8.
pub fn deserialize(data: &[u8]) -> Option<NodeIdentity> {
    if data.len() < 2 {
        return None;
    }
    let name_len = usize::from(data[1]);
    if name_len > NODE_NAME_MAX || data.len() < 2 + name_len {
        return None;
    }
    let name = core::str::from_utf8(&data[2..2 + name_len]).ok()?;
    Some(NodeIdentity {
        address: data[0],
        name: NodeName::new(name),
    })
}
