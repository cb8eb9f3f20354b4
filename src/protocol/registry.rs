//! Receiver-side table of known transmitters and the assignment checks.
//!
//! Slot `n - 1` belongs to address `n` once assigned. Unassigned
//! transmitters discovered through advertisements park in any free slot
//! until they request an address.

use super::identity::{node_index, Fingerprint, NodeName};
use super::wire::{Assignment, NackReason};
use crate::config::MAX_NODES;
use log::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeEntry {
    pub fingerprint: Fingerprint,
    /// Assigned address, 0 while unassigned.
    pub node_id: u8,
    pub name: NodeName,
    pub last_rssi: i16,
    pub last_seen_ms: u64,
    pub assigned: bool,
}

/// Result of checking an assign request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Grant {
    pub fingerprint: Fingerprint,
    pub address: u8,
    pub name: NodeName,
}

#[derive(Clone, Debug, Default)]
pub struct NodeRegistry {
    slots: [Option<NodeEntry>; MAX_NODES],
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> impl Iterator<Item = &NodeEntry> {
        self.slots.iter().flatten()
    }

    pub fn slot(&self, index: usize) -> Option<&NodeEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Entry currently holding `address`.
    pub fn holder_of(&self, address: u8) -> Option<&NodeEntry> {
        let index = node_index(address)?;
        self.slot(index)
            .filter(|entry| entry.assigned && entry.node_id == address)
    }

    pub fn find(&self, fingerprint: Fingerprint) -> Option<&NodeEntry> {
        self.entries().find(|entry| entry.fingerprint == fingerprint)
    }

    /// Re-create an assigned entry from a stored node record.
    pub fn restore(&mut self, address: u8, name: NodeName) {
        let Some(index) = node_index(address) else {
            return;
        };
        debug!("restored node {} ({})", address, name);
        self.slots[index] = Some(NodeEntry {
            fingerprint: Fingerprint::UNKNOWN,
            node_id: address,
            name,
            last_rssi: 0,
            last_seen_ms: 0,
            assigned: true,
        });
    }

    /// Note an advertisement. Refreshes a known fingerprint, otherwise
    /// parks it in the first free slot. Returns `false` when it was dropped.
    pub fn observe_advertisement(&mut self, fingerprint: Fingerprint, rssi: i16, now_ms: u64) -> bool {
        if fingerprint == Fingerprint::UNKNOWN {
            return false;
        }
        if let Some(entry) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|entry| entry.fingerprint == fingerprint)
        {
            entry.last_rssi = rssi;
            entry.last_seen_ms = now_ms;
            return true;
        }
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                info!("discovered node {}", fingerprint);
                *slot = Some(NodeEntry {
                    fingerprint,
                    node_id: 0,
                    name: NodeName::default(),
                    last_rssi: rssi,
                    last_seen_ms: now_ms,
                    assigned: false,
                });
                true
            }
            None => {
                debug!("registry full, dropping advertisement from {}", fingerprint);
                false
            }
        }
    }

    /// Check a request without changing anything.
    ///
    /// Order: address range and a real fingerprint, ownership by another
    /// fingerprint, then the name. An empty name becomes `TX<n>` when
    /// `auto_name` is set.
    pub fn validate(&self, request: &Assignment, auto_name: bool) -> Result<Grant, NackReason> {
        if node_index(request.address).is_none() || request.fingerprint == Fingerprint::UNKNOWN {
            return Err(NackReason::Malformed);
        }
        if let Some(holder) = self.holder_of(request.address) {
            if holder.fingerprint != request.fingerprint {
                return Err(NackReason::InUse);
            }
        }
        let name = if !request.name.is_empty() {
            request.name.clone()
        } else if auto_name {
            NodeName::auto(request.address)
        } else {
            return Err(NackReason::NameRequired);
        };
        Ok(Grant {
            fingerprint: request.fingerprint,
            address: request.address,
            name,
        })
    }

    /// Install a granted (and persisted) assignment.
    /// Any other entry of the same fingerprint is dropped. Returns the
    /// address the node held before, if it moved.
    pub fn install(&mut self, grant: &Grant, rssi: i16, now_ms: u64) -> Option<u8> {
        let index = node_index(grant.address)?;
        let mut vacated = None;
        for (n, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot.as_ref() else {
                continue;
            };
            if n == index || entry.fingerprint != grant.fingerprint {
                continue;
            }
            if entry.assigned {
                info!("node {} released by {}", entry.node_id, grant.fingerprint);
                vacated = Some(entry.node_id);
            }
            *slot = None;
        }
        info!("node {} assigned to {} ({})", grant.address, grant.fingerprint, grant.name);
        self.slots[index] = Some(NodeEntry {
            fingerprint: grant.fingerprint,
            node_id: grant.address,
            name: grant.name.clone(),
            last_rssi: rssi,
            last_seen_ms: now_ms,
            assigned: true,
        });
        vacated
    }

    /// A status packet arrived from `address`.
    pub fn touch(&mut self, address: u8, rssi: i16, now_ms: u64) {
        let Some(index) = node_index(address) else {
            return;
        };
        if let Some(entry) = self.slots[index].as_mut().filter(|e| e.node_id == address) {
            entry.last_rssi = rssi;
            entry.last_seen_ms = now_ms;
        }
    }
}
