//! In-RAM identity store.

use super::{ErrorCode, ErrorLog, IdentityStore};
use crate::config::MAX_NODES;
use crate::error::StorageError;
use crate::protocol::identity::{node_index, NodeIdentity, NodeName};

/// Identity, node records and error log held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    identity: Option<NodeIdentity>,
    nodes: [Option<NodeName>; MAX_NODES],
    errors: ErrorLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&NodeIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: NodeIdentity) {
        self.identity = Some(identity);
    }

    pub fn node(&self, address: u8) -> Option<&NodeName> {
        self.nodes[node_index(address)?].as_ref()
    }

    /// Clear a node name. Returns `false` for addresses outside `1..=MAX_NODES`.
    pub fn clear_node(&mut self, address: u8) -> bool {
        match node_index(address) {
            Some(index) => {
                self.nodes[index] = None;
                true
            }
            None => false,
        }
    }

    /// Store a node name. Returns `false` for addresses outside `1..=MAX_NODES`.
    pub fn set_node(&mut self, address: u8, name: NodeName) -> bool {
        match node_index(address) {
            Some(index) => {
                self.nodes[index] = Some(name);
                true
            }
            None => false,
        }
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }
}

impl IdentityStore for MemoryStore {
    async fn load_identity(&mut self) -> Result<NodeIdentity, StorageError> {
        self.identity.clone().ok_or(StorageError::Missing)
    }

    async fn save_identity(&mut self, identity: &NodeIdentity) -> Result<(), StorageError> {
        self.set_identity(identity.clone());
        Ok(())
    }

    async fn load_node(&mut self, address: u8) -> Result<Option<NodeName>, StorageError> {
        Ok(self.node(address).cloned())
    }

    async fn save_node(&mut self, address: u8, name: &NodeName) -> Result<(), StorageError> {
        if self.set_node(address, name.clone()) {
            Ok(())
        } else {
            Err(StorageError::Write)
        }
    }

    async fn forget_node(&mut self, address: u8) -> Result<(), StorageError> {
        if self.clear_node(address) {
            Ok(())
        } else {
            Err(StorageError::Write)
        }
    }

    async fn record_error(&mut self, code: ErrorCode, now_ms: u64) {
        self.errors.record(code, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::load_identity_or_default;
    use crate::testing::block_on;

    #[test]
    fn missing_identity_falls_back_and_logs() {
        let mut store = MemoryStore::new();
        let id = block_on(load_identity_or_default(&mut store, 42));
        assert_eq!(id, NodeIdentity::default());
        let entry = store.errors().latest().copied();
        assert_eq!(entry.map(|e| e.code), Some(ErrorCode::ConfigMissing));
        assert_eq!(entry.map(|e| e.timestamp_ms), Some(42));
    }

    #[test]
    fn saved_identity_loads_back() {
        let mut store = MemoryStore::new();
        let id = NodeIdentity::new(2, "Left pad");
        block_on(store.save_identity(&id)).unwrap();
        assert_eq!(block_on(load_identity_or_default(&mut store, 0)), id);
        assert!(store.errors().is_empty());
    }

    #[test]
    fn node_records_are_bounded() {
        let mut store = MemoryStore::new();
        let name = NodeName::new("TX4");
        assert_eq!(block_on(store.save_node(4, &name)), Ok(()));
        assert_eq!(block_on(store.save_node(5, &name)), Err(StorageError::Write));

        assert_eq!(block_on(store.forget_node(4)), Ok(()));
        assert_eq!(block_on(store.load_node(4)), Ok(None));
        assert_eq!(block_on(store.forget_node(4)), Ok(()));
        assert_eq!(block_on(store.load_node(4)), Ok(Some(name)));
        assert_eq!(block_on(store.load_node(1)), Ok(None));
    }
}
