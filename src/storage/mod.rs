//! Persistent identity, node records and the error log.
//!
//! The protocol code talks to storage through [`IdentityStore`]. On target
//! the store is backed by `sequential-storage` in internal flash
//! (`flash::FlashStore`); [`MemoryStore`] is the in-RAM cache it keeps and
//! the store used by host tests.
//!
//! Loading never fails outright: a missing or unreadable identity falls
//! back to [`NodeIdentity::default`] and the fault is recorded in the
//! error log.

pub mod error_log;
#[cfg(feature = "embedded")]
pub mod flash;
pub mod memory;
pub mod record;

use core::future::Future;

use crate::error::StorageError;
use crate::protocol::identity::{NodeIdentity, NodeName};
use log::warn;

pub use error_log::{ErrorCode, ErrorEntry, ErrorLog};
pub use memory::MemoryStore;

/// Durable home of node identity data.
pub trait IdentityStore {
    /// This transmitter's identity. `Err(Missing)` if never saved.
    fn load_identity(&mut self) -> impl Future<Output = Result<NodeIdentity, StorageError>>;

    fn save_identity(
        &mut self,
        identity: &NodeIdentity,
    ) -> impl Future<Output = Result<(), StorageError>>;

    /// Receiver side: name stored for `address`, if any.
    fn load_node(
        &mut self,
        address: u8,
    ) -> impl Future<Output = Result<Option<NodeName>, StorageError>>;

    fn save_node(
        &mut self,
        address: u8,
        name: &NodeName,
    ) -> impl Future<Output = Result<(), StorageError>>;

    /// Drop the record for `address`. Forgetting an absent record is `Ok`.
    fn forget_node(&mut self, address: u8) -> impl Future<Output = Result<(), StorageError>>;

    /// Append to the error log. Failures to persist the log are swallowed.
    fn record_error(&mut self, code: ErrorCode, now_ms: u64) -> impl Future<Output = ()>;
}

/// Load the identity, falling back to defaults and logging why.
pub async fn load_identity_or_default<S: IdentityStore>(store: &mut S, now_ms: u64) -> NodeIdentity {
    let code = match store.load_identity().await {
        Ok(identity) => return identity,
        Err(StorageError::Missing) => ErrorCode::ConfigMissing,
        Err(StorageError::Corrupt) => ErrorCode::ParseFail,
        Err(_) => ErrorCode::LoadFail,
    };
    warn!("identity unavailable ({}), using defaults", code.message());
    store.record_error(code, now_ms).await;
    NodeIdentity::default()
}
