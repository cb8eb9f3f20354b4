//! Identity persistence in the nRF52840's internal flash.
//!
//! Uses the `sequential-storage` key-value map over the last
//! [`STORAGE_FLASH_PAGE_COUNT`] pages; wear levelling and garbage
//! collection are left to the crate.
//!
//! Storage layout (one map item per key):
//!   - `0x01`: own identity record (transmitter)
//!   - `0x02`: error log
//!   - `0x10 + n`: name record of node `n` (receiver); an empty value
//!     marks a forgotten node
//!
//! Every value read or written also lands in a [`MemoryStore`] cache that
//! the UI can look at without touching flash.

use core::ops::Range;

use super::{record, ErrorCode, ErrorLog, IdentityStore, MemoryStore};
use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::error::StorageError;
use crate::protocol::identity::{NodeIdentity, NodeName};
use defmt::{debug, error, info, warn};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

const KEY_IDENTITY: u8 = 0x01;
const KEY_ERROR_LOG: u8 = 0x02;
const KEY_NODE_BASE: u8 = 0x10;

/// Scratch for one map item including the crate's framing.
const ITEM_BUFFER: usize = 128;

pub struct FlashStore<F> {
    flash: F,
    cache: MemoryStore,
}

impl<F: NorFlash> FlashStore<F> {
    /// Open the store and pull in the persisted error log.
    pub async fn mount(flash: F, now_ms: u64) -> Self {
        let mut store = Self {
            flash,
            cache: MemoryStore::new(),
        };
        let mut buf = [0u8; ITEM_BUFFER];
        match fetch_item::<u8, &[u8], _>(
            &mut store.flash,
            range(),
            &mut NoCache::new(),
            &mut buf,
            &KEY_ERROR_LOG,
        )
        .await
        {
            Ok(Some(data)) => match ErrorLog::deserialize(data) {
                Some(log) => {
                    info!("Loaded {} error log entries", log.len());
                    *store.cache.errors_mut() = log;
                }
                None => warn!("Error log unreadable, starting empty"),
            },
            Ok(None) => debug!("No error log in flash"),
            Err(e) => {
                error!("Flash mount error: {:?}", defmt::Debug2Format(&e));
                store.cache.errors_mut().record(ErrorCode::FsMountFail, now_ms);
            }
        }
        store
    }

    /// Values seen so far.
    pub fn cache(&self) -> &MemoryStore {
        &self.cache
    }

    async fn fetch_record(&mut self, key: u8) -> Result<NodeIdentity, StorageError> {
        let mut buf = [0u8; ITEM_BUFFER];
        match fetch_item::<u8, &[u8], _>(&mut self.flash, range(), &mut NoCache::new(), &mut buf, &key).await {
            Ok(Some([])) => Err(StorageError::Missing),
            Ok(Some(data)) => record::deserialize(data).ok_or(StorageError::Corrupt),
            Ok(None) => Err(StorageError::Missing),
            Err(e) => {
                error!("Flash read error: {:?}", defmt::Debug2Format(&e));
                Err(StorageError::Read)
            }
        }
    }

    async fn store_bytes(&mut self, key: u8, item: &[u8]) -> Result<(), StorageError> {
        let mut buf = [0u8; ITEM_BUFFER];
        store_item::<u8, &[u8], _>(&mut self.flash, range(), &mut NoCache::new(), &mut buf, &key, &item)
            .await
            .map_err(|e| {
                error!("Flash write error: {:?}", defmt::Debug2Format(&e));
                StorageError::Write
            })
    }

    async fn store_record(&mut self, key: u8, identity: &NodeIdentity) -> Result<(), StorageError> {
        let mut data = [0u8; record::MAX_RECORD_LEN];
        let len = record::serialize(identity, &mut data);
        self.store_bytes(key, &data[..len]).await
    }
}

fn range() -> Range<u32> {
    STORAGE_START..STORAGE_END
}

impl<F: NorFlash> IdentityStore for FlashStore<F> {
    async fn load_identity(&mut self) -> Result<NodeIdentity, StorageError> {
        let identity = self.fetch_record(KEY_IDENTITY).await?;
        info!("Loaded identity: address {}", identity.address);
        self.cache.set_identity(identity.clone());
        Ok(identity)
    }

    async fn save_identity(&mut self, identity: &NodeIdentity) -> Result<(), StorageError> {
        self.store_record(KEY_IDENTITY, identity).await?;
        info!("Saved identity: address {}", identity.address);
        self.cache.set_identity(identity.clone());
        Ok(())
    }

    async fn load_node(&mut self, address: u8) -> Result<Option<NodeName>, StorageError> {
        match self.fetch_record(KEY_NODE_BASE + address).await {
            Ok(stored) if stored.address == address => {
                self.cache.set_node(address, stored.name.clone());
                Ok(Some(stored.name))
            }
            Ok(_) => Err(StorageError::Corrupt),
            Err(StorageError::Missing) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_node(&mut self, address: u8, name: &NodeName) -> Result<(), StorageError> {
        if !self.cache.set_node(address, name.clone()) {
            return Err(StorageError::Write);
        }
        let stored = NodeIdentity {
            address,
            name: name.clone(),
        };
        self.store_record(KEY_NODE_BASE + address, &stored).await
    }

    async fn forget_node(&mut self, address: u8) -> Result<(), StorageError> {
        if !self.cache.clear_node(address) {
            return Err(StorageError::Write);
        }
        self.store_bytes(KEY_NODE_BASE + address, &[]).await?;
        info!("Forgot node {}", address);
        Ok(())
    }

    async fn record_error(&mut self, code: ErrorCode, now_ms: u64) {
        if !self.cache.errors_mut().record(code, now_ms) {
            return;
        }
        let mut data = [0u8; super::error_log::ERROR_LOG_BYTES];
        let len = self.cache.errors().serialize(&mut data);
        // a failing log write has nowhere else to go
        let _ = self.store_bytes(KEY_ERROR_LOG, &data[..len]).await;
    }
}
