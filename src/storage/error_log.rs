//! Bounded error log with sticky retention.
//!
//! Sticky entries (storage faults) survive rotation; when the log is full
//! the oldest non-sticky entry makes room. A full log of sticky entries
//! only accepts another sticky entry, which replaces the oldest one.

use crate::config::ERROR_LOG_CAPACITY;
use heapless::Vec;

/// Fixed error code table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ErrorCode {
    SaveFail = 101,
    LoadFail = 102,
    FsMountFail = 103,
    ConfigMissing = 104,
    ParseFail = 203,
    AssignDenied = 204,
    Unknown = 999,
}

impl ErrorCode {
    /// Unknown numbers map to [`ErrorCode::Unknown`].
    pub fn from_code(code: u16) -> Self {
        match code {
            101 => ErrorCode::SaveFail,
            102 => ErrorCode::LoadFail,
            103 => ErrorCode::FsMountFail,
            104 => ErrorCode::ConfigMissing,
            203 => ErrorCode::ParseFail,
            204 => ErrorCode::AssignDenied,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::SaveFail => "SAVE FAIL",
            ErrorCode::LoadFail => "LOAD FAIL",
            ErrorCode::FsMountFail => "FS MOUNT FAIL",
            ErrorCode::ConfigMissing => "CONFIG MISSING",
            ErrorCode::ParseFail => "PARSE FAIL",
            ErrorCode::AssignDenied => "ASSIGN DENIED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    pub fn is_sticky(self) -> bool {
        matches!(
            self,
            ErrorCode::SaveFail | ErrorCode::LoadFail | ErrorCode::FsMountFail
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorEntry {
    pub code: ErrorCode,
    pub timestamp_ms: u64,
}

impl ErrorEntry {
    pub fn message(&self) -> &'static str {
        self.code.message()
    }

    pub fn is_sticky(&self) -> bool {
        self.code.is_sticky()
    }
}

/// Serialized size of one entry: code u16 + timestamp u64.
const ENTRY_LEN: usize = 10;

/// Serialized size of a full log.
pub const ERROR_LOG_BYTES: usize = 1 + ERROR_LOG_CAPACITY * ENTRY_LEN;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry, ERROR_LOG_CAPACITY>,
}

impl ErrorLog {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry, rotating per the sticky policy.
    /// Returns `false` if the entry was dropped.
    pub fn record(&mut self, code: ErrorCode, timestamp_ms: u64) -> bool {
        if self.entries.is_full() {
            match self.entries.iter().position(|e| !e.is_sticky()) {
                Some(index) => {
                    self.entries.remove(index);
                }
                None if code.is_sticky() => {
                    self.entries.remove(0);
                }
                None => return false,
            }
        }
        self.entries
            .push(ErrorEntry { code, timestamp_ms })
            .is_ok()
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ErrorEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format: `[count][code u16 LE][timestamp u64 LE]...`
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let total = 1 + self.entries.len() * ENTRY_LEN;
        if buf.len() < total {
            return 0;
        }
        buf[0] = self.entries.len() as u8;
        for (entry, chunk) in self.entries.iter().zip(buf[1..total].chunks_exact_mut(ENTRY_LEN)) {
            chunk[..2].copy_from_slice(&entry.code.code().to_le_bytes());
            chunk[2..].copy_from_slice(&entry.timestamp_ms.to_le_bytes());
        }
        total
    }

    /// Inverse of [`ErrorLog::serialize`]. Truncated input yields `None`.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        let (&count, body) = data.split_first()?;
        let count = usize::from(count).min(ERROR_LOG_CAPACITY);
        if body.len() < count * ENTRY_LEN {
            return None;
        }
        let mut log = Self::new();
        for chunk in body.chunks_exact(ENTRY_LEN).take(count) {
            let code = ErrorCode::from_code(u16::from_le_bytes([chunk[0], chunk[1]]));
            let mut ts = [0u8; 8];
            ts.copy_from_slice(&chunk[2..]);
            let _ = log.entries.push(ErrorEntry {
                code,
                timestamp_ms: u64::from_le_bytes(ts),
            });
        }
        Some(log)
    }
}
