//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::RwLock;

use super::{Location, Stamp, Storage};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Record {
    bytes: Vec<u8>,
    modified: Option<SystemTime>,
}

/// Counts of calls made against a [`MemoryStorage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// Calls to `stamp`.
    pub stamps: u64,
    /// Calls to `load`.
    pub loads: u64,
    /// Calls to `store`, including failed ones.
    pub stores: u64,
}

impl OperationCounts {
    /// Total number of calls.
    pub fn total(&self) -> u64 {
        self.stamps + self.loads + self.stores
    }
}

/// Keeps records in process memory.
///
/// Useful for tests and for hosts that only want per-process caching.
/// Operation counters and write-failure injection make the engine's
/// storage access observable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<Location, Record>>,
    stamps: AtomicU64,
    loads: AtomicU64,
    stores: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records held, markers included.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many times each operation was called.
    pub fn operations(&self) -> OperationCounts {
        OperationCounts {
            stamps: self.stamps.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }

    /// Makes every subsequent `store` fail until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Drops the modification time of a record, as a medium that lost
    /// its metadata would.
    pub fn forget_stamp(&self, location: &Location) {
        if let Some(record) = self.records.write().get_mut(location) {
            record.modified = None;
        }
    }

    /// Replaces the stored bytes without touching the modification time.
    pub fn overwrite_bytes(&self, location: &Location, bytes: &[u8]) {
        if let Some(record) = self.records.write().get_mut(location) {
            record.bytes = bytes.to_vec();
        }
    }
}

impl Storage for MemoryStorage {
    fn stamp(&self, location: &Location) -> Result<Stamp, StoreError> {
        self.stamps.fetch_add(1, Ordering::Relaxed);
        Ok(match self.records.read().get(location) {
            None => Stamp::Missing,
            Some(Record {
                modified: Some(at), ..
            }) => Stamp::At(*at),
            Some(_) => Stamp::Unknown,
        })
    }

    fn load(&self, location: &Location) -> Result<Option<Vec<u8>>, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().get(location).map(|r| r.bytes.clone()))
    }

    fn store(
        &self,
        location: &Location,
        bytes: &[u8],
        modified: SystemTime,
    ) -> Result<(), StoreError> {
        self.stores.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::unavailable("writes disabled"));
        }

        self.records.write().insert(
            location.clone(),
            Record {
                bytes: bytes.to_vec(),
                modified: Some(modified),
            },
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragcache_core::{ProfileName, validate_key};

    fn location() -> Location {
        Location::entry(
            &ProfileName::parse("p").unwrap(),
            &validate_key("k").unwrap(),
        )
    }

    #[test]
    fn test_counts_operations() {
        let storage = MemoryStorage::new();
        let loc = location();

        storage.stamp(&loc).unwrap();
        storage.load(&loc).unwrap();
        storage.store(&loc, b"1", SystemTime::UNIX_EPOCH).unwrap();

        assert_eq!(
            storage.operations(),
            OperationCounts {
                stamps: 1,
                loads: 1,
                stores: 1
            }
        );
        assert_eq!(storage.operations().total(), 3);
    }

    #[test]
    fn test_fail_writes() {
        let storage = MemoryStorage::new();
        storage.fail_writes(true);

        assert!(storage.store(&location(), b"1", SystemTime::now()).is_err());
        assert!(storage.is_empty());

        storage.fail_writes(false);
        assert!(storage.store(&location(), b"1", SystemTime::now()).is_ok());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_forget_stamp() {
        let storage = MemoryStorage::new();
        let loc = location();
        storage.store(&loc, b"1", SystemTime::now()).unwrap();

        storage.forget_stamp(&loc);
        assert_eq!(storage.stamp(&loc).unwrap(), Stamp::Unknown);
    }

    #[test]
    fn test_overwrite_keeps_stamp() {
        let storage = MemoryStorage::new();
        let loc = location();
        storage.store(&loc, b"1", SystemTime::UNIX_EPOCH).unwrap();

        storage.overwrite_bytes(&loc, b"garbage");
        assert_eq!(storage.load(&loc).unwrap(), Some(b"garbage".to_vec()));
        assert_eq!(
            storage.stamp(&loc).unwrap(),
            Stamp::At(SystemTime::UNIX_EPOCH)
        );
    }
}
