//! Storage medium trait definition.

use std::time::SystemTime;

use super::Location;
use crate::error::StoreError;

/// What the medium knows about a location's modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// Nothing is stored at the location.
    Missing,
    /// A record exists and was last modified at the given instant.
    At(SystemTime),
    /// A record exists but its modification time cannot be trusted.
    Unknown,
}

impl Stamp {
    /// Returns true if a record exists at the location.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// A medium that can hold cache records.
///
/// This trait abstracts over different storage media (a directory tree,
/// process memory, an embedded database) so the engine can cache without
/// knowing where bytes end up. The engine derives freshness exclusively
/// from [`Storage::stamp`]: nothing about time is stored inside a record.
///
/// # Implementors
///
/// - `FsStorage` - one directory per profile, one file per record
/// - `MemoryStorage` - records held in process memory
///
/// # Example
///
/// ```ignore
/// use fragcache_store::{Location, Stamp, Storage, StoreError};
///
/// struct NullStorage;
///
/// impl Storage for NullStorage {
///     fn stamp(&self, _: &Location) -> Result<Stamp, StoreError> {
///         Ok(Stamp::Missing)
///     }
///
///     fn load(&self, _: &Location) -> Result<Option<Vec<u8>>, StoreError> {
///         Ok(None)
///     }
///
///     fn store(&self, _: &Location, _: &[u8], _: SystemTime) -> Result<(), StoreError> {
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "null"
///     }
/// }
/// ```
pub trait Storage: Send + Sync {
    /// Returns the modification stamp of a location.
    ///
    /// # Errors
    ///
    /// Implementations should report a missing record as `Ok(Stamp::Missing)`
    /// and keep errors for media failures.
    fn stamp(&self, location: &Location) -> Result<Stamp, StoreError>;

    /// Loads the bytes stored at a location, or `None` if nothing is there.
    fn load(&self, location: &Location) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the record at a location and sets its modification time.
    ///
    /// The profile namespace must be created on demand. The modification
    /// time must become `modified` even when `bytes` equal what is already
    /// stored, since some media skip writes that do not change content.
    fn store(&self, location: &Location, bytes: &[u8], modified: SystemTime)
    -> Result<(), StoreError>;

    /// Returns the name of this medium.
    ///
    /// This is used for logging and identification purposes.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragcache_core::ProfileName;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct MockStorage {
        records: Mutex<HashMap<Location, (Vec<u8>, SystemTime)>>,
    }

    impl Storage for MockStorage {
        fn stamp(&self, location: &Location) -> Result<Stamp, StoreError> {
            Ok(self
                .records
                .lock()
                .get(location)
                .map_or(Stamp::Missing, |(_, at)| Stamp::At(*at)))
        }

        fn load(&self, location: &Location) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.records.lock().get(location).map(|(b, _)| b.clone()))
        }

        fn store(
            &self,
            location: &Location,
            bytes: &[u8],
            modified: SystemTime,
        ) -> Result<(), StoreError> {
            self.records
                .lock()
                .insert(location.clone(), (bytes.to_vec(), modified));
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_mock_storage_round_trip() {
        let storage = MockStorage {
            records: Mutex::new(HashMap::new()),
        };
        let marker = Location::marker(&ProfileName::parse("p").unwrap());

        assert_eq!(storage.stamp(&marker).unwrap(), Stamp::Missing);

        storage
            .store(&marker, b"", SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(
            storage.stamp(&marker).unwrap(),
            Stamp::At(SystemTime::UNIX_EPOCH)
        );
        assert_eq!(storage.load(&marker).unwrap(), Some(Vec::new()));
        assert_eq!(storage.name(), "mock");
    }

    #[test]
    fn test_stamp_exists() {
        assert!(!Stamp::Missing.exists());
        assert!(Stamp::Unknown.exists());
        assert!(Stamp::At(SystemTime::UNIX_EPOCH).exists());
    }
}
