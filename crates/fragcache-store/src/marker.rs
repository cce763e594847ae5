//! Per-profile generation markers.
//!
//! A marker is an empty record whose modification time is the instant of
//! the profile's last invalidation. Entries stored strictly before that
//! instant are stale. Invalidating a profile is one marker write no matter
//! how many entries it holds.

use std::sync::Arc;
use std::time::SystemTime;

use fragcache_core::ProfileName;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::storage::{Location, Stamp, Storage};

/// Result of reading a profile's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRead {
    /// The marker timestamp.
    pub timestamp: SystemTime,
    /// True if the marker did not exist and was created by this read.
    pub created: bool,
}

/// Reads and bumps generation markers on a storage medium.
pub struct GenerationMarker {
    storage: Arc<dyn Storage>,
}

impl GenerationMarker {
    /// Creates a marker accessor over `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Returns the profile's marker timestamp, creating the marker at
    /// `now` if it does not exist.
    ///
    /// A marker without a usable timestamp is recreated the same way.
    /// Creation failures are logged and `now` is still returned, so the
    /// caller treats its entries as fresh.
    pub fn timestamp(&self, profile: &ProfileName, now: SystemTime) -> MarkerRead {
        let location = Location::marker(profile);

        match self.storage.stamp(&location) {
            Ok(Stamp::At(timestamp)) => {
                return MarkerRead {
                    timestamp,
                    created: false,
                };
            },
            Ok(Stamp::Missing) => {},
            Ok(Stamp::Unknown) => {
                debug!(profile = %profile, "Marker has no usable timestamp, recreating");
            },
            Err(e) => {
                debug!(profile = %profile, error = %e, "Failed to stat marker, recreating");
            },
        }

        if let Err(e) = self.storage.store(&location, &[], now) {
            warn!(profile = %profile, error = %e, "Failed to create generation marker");
        }

        MarkerRead {
            timestamp: now,
            created: true,
        }
    }

    /// Returns the marker timestamp without creating anything.
    pub fn peek(&self, profile: &ProfileName) -> Option<SystemTime> {
        match self.storage.stamp(&Location::marker(profile)) {
            Ok(Stamp::At(timestamp)) => Some(timestamp),
            _ => None,
        }
    }

    /// Moves the profile's marker to `now`, invalidating every entry
    /// stored before it.
    pub fn bump(&self, profile: &ProfileName, now: SystemTime) -> Result<(), StoreError> {
        self.storage.store(&Location::marker(profile), &[], now)
    }
}

impl std::fmt::Debug for GenerationMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationMarker")
            .field("storage", &self.storage.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn fixture() -> (Arc<MemoryStorage>, GenerationMarker, ProfileName) {
        let storage = Arc::new(MemoryStorage::new());
        let marker = GenerationMarker::new(storage.clone());
        (storage, marker, ProfileName::parse("Woo").unwrap())
    }

    #[test]
    fn test_first_read_creates_marker() {
        let (storage, marker, profile) = fixture();

        assert_eq!(marker.peek(&profile), None);
        assert_eq!(
            marker.timestamp(&profile, at(100)),
            MarkerRead {
                timestamp: at(100),
                created: true
            }
        );
        assert_eq!(storage.len(), 1);

        // Later reads see the original timestamp
        assert_eq!(
            marker.timestamp(&profile, at(500)),
            MarkerRead {
                timestamp: at(100),
                created: false
            }
        );
    }

    #[test]
    fn test_bump_moves_timestamp() {
        let (_, marker, profile) = fixture();
        marker.timestamp(&profile, at(100));

        marker.bump(&profile, at(160)).unwrap();

        assert_eq!(marker.peek(&profile), Some(at(160)));
    }

    #[test]
    fn test_bump_without_existing_marker() {
        let (_, marker, profile) = fixture();
        marker.bump(&profile, at(7)).unwrap();
        assert_eq!(marker.peek(&profile), Some(at(7)));
    }

    #[test]
    fn test_unknown_stamp_is_recreated() {
        let (storage, marker, profile) = fixture();
        marker.bump(&profile, at(10)).unwrap();
        storage.forget_stamp(&Location::marker(&profile));

        let read = marker.timestamp(&profile, at(90));
        assert!(read.created);
        assert_eq!(marker.peek(&profile), Some(at(90)));
    }

    #[test]
    fn test_creation_failure_still_returns_now() {
        let (storage, marker, profile) = fixture();
        storage.fail_writes(true);

        let read = marker.timestamp(&profile, at(42));
        assert_eq!(read.timestamp, at(42));
        assert!(read.created);
        assert!(storage.is_empty());
        assert!(marker.bump(&profile, at(43)).is_err());
    }
}
