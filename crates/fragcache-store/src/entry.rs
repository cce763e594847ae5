//! Entry store: single-record reads and writes.
//!
//! Payloads are serialized with `serde_json` and written as-is, with no
//! framing or embedded timestamp. A record's age is whatever the medium
//! reports as its modification time. The entry store knows nothing about
//! TTLs or generation markers.

use std::sync::Arc;
use std::time::SystemTime;

use fragcache_core::{ProfileName, ValidKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::StoreError;
use crate::health::WriteHealth;
use crate::storage::{Location, Stamp, Storage};

/// Result of reading one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// The entry exists and decodes.
    Found {
        /// The decoded payload.
        payload: T,
        /// The medium's modification time, `None` when it has no usable
        /// time.
        stored_at: Option<SystemTime>,
    },
    /// Nothing is stored for the key.
    NotFound,
    /// Something is stored but cannot be read back as `T`.
    Corrupt {
        /// As for [`ReadOutcome::Found`].
        stored_at: Option<SystemTime>,
    },
}

impl<T> ReadOutcome<T> {
    /// Returns the stored time of an existing entry, decodable or not.
    pub fn stored_at(&self) -> Option<SystemTime> {
        match self {
            Self::Found { stored_at, .. } | Self::Corrupt { stored_at } => *stored_at,
            Self::NotFound => None,
        }
    }
}

/// Reads and writes cache entries on a storage medium.
pub struct EntryStore {
    storage: Arc<dyn Storage>,
    health: WriteHealth,
}

impl EntryStore {
    /// Creates an entry store over `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            health: WriteHealth::new(),
        }
    }

    /// Returns the write health tracker.
    pub fn health(&self) -> &WriteHealth {
        &self.health
    }

    /// Returns the modification stamp of an entry.
    ///
    /// A medium error is reported as [`Stamp::Unknown`]: the record might
    /// exist, but its age cannot be trusted.
    pub fn stamp(&self, profile: &ProfileName, key: &ValidKey) -> Stamp {
        let location = Location::entry(profile, key);
        self.storage.stamp(&location).unwrap_or_else(|e| {
            debug!(location = %location, error = %e, "Failed to stat cache entry");
            Stamp::Unknown
        })
    }

    // None if absent, unreadable or not valid JSON for `T`
    fn decode<T: DeserializeOwned>(&self, profile: &ProfileName, key: &ValidKey) -> Option<T> {
        let location = Location::entry(profile, key);
        let bytes = match self.storage.load(&location) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                debug!(location = %location, error = %e, "Failed to load cache entry");
                return None;
            },
        };

        match serde_json::from_slice(&bytes) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(location = %location, error = %e, "Failed to decode cache entry");
                None
            },
        }
    }

    /// Reads an entry with its stamp.
    ///
    /// An entry whose stamp is known to be missing is not loaded at all.
    pub fn read<T: DeserializeOwned>(&self, profile: &ProfileName, key: &ValidKey) -> ReadOutcome<T> {
        let stored_at = match self.stamp(profile, key) {
            Stamp::Missing => return ReadOutcome::NotFound,
            Stamp::At(at) => Some(at),
            Stamp::Unknown => None,
        };

        match self.decode(profile, key) {
            Some(payload) => ReadOutcome::Found { payload, stored_at },
            None => ReadOutcome::Corrupt { stored_at },
        }
    }

    /// Serializes and writes an entry, stamping it with `at`.
    ///
    /// The outcome is recorded in [`EntryStore::health`].
    pub fn write<T: Serialize + ?Sized>(
        &self,
        profile: &ProfileName,
        key: &ValidKey,
        payload: &T,
        at: SystemTime,
    ) -> Result<(), StoreError> {
        let result = serde_json::to_vec(payload)
            .map_err(StoreError::from)
            .and_then(|bytes| {
                self.storage
                    .store(&Location::entry(profile, key), &bytes, at)
            });

        match &result {
            Ok(()) => self.health.record_success(),
            Err(e) => self.health.record_failure(e.to_string()),
        }

        result
    }
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("storage", &self.storage.name())
            .field("healthy", &self.health.is_healthy())
            .finish()
    }
}
