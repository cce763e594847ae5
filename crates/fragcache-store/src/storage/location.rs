//! Addresses of records inside a storage medium.

use std::fmt;

use fragcache_core::{ProfileName, ValidKey};

/// What a [`Location`] points at within a profile namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A cache entry.
    Entry(ValidKey),
    /// The profile's zero-length generation marker record.
    Marker,
}

/// A record address derived from `(profile, key)`.
///
/// The mapping is 1:1: two locations are equal exactly when they name the
/// same profile and the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    profile: ProfileName,
    slot: Slot,
}

impl Location {
    /// Location of the entry `key` in `profile`.
    pub fn entry(profile: &ProfileName, key: &ValidKey) -> Self {
        Self {
            profile: profile.clone(),
            slot: Slot::Entry(key.clone()),
        }
    }

    /// Location of the generation marker of `profile`.
    pub fn marker(profile: &ProfileName) -> Self {
        Self {
            profile: profile.clone(),
            slot: Slot::Marker,
        }
    }

    /// Returns the owning profile.
    pub fn profile(&self) -> &ProfileName {
        &self.profile
    }

    /// Returns the slot within the profile.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Returns true if this is a generation marker location.
    pub fn is_marker(&self) -> bool {
        matches!(self.slot, Slot::Marker)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Slot::Entry(key) => write!(f, "\"{}\" / {}", self.profile, key),
            Slot::Marker => write!(f, "\"{}\" / <marker>", self.profile),
        }
    }
}
