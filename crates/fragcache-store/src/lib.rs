//! # Fragcache Store
//!
//! Persistence layer for the fragcache engine.
//!
//! This crate owns everything that touches a storage medium: the
//! [`Storage`] trait and its filesystem and in-memory implementations, the
//! [`EntryStore`] that reads and writes serialized payloads, and the
//! [`GenerationMarker`] that makes whole-profile invalidation a single
//! write.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::SystemTime;
//! use fragcache_core::{ProfileName, validate_key};
//! use fragcache_store::{EntryStore, FsStorage, GenerationMarker};
//!
//! let storage = Arc::new(FsStorage::new("/var/cache/fragcache"));
//! let entries = EntryStore::new(storage.clone());
//! let markers = GenerationMarker::new(storage);
//!
//! let profile = ProfileName::parse("Woo")?;
//! let key = validate_key("product 12")?;
//! entries.write(&profile, &key, "<p>...</p>", SystemTime::now())?;
//! markers.bump(&profile, SystemTime::now())?;
//! ```

pub mod entry;
pub mod error;
pub mod health;
pub mod marker;
pub mod storage;

// Re-exports
pub use entry::{EntryStore, ReadOutcome};
pub use error::StoreError;
pub use health::WriteHealth;
pub use marker::{GenerationMarker, MarkerRead};
pub use storage::{
    DEFAULT_EXTENSION, FsStorage, Location, MARKER_FILE, MemoryStorage, OperationCounts, Slot,
    Stamp, Storage,
};

// Re-export fragcache_core for consumers
pub use fragcache_core;
