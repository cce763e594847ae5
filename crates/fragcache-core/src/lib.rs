//! fragcache Core - Domain types and traits
//!
//! This crate provides the foundational types shared by the storage
//! backends and the cache engine: validated keys, profile names and
//! configuration, the clock abstraction and the error taxonomy.

pub mod clock;
pub mod error;
pub mod key;
pub mod profile;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use key::{KeyError, MAX_KEY_LEN, ValidKey, is_key_char, validate_key};
pub use profile::{DEFAULT_TTL, Profile, ProfileBuilder};
pub use types::{EventName, ProfileName, parse_event_list};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
