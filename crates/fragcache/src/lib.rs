//! fragcache - fragment cache with O(1) profile invalidation
//!
//! Cached values are grouped into profiles. Each profile has its own TTL
//! and its own set of invalidating events. Invalidating a profile moves a
//! single generation marker; entries discover at read time that they are
//! older than the marker.
//!
//! ```ignore
//! use std::sync::Arc;
//! use fragcache::{Controller, MemoryStorage, Profile};
//!
//! let controller = Controller::builder(Arc::new(MemoryStorage::new())).build();
//! controller.register_profile(Profile::builder("Album").event("save_post_album").build()?);
//!
//! let dealer = controller.dealer("Album")?;
//! let html: String = dealer.get_or_compute("album 7", || "<ul>...</ul>".to_string())?;
//!
//! controller.on_event("save_post_album");
//! ```

pub mod controller;
pub mod dealer;
pub mod log;
pub mod presets;
pub mod settings;
pub mod stats;

pub use controller::{Controller, ControllerBuilder, GlobalSwitches};
pub use dealer::{Dealer, Fetched, IdentifierFilter, Miss};
pub use log::{LOG_TARGET, LogSink, MemoryLogSink, TracingLogSink};
pub use presets::Preset;
pub use settings::{LoadError, Settings};
pub use stats::{CacheEvent, Statistics, StatsReport};

pub use fragcache_store::fragcache_core::{
    CacheError, Clock, EventName, KeyError, ManualClock, Profile, ProfileName, SystemClock,
    ValidKey, validate_key,
};
pub use fragcache_store::{FsStorage, MemoryStorage, Stamp, Storage, WriteHealth};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
