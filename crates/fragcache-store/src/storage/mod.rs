//! Storage medium abstraction.
//!
//! This module defines the trait every storage medium implements plus the
//! two media shipped with the crate.

mod fs;
mod location;
mod memory;
mod traits;

pub use fs::{DEFAULT_EXTENSION, FsStorage, MARKER_FILE};
pub use location::{Location, Slot};
pub use memory::{MemoryStorage, OperationCounts};
pub use traits::{Stamp, Storage};
