//! Time source abstraction.
//!
//! All freshness decisions compare timestamps that were produced by the
//! same [`Clock`]: the engine stamps entries and markers with `now()` on
//! write and compares against `now()` on read. If the underlying clock
//! moves backwards between a write and a later read, an entry can appear
//! to predate its own marker; hosts that care can supply a clock that
//! never regresses.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the engine.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fragcache_core::{Clock, ManualClock};
///
/// let clock = ManualClock::starting_at_unix(1_000);
/// let before = clock.now();
/// clock.advance(Duration::from_secs(50));
/// assert_eq!(clock.now().duration_since(before).unwrap().as_secs(), 50);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a clock frozen at `secs` seconds after the Unix epoch.
    pub fn starting_at_unix(secs: u64) -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Moves the clock backward, simulating a wall-clock regression.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock();
        *now -= by;
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, at: SystemTime) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}
