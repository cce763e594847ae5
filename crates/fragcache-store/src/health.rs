//! Write health tracking.
//!
//! A failing medium does not break the cache: every lookup just misses
//! and recomputes. This tracker makes that degraded state visible.

use parking_lot::RwLock;

/// Consecutive failures and the last error of an entry store's writes.
#[derive(Debug, Default)]
pub struct WriteHealth {
    state: RwLock<HealthState>,
}

#[derive(Debug, Default)]
struct HealthState {
    last_error: Option<String>,
    consecutive_failures: u32,
}

impl WriteHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful write, clearing any failure streak.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        state.last_error = None;
        state.consecutive_failures = 0;
    }

    /// Records a failed write.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut state = self.state.write();
        state.last_error = Some(error.into());
        state.consecutive_failures += 1;
    }

    /// Returns the error of the most recent write, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Returns the number of consecutive failed writes.
    pub fn failure_count(&self) -> u32 {
        self.state.read().consecutive_failures
    }

    /// Returns true unless the most recent write failed.
    pub fn is_healthy(&self) -> bool {
        self.state.read().last_error.is_none()
    }
}
