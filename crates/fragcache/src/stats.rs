//! Cache event statistics.
//!
//! Every dealer call records exactly one event. Counts live in memory until
//! the host flushes them into the persisted report, and are mirrored to the
//! `metrics` facade as `fragcache_events_total{event=...}`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

/// Name of the metrics counter mirroring every recorded event.
pub const EVENTS_COUNTER: &str = "fragcache_events_total";

/// Outcome of a cache call, as counted in the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    /// Entry found, fresh and decodable.
    Hit,
    /// Nothing stored for the key.
    MissNewEntry,
    /// Stored bytes could not be decoded.
    MissInvalidEntry,
    /// Entry older than the profile TTL.
    MissExpiredTtl,
    /// Entry older than the profile's generation marker.
    MissInvalidated,
    /// The profile was invalidated.
    Invalidation,
}

impl CacheEvent {
    /// Returns the statistic name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "Cache Hit",
            Self::MissNewEntry => "Cache Miss (new entry)",
            Self::MissInvalidEntry => "Cache Miss (invalid entry)",
            Self::MissExpiredTtl => "Cache Miss (expired TTL)",
            Self::MissInvalidated => "Cache Miss (invalidated)",
            Self::Invalidation => "Invalidation",
        }
    }

    /// Returns true for the four miss outcomes.
    pub fn is_miss(self) -> bool {
        matches!(
            self,
            Self::MissNewEntry | Self::MissInvalidEntry | Self::MissExpiredTtl | Self::MissInvalidated
        )
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory event counters shared by all dealers of a controller.
#[derive(Debug, Default)]
pub struct Statistics {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl Statistics {
    /// Creates empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter called `name`.
    pub fn record(&self, name: &str) {
        *self.counts.lock().entry(name.to_string()).or_insert(0) += 1;
        counter!(EVENTS_COUNTER, "event" => name.to_string()).increment(1);
    }

    /// Increments the counter of a cache event.
    pub fn record_event(&self, event: CacheEvent) {
        self.record(event.as_str());
    }

    /// Returns the current count for `name`.
    pub fn get(&self, name: &str) -> u64 {
        self.counts.lock().get(name).copied().unwrap_or(0)
    }

    /// Returns the current count for a cache event.
    pub fn count(&self, event: CacheEvent) -> u64 {
        self.get(event.as_str())
    }

    /// Returns the sum of all counters.
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Returns a copy of all counters.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.lock().clone()
    }

    /// Returns true if nothing was recorded since the last flush.
    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.counts.lock().clear();
    }

    /// Merges the buffered counters into the report at `path` and clears
    /// the buffer.
    ///
    /// Returns `Ok(false)` without touching the file when nothing was
    /// recorded. On a write error the counters stay buffered.
    pub fn flush(&self, path: &Path, now: SystemTime) -> io::Result<bool> {
        let buffered = std::mem::take(&mut *self.counts.lock());
        if buffered.is_empty() {
            return Ok(false);
        }

        let existing = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                self.restore(buffered);
                return Err(e);
            },
        };

        let mut report = StatsReport::parse(&existing);
        report.merge(&buffered);

        if let Err(e) = fs::write(path, report.render(now)) {
            self.restore(buffered);
            return Err(e);
        }

        debug!(path = %path.display(), events = buffered.len(), "Statistics report updated");
        Ok(true)
    }

    fn restore(&self, buffered: BTreeMap<String, u64>) {
        let mut counts = self.counts.lock();
        for (name, n) in buffered {
            *counts.entry(name).or_insert(0) += n;
        }
    }
}

/// The persisted statistics report.
///
/// ```text
/// Period:  Tue, 1 Jul 2025 10:52:37 +0000 - Wed, 2 Jul 2025 08:00:00 +0000
///
/// Cache Hit:  120
/// Cache Miss (new entry):  4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsReport {
    /// Start of the accumulated period, as written in the report.
    pub period_start: Option<String>,
    /// Accumulated counts by event name.
    pub counts: BTreeMap<String, u64>,
}

impl StatsReport {
    /// Parses a report, ignoring lines that are not `name: value`.
    pub fn parse(text: &str) -> Self {
        let mut report = Self::default();

        for line in text.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            if name == "Period" {
                let start = value.split(" - ").next().unwrap_or_default().trim();
                if !start.is_empty() {
                    report.period_start = Some(start.to_string());
                }
            } else {
                report
                    .counts
                    .insert(name.to_string(), value.parse().unwrap_or(0));
            }
        }

        report
    }

    /// Adds `counts` to the accumulated values.
    pub fn merge(&mut self, counts: &BTreeMap<String, u64>) {
        for (name, n) in counts {
            *self.counts.entry(name.clone()).or_insert(0) += n;
        }
    }

    /// Renders the report with the period ending at `now`.
    ///
    /// A report without a recorded start begins its period at `now`.
    pub fn render(&self, now: SystemTime) -> String {
        let end = rfc2822(now);
        let start = self.period_start.clone().unwrap_or_else(|| end.clone());

        let mut names: Vec<&String> = self.counts.keys().collect();
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));

        let mut lines = vec![format!("Period:  {start} - {end}"), String::new()];
        lines.extend(
            names
                .into_iter()
                .map(|name| format!("{}:  {}", name, self.counts[name])),
        );
        lines.join("\n")
    }
}

fn rfc2822(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc2822()
}
