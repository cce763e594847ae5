//! Per-profile cache handler.
//!
//! A [`Dealer`] answers "give me the value for this identifier" for one
//! profile. On a hit the stored payload comes back without running the
//! producer; on any kind of miss the producer runs and its result is saved.
//!
//! Freshness is decided at read time from two timestamps: the entry's own
//! modification time and the profile's generation marker. Invalidating a
//! profile only moves the marker. The marker is created alongside the
//! profile's first entry, so it never postdates an entry nobody invalidated.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use fragcache_store::fragcache_core::{
    CacheError, Clock, KeyError, Profile, ProfileName, Result, ValidKey, validate_key,
};
use fragcache_store::{EntryStore, GenerationMarker, ReadOutcome};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::log::LogSink;
use crate::stats::{CacheEvent, Statistics};

/// Rewrites identifiers before validation: `(identifier, profile) -> key`.
pub type IdentifierFilter = Arc<dyn Fn(&str, &ProfileName) -> String + Send + Sync>;

/// Why a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// Nothing stored for the key.
    NewEntry,
    /// Stored bytes could not be decoded.
    InvalidEntry,
    /// Older than the profile TTL, or without a usable timestamp.
    ExpiredTtl,
    /// Older than the profile's generation marker.
    Invalidated,
}

impl Miss {
    /// Returns the statistic recorded for this miss.
    pub fn event(self) -> CacheEvent {
        match self {
            Self::NewEntry => CacheEvent::MissNewEntry,
            Self::InvalidEntry => CacheEvent::MissInvalidEntry,
            Self::ExpiredTtl => CacheEvent::MissExpiredTtl,
            Self::Invalidated => CacheEvent::MissInvalidated,
        }
    }
}

/// Result of [`Dealer::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// Fresh, decodable entry.
    Hit(T),
    /// The producer has to run.
    Miss(Miss),
}

impl<T> Fetched<T> {
    /// Returns the statistic this outcome records.
    pub fn event(&self) -> CacheEvent {
        match self {
            Self::Hit(_) => CacheEvent::Hit,
            Self::Miss(miss) => miss.event(),
        }
    }

    /// Returns the payload of a hit.
    pub fn hit(self) -> Option<T> {
        match self {
            Self::Hit(payload) => Some(payload),
            Self::Miss(_) => None,
        }
    }

    /// Returns true on a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    Fresh,
    ExpiredTtl,
    Invalidated,
}

/// Output captured from a producer. Valid UTF-8 is stored as text, anything
/// else as raw bytes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Captured {
    Text(String),
    Bytes(Vec<u8>),
}

impl Captured {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Bytes(e.into_bytes()),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// Collaborators shared by every dealer of a controller.
#[derive(Clone)]
pub(crate) struct DealerContext {
    pub(crate) entries: Arc<EntryStore>,
    pub(crate) markers: Arc<GenerationMarker>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) stats: Arc<Statistics>,
    pub(crate) filter: Option<IdentifierFilter>,
}

/// Runtime cache handler bound to one profile.
///
/// Obtained from [`Controller::dealer`](crate::Controller::dealer). All
/// methods take `&self`; a dealer is shared between threads through `Arc`.
///
/// # Example
///
/// ```ignore
/// let dealer = controller.dealer("Footer")?;
/// let html: String = dealer.get_or_compute("footer en", || render_footer("en"))?;
/// ```
pub struct Dealer {
    profile: Profile,
    ctx: DealerContext,
    key_locks: Mutex<HashMap<ValidKey, Arc<Mutex<()>>>>,
}

impl Dealer {
    pub(crate) fn new(profile: Profile, ctx: DealerContext) -> Self {
        Self {
            profile,
            ctx,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the profile with the global switches applied.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Returns the profile name.
    pub fn name(&self) -> &ProfileName {
        self.profile.name()
    }

    /// Returns the cached value for `identifier`, running `producer` on a
    /// miss and saving its result.
    ///
    /// # Errors
    ///
    /// Only usage errors: an identifier that is not a valid key.
    pub fn get_or_compute<T, F>(&self, identifier: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.run(identifier, || Ok::<T, CacheError>(producer()), |_| {})
    }

    /// Like [`Dealer::get_or_compute`], calling `on_hit` with the cached
    /// payload when the producer is skipped.
    pub fn get_or_compute_notify<T, F, H>(&self, identifier: &str, producer: F, on_hit: H) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
        H: FnOnce(&T),
    {
        self.run(identifier, || Ok::<T, CacheError>(producer()), on_hit)
    }

    /// Like [`Dealer::get_or_compute`] with a fallible producer.
    ///
    /// A producer error is returned unchanged and nothing is stored.
    pub fn try_get_or_compute<T, E, F>(&self, identifier: &str, producer: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.run(identifier, producer, |_| {})
    }

    /// Writes the output for `identifier` into `sink`.
    ///
    /// `producer` renders into the provided buffer, which implements
    /// [`io::Write`]. On a miss the rendered bytes are cached; on a hit the
    /// cached bytes are written instead, unchanged. Output does not have to
    /// be UTF-8.
    ///
    /// # Errors
    ///
    /// Usage errors, or [`CacheError::Io`] if writing to `sink` fails.
    pub fn output<W, F>(&self, identifier: &str, sink: &mut W, producer: F) -> Result<()>
    where
        W: io::Write + ?Sized,
        F: FnOnce(&mut Vec<u8>),
    {
        self.output_notify(identifier, sink, producer, |_| {})
    }

    /// Like [`Dealer::output`], calling `on_hit` with the cached bytes.
    pub fn output_notify<W, F, H>(&self, identifier: &str, sink: &mut W, producer: F, on_hit: H) -> Result<()>
    where
        W: io::Write + ?Sized,
        F: FnOnce(&mut Vec<u8>),
        H: FnOnce(&[u8]),
    {
        let captured: Captured = self.get_or_compute_notify(
            identifier,
            || {
                let mut buffer = Vec::new();
                producer(&mut buffer);
                Captured::from_bytes(buffer)
            },
            |captured| on_hit(captured.as_bytes()),
        )?;

        sink.write_all(captured.as_bytes())?;
        Ok(())
    }

    /// Looks up `identifier` without running anything.
    ///
    /// Records exactly one statistic. Does not look at the enabled switch:
    /// this is raw access to the profile's store.
    pub fn fetch<T: DeserializeOwned>(&self, identifier: &str) -> Result<Fetched<T>> {
        let key = self.resolve(identifier)?;
        Ok(self.lookup(&key))
    }

    /// Stores `payload` under `identifier`, stamped with the current time.
    ///
    /// Returns whether the write succeeded. Write failures are logged, not
    /// raised.
    pub fn save<T: Serialize + ?Sized>(&self, identifier: &str, payload: &T) -> Result<bool> {
        let key = self.resolve(identifier)?;
        Ok(self.store(&key, payload))
    }

    /// Invalidates every entry of the profile by moving its generation
    /// marker to now. Costs one marker write regardless of entry count.
    ///
    /// `reason` is the event that caused it, for the log.
    pub fn invalidate(&self, reason: &str) {
        self.event(
            CacheEvent::Invalidation,
            &format!("\"{}\", action: {}", self.name(), reason),
        );

        if let Err(e) = self.ctx.markers.bump(self.name(), self.ctx.clock.now()) {
            warn!(profile = %self.name(), reason = %reason, error = %e, "Failed to bump generation marker");
            self.log(&format!(
                "Error: failed to invalidate \"{}\": {}",
                self.name(),
                e
            ));
        }
    }

    /// Returns when the profile was last invalidated, or when its first
    /// entry was stored if it never was. `None` before any of those.
    pub fn last_invalidation(&self) -> Option<SystemTime> {
        self.ctx.markers.peek(self.name())
    }

    // TTL first; an entry without a usable time counts as TTL-expired.
    // Writes storage when the marker is missing: it is created at now and
    // the entry is fresh for this read. Equal to the marker is fresh.
    pub(crate) fn freshness(&self, stored_at: Option<SystemTime>) -> Freshness {
        let now = self.ctx.clock.now();

        let Some(stored_at) = stored_at else {
            return Freshness::ExpiredTtl;
        };

        if stored_at
            .checked_add(self.profile.ttl())
            .is_some_and(|expires| expires < now)
        {
            return Freshness::ExpiredTtl;
        }

        let marker = self.ctx.markers.timestamp(self.name(), now);
        if marker.created {
            debug!(profile = %self.name(), "Generation marker was missing, recreated on read");
            return Freshness::Fresh;
        }

        if stored_at < marker.timestamp {
            Freshness::Invalidated
        } else {
            Freshness::Fresh
        }
    }

    fn run<T, E, F, H>(&self, identifier: &str, producer: F, on_hit: H) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
        H: FnOnce(&T),
    {
        let key = self.resolve(identifier)?;

        if !self.profile.is_enabled() {
            debug!(profile = %self.name(), key = %key, "Cache disabled, bypassing store");
            self.log(&format!("Cache Disabled  \"{}\" / {}", self.name(), key));
            return producer();
        }

        let slot = self.key_slot(&key);
        let _guard = slot.as_ref().map(|s| s.lock.lock());

        match self.lookup(&key) {
            Fetched::Hit(payload) => {
                on_hit(&payload);
                Ok(payload)
            },
            Fetched::Miss(_) => {
                let payload = producer()?;
                self.store(&key, &payload);
                Ok(payload)
            },
        }
    }

    fn resolve(&self, identifier: &str) -> Result<ValidKey> {
        let identifier = match &self.ctx.filter {
            Some(filter) => filter(identifier, self.name()),
            None => identifier.to_string(),
        };

        validate_key(&identifier).map_err(|e| {
            let what = match e {
                KeyError::TooLong { .. } => "key too long",
                KeyError::InvalidChars { .. } => "key contains invalid chars",
            };
            warn!(profile = %self.name(), key = %identifier, error = %e, "Rejected cache key");
            self.log(&format!("Error: {}:  \"{}\" / {}", what, self.name(), identifier));
            CacheError::from(e)
        })
    }

    fn lookup<T: DeserializeOwned>(&self, key: &ValidKey) -> Fetched<T> {
        let read = self.ctx.entries.read::<T>(self.name(), key);

        // Staleness outranks corruption
        let outcome = match read {
            ReadOutcome::NotFound => Fetched::Miss(Miss::NewEntry),
            _ => match self.freshness(read.stored_at()) {
                Freshness::ExpiredTtl => Fetched::Miss(Miss::ExpiredTtl),
                Freshness::Invalidated => Fetched::Miss(Miss::Invalidated),
                Freshness::Fresh => match read {
                    ReadOutcome::Found { payload, .. } => Fetched::Hit(payload),
                    _ => Fetched::Miss(Miss::InvalidEntry),
                },
            },
        };

        self.event(outcome.event(), &format!("\"{}\" / {}", self.name(), key));
        outcome
    }

    fn store<T: Serialize + ?Sized>(&self, key: &ValidKey, payload: &T) -> bool {
        let now = self.ctx.clock.now();

        // The marker must not postdate the profile's first entry
        if self.ctx.markers.timestamp(self.name(), now).created {
            debug!(profile = %self.name(), "Created generation marker");
        }

        match self.ctx.entries.write(self.name(), key, payload, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(profile = %self.name(), key = %key, error = %e, "Failed to store cache entry");
                self.log(&format!(
                    "Error: failed to save \"{}\" / {}: {}",
                    self.name(),
                    key,
                    e
                ));
                false
            },
        }
    }

    fn event(&self, event: CacheEvent, subject: &str) {
        debug!(profile = %self.name(), event = %event, "{}", subject);
        self.log(&format!("{}:  {}", event, subject));
        self.ctx.stats.record_event(event);
    }

    fn log(&self, message: &str) {
        if self.profile.is_logging_enabled() {
            self.ctx.sink.log(message);
        }
    }

    fn key_slot(&self, key: &ValidKey) -> Option<KeySlot<'_>> {
        if !self.profile.collapses_misses() {
            return None;
        }

        let lock = self
            .key_locks
            .lock()
            .entry(key.clone())
            .or_default()
            .clone();

        Some(KeySlot {
            locks: &self.key_locks,
            key: key.clone(),
            lock,
        })
    }
}

impl std::fmt::Debug for Dealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dealer")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// A per-key lock handed out while misses are collapsed. Removes its map
/// entry on drop once no other caller holds it.
struct KeySlot<'a> {
    locks: &'a Mutex<HashMap<ValidKey, Arc<Mutex<()>>>>,
    key: ValidKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeySlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // The map and this slot are the only holders
        if let Some(lock) = locks.get(&self.key)
            && Arc::strong_count(lock) == 2
        {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLogSink;
    use fragcache_store::{Location, MemoryStorage};
    use fragcache_store::fragcache_core::ManualClock;
    use std::time::Duration;

    struct Fixture {
        dealer: Dealer,
        clock: ManualClock,
        storage: Arc<MemoryStorage>,
        sink: Arc<MemoryLogSink>,
        stats: Arc<Statistics>,
    }

    fn fixture(profile: Profile) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::starting_at_unix(1_000_000);
        let sink = Arc::new(MemoryLogSink::new());
        let stats = Arc::new(Statistics::new());
        let ctx = DealerContext {
            entries: Arc::new(EntryStore::new(storage.clone())),
            markers: Arc::new(GenerationMarker::new(storage.clone())),
            clock: Arc::new(clock.clone()),
            sink: sink.clone(),
            stats: stats.clone(),
            filter: None,
        };
        Fixture {
            dealer: Dealer::new(profile, ctx),
            clock,
            storage,
            sink,
            stats,
        }
    }

    fn profile(ttl_secs: u64) -> Profile {
        Profile::builder("Woo")
            .ttl(Duration::from_secs(ttl_secs))
            .logging(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let fx = fixture(profile(100));
        let mut runs = 0;

        let first: String = fx
            .dealer
            .get_or_compute("p1", || {
                runs += 1;
                "X".to_string()
            })
            .unwrap();
        let second: String = fx
            .dealer
            .get_or_compute("p1", || {
                runs += 1;
                "Y".to_string()
            })
            .unwrap();

        assert_eq!(first, "X");
        assert_eq!(second, "X");
        assert_eq!(runs, 1);
        assert_eq!(fx.stats.count(CacheEvent::MissNewEntry), 1);
        assert_eq!(fx.stats.count(CacheEvent::Hit), 1);
        assert!(fx.sink.contains("Cache Hit:  \"Woo\" / p1"));
    }

    #[test]
    fn test_freshness_boundaries() {
        let fx = fixture(profile(100));
        let stored_at = Some(fx.clock.now());
        assert!(fx.dealer.save("k", "v").unwrap());

        fx.clock.advance(Duration::from_secs(100));
        assert_eq!(fx.dealer.freshness(stored_at), Freshness::Fresh);

        fx.clock.advance(Duration::from_secs(1));
        assert_eq!(fx.dealer.freshness(stored_at), Freshness::ExpiredTtl);
        assert_eq!(fx.dealer.freshness(None), Freshness::ExpiredTtl);
    }

    #[test]
    fn test_marker_equality_is_fresh() {
        let fx = fixture(profile(1_000));
        let now = fx.clock.now();

        fx.dealer.invalidate("save_post");

        assert_eq!(fx.dealer.freshness(Some(now)), Freshness::Fresh);
        assert_eq!(
            fx.dealer.freshness(Some(now - Duration::from_secs(1))),
            Freshness::Invalidated
        );
    }

    #[test]
    fn test_first_save_creates_marker_at_write_instant() {
        let fx = fixture(profile(1_000));
        let saved_at = fx.clock.now();
        assert_eq!(fx.dealer.last_invalidation(), None);

        assert!(fx.dealer.save("k", "v").unwrap());
        assert_eq!(fx.dealer.last_invalidation(), Some(saved_at));

        // Later saves leave it alone
        fx.clock.advance(Duration::from_secs(30));
        assert!(fx.dealer.save("other", "v").unwrap());
        assert_eq!(fx.dealer.last_invalidation(), Some(saved_at));
    }

    #[test]
    fn test_marker_removed_out_of_band_is_recreated_on_read() {
        let fx = fixture(profile(1_000));
        assert!(fx.dealer.save("k", "v").unwrap());
        fx.storage.forget_stamp(&Location::marker(fx.dealer.name()));

        fx.clock.advance(Duration::from_secs(5));
        let stored_at = Some(fx.clock.now() - Duration::from_secs(5));
        assert_eq!(fx.dealer.freshness(stored_at), Freshness::Fresh);
        assert_eq!(fx.dealer.last_invalidation(), Some(fx.clock.now()));
    }

    #[test]
    fn test_invalid_key_touches_nothing() {
        let fx = fixture(profile(100));

        let err = fx
            .dealer
            .get_or_compute("a/b", || "never".to_string())
            .unwrap_err();

        assert!(err.is_invalid_key());
        assert_eq!(fx.storage.operations().total(), 0);
        assert_eq!(fx.stats.total(), 0);
        assert!(fx.sink.contains("Error: key contains invalid chars:  \"Woo\" / a/b"));
    }

    #[test]
    fn test_producer_error_propagates() {
        #[derive(Debug)]
        enum RenderError {
            Cache,
            Template,
        }
        impl From<CacheError> for RenderError {
            fn from(_: CacheError) -> Self {
                Self::Cache
            }
        }

        let fx = fixture(profile(100));
        let result: std::result::Result<String, RenderError> = fx
            .dealer
            .try_get_or_compute("p1", || Err(RenderError::Template));

        assert!(matches!(result, Err(RenderError::Template)));
        assert_eq!(fx.storage.len(), 0);

        let result: std::result::Result<String, RenderError> = fx
            .dealer
            .try_get_or_compute("bad\tkey", || Ok("x".to_string()));
        assert!(matches!(result, Err(RenderError::Cache)));
    }

    #[test]
    fn test_on_hit_only_on_hits() {
        let fx = fixture(profile(100));
        let mut seen = Vec::new();

        let _: u32 = fx
            .dealer
            .get_or_compute_notify("n", || 7, |v| seen.push(*v))
            .unwrap();
        let _: u32 = fx
            .dealer
            .get_or_compute_notify("n", || 8, |v| seen.push(*v))
            .unwrap();

        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_output_replays_bytes() {
        let fx = fixture(profile(100));
        let mut first = Vec::new();
        let mut second = Vec::new();

        fx.dealer
            .output("footer", &mut first, |out| {
                out.extend_from_slice("<footer>é</footer>".as_bytes())
            })
            .unwrap();
        fx.dealer
            .output("footer", &mut second, |out| out.extend_from_slice(b"changed"))
            .unwrap();

        assert_eq!(first, "<footer>é</footer>".as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_output_keeps_non_utf8_bytes() {
        use std::io::Write;

        let fx = fixture(profile(100));
        let rendered = [0xff, 0xfe, b'<', b'p', b'>', 0x80];
        let mut first = Vec::new();
        let mut second = Vec::new();

        fx.dealer
            .output("blob", &mut first, |out| out.write_all(&rendered).unwrap())
            .unwrap();
        fx.dealer
            .output("blob", &mut second, |out| out.extend_from_slice(b"changed"))
            .unwrap();

        assert_eq!(first, rendered);
        assert_eq!(second, rendered);
        assert_eq!(fx.stats.count(CacheEvent::Hit), 1);
    }

    #[test]
    fn test_save_failure_still_returns_payload() {
        let fx = fixture(profile(100));
        fx.storage.fail_writes(true);

        let value: String = fx.dealer.get_or_compute("k", || "fresh".to_string()).unwrap();

        assert_eq!(value, "fresh");
        assert!(!fx.dealer.save("k", "again").unwrap());
        assert!(fx.sink.contains("Error: failed to save \"Woo\" / k"));
    }

    #[test]
    fn test_collapse_misses_cleans_up_locks() {
        let profile = Profile::builder("Woo").collapse_misses(true).build().unwrap();
        let fx = fixture(profile);

        let _: u8 = fx.dealer.get_or_compute("k", || 1).unwrap();

        assert!(fx.dealer.key_locks.lock().is_empty());
    }
}
