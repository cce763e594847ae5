//! Registry of dealers and event router.
//!
//! The controller owns one [`Dealer`] per registered profile and an explicit
//! `event -> profiles` index, so routing an event never scans profiles.
//! It is constructed by the host and passed around; there is no global
//! instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use fragcache_store::fragcache_core::{
    CacheError, Clock, EventName, Profile, ProfileName, Result, SystemClock, parse_event_list,
};
use fragcache_store::{EntryStore, GenerationMarker, Storage, WriteHealth};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::dealer::{Dealer, DealerContext, IdentifierFilter};
use crate::log::{LogSink, TracingLogSink};
use crate::presets::Preset;
use crate::stats::Statistics;

/// Global switches applied on top of every profile's own flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSwitches {
    /// Caching allowed at all.
    pub enabled: bool,
    /// Event logging allowed at all. Also gates the statistics report.
    pub logging: bool,
}

impl Default for GlobalSwitches {
    fn default() -> Self {
        Self {
            enabled: true,
            logging: true,
        }
    }
}

#[derive(Default)]
struct Registry {
    dealers: IndexMap<ProfileName, Arc<Dealer>>,
    events: HashMap<EventName, IndexSet<ProfileName>>,
    groups: IndexMap<EventName, IndexSet<EventName>>,
}

impl Registry {
    fn reindex(&mut self) {
        self.events.clear();
        for (name, dealer) in &self.dealers {
            for event in dealer.profile().invalidating_events() {
                self.events
                    .entry(event.clone())
                    .or_default()
                    .insert(name.clone());
            }
        }
    }

    fn listeners(&self, event: &str) -> Vec<Arc<Dealer>> {
        self.events
            .get(event)
            .into_iter()
            .flatten()
            .filter_map(|name| self.dealers.get(name).cloned())
            .collect()
    }
}

/// Registry of dealers by profile name.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use fragcache::{Controller, FsStorage, Profile};
///
/// let controller = Controller::builder(Arc::new(FsStorage::new("/var/cache/frag"))).build();
/// controller.register_profile(Profile::builder("Footer").events_csv("wp_update_nav_menu").build()?);
///
/// controller.on_event("wp_update_nav_menu");
/// ```
pub struct Controller {
    ctx: DealerContext,
    switches: GlobalSwitches,
    registry: RwLock<Registry>,
}

impl Controller {
    /// Creates a builder over `storage`.
    pub fn builder(storage: Arc<dyn Storage>) -> ControllerBuilder {
        ControllerBuilder::new(storage)
    }

    /// Registers `profile`, replacing any profile with the same name.
    ///
    /// The global switches are applied to the profile here; the dealer
    /// returned by later [`Controller::dealer`] calls is a new one.
    pub fn register_profile(&self, profile: Profile) {
        let profile = profile.with_global_switches(self.switches.enabled, self.switches.logging);
        let name = profile.name().clone();

        debug!(
            profile = %name,
            ttl_secs = profile.ttl().as_secs(),
            enabled = profile.is_enabled(),
            logging = profile.is_logging_enabled(),
            events = profile.invalidating_events().len(),
            "Registering cache profile"
        );

        let mut registry = self.registry.write();
        registry
            .dealers
            .insert(name, Arc::new(Dealer::new(profile, self.ctx.clone())));
        registry.reindex();
    }

    /// Returns the dealer of profile `name`.
    ///
    /// # Errors
    ///
    /// [`CacheError::ProfileNotFound`] if the profile was never registered.
    pub fn dealer(&self, name: &str) -> Result<Arc<Dealer>> {
        self.registry
            .read()
            .dealers
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::profile_not_found(name))
    }

    /// Returns the registered profile names in registration order.
    pub fn profiles(&self) -> Vec<ProfileName> {
        self.registry.read().dealers.keys().cloned().collect()
    }

    /// Declares `name` as a group event fired whenever one of `events` is.
    ///
    /// Profiles listening to the group are invalidated with the reason
    /// `name(event)`. Groups do not nest. Re-registering replaces the
    /// member list.
    pub fn register_group<I, E>(&self, name: impl Into<EventName>, events: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<EventName>,
    {
        let name = name.into();
        let members: IndexSet<EventName> = events
            .into_iter()
            .map(Into::into)
            .filter(|e: &EventName| !e.as_str().trim().is_empty())
            .collect();

        debug!(group = %name, members = members.len(), "Registering event group");
        self.registry.write().groups.insert(name, members);
    }

    /// Like [`Controller::register_group`] with a comma-separated list.
    pub fn register_group_csv(&self, name: impl Into<EventName>, events: &str) {
        self.register_group(name, parse_event_list(events));
    }

    /// Registers a built-in event group under [`Preset::group_name`].
    pub fn register_preset(&self, preset: Preset) {
        self.register_group(preset.group_name(), preset.events().iter().copied());
    }

    /// Routes a host event, invalidating every profile that listens to it
    /// and every profile listening to a group that contains it.
    ///
    /// An event of the form `group(member)` is matched on `group`.
    /// Returns the invalidated profiles in invalidation order.
    pub fn on_event(&self, event: &str) -> Vec<ProfileName> {
        let lookup = match event.split_once('(') {
            Some((head, _)) => head,
            None => event,
        };

        // Collect under the lock, invalidate outside it
        let (direct, grouped) = {
            let registry = self.registry.read();
            let direct = registry.listeners(lookup);
            let grouped: Vec<(String, Vec<Arc<Dealer>>)> = registry
                .groups
                .iter()
                .filter(|(_, members)| members.contains(event))
                .map(|(group, _)| {
                    (
                        format!("{}({})", group, event),
                        registry.listeners(group.as_str()),
                    )
                })
                .collect();
            (direct, grouped)
        };

        let mut invalidated = Vec::new();

        for dealer in direct {
            dealer.invalidate(event);
            invalidated.push(dealer.name().clone());
        }

        for (reason, dealers) in grouped {
            for dealer in dealers {
                dealer.invalidate(&reason);
                invalidated.push(dealer.name().clone());
            }
        }

        if !invalidated.is_empty() {
            info!(event = %event, profiles = invalidated.len(), "Event invalidated cache profiles");
        }

        invalidated
    }

    /// Invalidates every registered profile. Returns how many.
    pub fn invalidate_all(&self, reason: &str) -> usize {
        let dealers: Vec<Arc<Dealer>> = self.registry.read().dealers.values().cloned().collect();

        for dealer in &dealers {
            dealer.invalidate(reason);
        }

        info!(reason = %reason, profiles = dealers.len(), "Invalidated all cache profiles");
        dealers.len()
    }

    /// Increments the statistic called `name`.
    pub fn record_statistic(&self, name: &str) {
        self.ctx.stats.record(name);
    }

    /// Returns the shared statistics.
    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.ctx.stats
    }

    /// Flushes the statistics into the report at `path`.
    ///
    /// Skipped (returns `false`) when global logging is off or nothing was
    /// recorded. A failed write is logged and the counts stay buffered.
    pub fn flush_statistics(&self, path: &Path) -> bool {
        if !self.switches.logging {
            return false;
        }

        match self.ctx.stats.flush(path, self.ctx.clock.now()) {
            Ok(flushed) => flushed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write statistics report");
                false
            },
        }
    }

    /// Returns the write health of the storage medium.
    pub fn write_health(&self) -> &WriteHealth {
        self.ctx.entries.health()
    }

    /// Returns the global switches.
    pub fn switches(&self) -> GlobalSwitches {
        self.switches
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("switches", &self.switches)
            .field("profiles", &self.profiles())
            .finish_non_exhaustive()
    }
}

/// Builder for Controller.
pub struct ControllerBuilder {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
    stats: Arc<Statistics>,
    filter: Option<IdentifierFilter>,
    switches: GlobalSwitches,
}

impl ControllerBuilder {
    fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingLogSink),
            stats: Arc::new(Statistics::new()),
            filter: None,
            switches: GlobalSwitches::default(),
        }
    }

    /// Sets the time source used to stamp entries and markers.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the sink receiving event lines of profiles with logging on.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Shares existing statistics counters.
    pub fn statistics(mut self, stats: Arc<Statistics>) -> Self {
        self.stats = stats;
        self
    }

    /// Sets a hook rewriting identifiers before validation.
    pub fn identifier_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, &ProfileName) -> String + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the global enabled switch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.switches.enabled = enabled;
        self
    }

    /// Sets the global logging switch.
    pub fn logging(mut self, logging: bool) -> Self {
        self.switches.logging = logging;
        self
    }

    /// Builds the controller. No profiles are registered yet.
    pub fn build(self) -> Controller {
        let ctx = DealerContext {
            entries: Arc::new(EntryStore::new(self.storage.clone())),
            markers: Arc::new(GenerationMarker::new(self.storage)),
            clock: self.clock,
            sink: self.sink,
            stats: self.stats,
            filter: self.filter,
        };

        Controller {
            ctx,
            switches: self.switches,
            registry: RwLock::new(Registry::default()),
        }
    }
}
