//! Cache profile configuration.

use std::time::Duration;

use indexmap::IndexSet;

use crate::error::Result;
use crate::types::{EventName, ProfileName, parse_event_list};

/// Default time-to-live for cached entries (one day).
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Static configuration of one cache profile.
///
/// Profiles are built once at startup and never mutated; re-registering a
/// profile under the same name replaces it wholesale.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fragcache_core::Profile;
///
/// let profile = Profile::builder("Footer")
///     .events_csv("acf/save_post, wp_update_nav_menu")
///     .ttl(Duration::from_secs(3600))
///     .build()
///     .unwrap();
///
/// assert!(profile.listens_to("wp_update_nav_menu"));
/// assert!(profile.is_enabled());
/// assert!(!profile.is_logging_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: ProfileName,
    invalidating_events: IndexSet<EventName>,
    ttl: Duration,
    logging_enabled: bool,
    enabled: bool,
    collapse_misses: bool,
}

impl Profile {
    /// Creates a new builder for a profile called `name`.
    pub fn builder(name: impl Into<String>) -> ProfileBuilder {
        ProfileBuilder::new(name)
    }

    /// Returns the profile name.
    pub fn name(&self) -> &ProfileName {
        &self.name
    }

    /// Returns the events that invalidate this profile, in declaration order.
    pub fn invalidating_events(&self) -> &IndexSet<EventName> {
        &self.invalidating_events
    }

    /// Returns true if `event` invalidates this profile.
    pub fn listens_to(&self, event: &str) -> bool {
        self.invalidating_events.contains(event)
    }

    /// Returns the entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns whether cache events are written to the log sink.
    pub fn is_logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    /// Returns whether the cache is consulted at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns whether concurrent misses on one key are serialized.
    pub fn collapses_misses(&self) -> bool {
        self.collapse_misses
    }

    /// Returns a copy with the global switches applied on top.
    ///
    /// A profile is only enabled (or logging) when both its own flag and
    /// the global one are set.
    pub fn with_global_switches(&self, enabled: bool, logging: bool) -> Self {
        Self {
            enabled: self.enabled && enabled,
            logging_enabled: self.logging_enabled && logging,
            ..self.clone()
        }
    }
}

/// Builder for Profile.
#[derive(Debug)]
pub struct ProfileBuilder {
    name: String,
    invalidating_events: IndexSet<EventName>,
    ttl: Duration,
    logging_enabled: bool,
    enabled: bool,
    collapse_misses: bool,
}

impl ProfileBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invalidating_events: IndexSet::new(),
            ttl: DEFAULT_TTL,
            logging_enabled: false,
            enabled: true,
            collapse_misses: false,
        }
    }

    /// Adds an invalidating event.
    pub fn event(mut self, event: impl Into<EventName>) -> Self {
        self.invalidating_events.insert(event.into());
        self
    }

    /// Adds several invalidating events.
    pub fn events<I, E>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EventName>,
    {
        self.invalidating_events
            .extend(events.into_iter().map(Into::into));
        self
    }

    /// Adds invalidating events from a comma separated list.
    pub fn events_csv(self, list: &str) -> Self {
        self.events(parse_event_list(list))
    }

    /// Sets the entry time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enables or disables logging of cache events.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Enables or disables caching.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Serializes concurrent misses on the same key within this process.
    pub fn collapse_misses(mut self, collapse: bool) -> Self {
        self.collapse_misses = collapse;
        self
    }

    /// Builds the profile, validating its name.
    pub fn build(self) -> Result<Profile> {
        Ok(Profile {
            name: ProfileName::parse(self.name)?,
            invalidating_events: self.invalidating_events,
            ttl: self.ttl,
            logging_enabled: self.logging_enabled,
            enabled: self.enabled,
            collapse_misses: self.collapse_misses,
        })
    }
}
