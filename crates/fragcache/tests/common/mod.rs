//! Test helpers para fragcache.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;
use std::time::Duration;

use fragcache::{CacheEvent, Controller, ManualClock, MemoryLogSink, MemoryStorage, Profile};

/// A controller over in-memory storage with a hand-driven clock.
pub struct Harness {
    pub controller: Controller,
    pub clock: ManualClock,
    pub storage: Arc<MemoryStorage>,
    pub sink: Arc<MemoryLogSink>,
}

impl Harness {
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::starting_at_unix(1_700_000_000);
        let sink = Arc::new(MemoryLogSink::new());

        let controller = Controller::builder(storage.clone())
            .clock(Arc::new(clock.clone()))
            .log_sink(sink.clone())
            .build();

        Self {
            controller,
            clock,
            storage,
            sink,
        }
    }

    /// Registers a logging profile with the given TTL and events.
    pub fn with_profile(self, name: &str, ttl_secs: u64, events: &str) -> Self {
        self.controller.register_profile(
            Profile::builder(name)
                .ttl(Duration::from_secs(ttl_secs))
                .events_csv(events)
                .logging(true)
                .build()
                .unwrap(),
        );
        self
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub fn count(&self, event: CacheEvent) -> u64 {
        self.controller.statistics().count(event)
    }

    /// Runs `get_or_compute` on `profile` and returns the value plus
    /// whether the producer ran.
    pub fn get(&self, profile: &str, key: &str, value: &str) -> (String, bool) {
        let mut ran = false;
        let out = self
            .controller
            .dealer(profile)
            .unwrap()
            .get_or_compute(key, || {
                ran = true;
                value.to_string()
            })
            .unwrap();
        (out, ran)
    }
}
