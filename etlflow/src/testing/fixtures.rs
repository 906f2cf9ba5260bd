//! Fixtures for tracking-store tests.

use std::collections::BTreeMap;

use crate::tracking::{MemoryBackend, PipelineDefaults, TrackingStore, TrackingTable};
use crate::utils::{FixedClock, Timestamp};

/// An in-memory snapshot and a controllable clock.
#[derive(Debug, Clone)]
pub struct TrackingFixture {
    /// The snapshot backend shared with every store built here.
    pub backend: MemoryBackend,
    /// The clock shared with every store built here.
    pub clock: FixedClock,
}

impl TrackingFixture {
    /// Creates a fixture with no snapshot and the clock at `now`.
    #[must_use]
    pub fn at(now: Timestamp) -> Self {
        Self {
            backend: MemoryBackend::new(),
            clock: FixedClock::new(now),
        }
    }

    /// Builds a store over the fixture's backend and clock.
    #[must_use]
    pub fn store(&self) -> TrackingStore {
        TrackingStore::new(self.backend.clone()).with_clock(self.clock.clone())
    }

    /// Builds a store and loads `known` with `defaults`.
    ///
    /// # Panics
    ///
    /// Panics if loading fails.
    #[must_use]
    pub fn loaded_store<'a>(
        &self,
        known: impl IntoIterator<Item = &'a str>,
        defaults: &BTreeMap<String, PipelineDefaults>,
    ) -> TrackingStore {
        let mut store = self.store();
        if let Err(e) = store.load(known, defaults) {
            panic!("fixture store failed to load: {e}");
        }
        store
    }

    /// Parses the current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if there is no snapshot or it does not parse.
    #[must_use]
    pub fn snapshot(&self) -> TrackingTable {
        let Some(contents) = self.backend.contents() else {
            panic!("no snapshot written yet");
        };
        match serde_json::from_str(&contents) {
            Ok(table) => table,
            Err(e) => panic!("snapshot does not parse: {e}"),
        }
    }
}
