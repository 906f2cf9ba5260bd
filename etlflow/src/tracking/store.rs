//! The run-tracking store.

use chrono::TimeDelta;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{JsonFileBackend, SnapshotBackend};
use super::config::{TrackingConfig, DEFAULT_PLACEHOLDER_KEY};
use super::record::{PipelineDefaults, PipelineRecord, StoredRecord, TrackedField, TrackingTable};
use crate::errors::{EtlflowError, Result};
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::{format_iso8601, Clock, SystemClock, Timestamp};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Durable mapping from pipeline name to its [`PipelineRecord`].
///
/// The store owns one in-memory [`TrackingTable`] and writes it in full to
/// its [`SnapshotBackend`] after every reconciliation and every update.
///
/// There is no locking around the snapshot: one store in one process is the
/// only supported writer. Concurrent writers lose each other's updates.
pub struct TrackingStore {
    backend: Box<dyn SnapshotBackend>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn EventSink>,
    placeholder_key: String,
    table: TrackingTable,
}

impl TrackingStore {
    /// Creates a store over `backend`. Call [`load`](Self::load) before use.
    pub fn new(backend: impl SnapshotBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            clock: Arc::new(SystemClock),
            event_sink: Arc::new(NoOpEventSink),
            placeholder_key: DEFAULT_PLACEHOLDER_KEY.to_string(),
            table: TrackingTable::new(),
        }
    }

    /// Creates a store over the JSON file described by `config`.
    #[must_use]
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(JsonFileBackend::from_config(config))
            .with_placeholder_key(config.placeholder_key.clone())
    }

    /// Sets the clock used for "now".
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the key of the placeholder entry written on bootstrap.
    #[must_use]
    pub fn with_placeholder_key(mut self, key: impl Into<String>) -> Self {
        self.placeholder_key = key.into();
        self
    }

    /// Reads the snapshot and reconciles it with the caller's pipelines.
    ///
    /// 1. A missing snapshot is bootstrapped with a single placeholder entry.
    /// 2. Every name in `known` (and every key of `defaults`) without a record
    ///    gets a template record.
    /// 3. Fields missing from persisted records are backfilled from the
    ///    template; present fields are never replaced.
    /// 4. `defaults` fill fields whose persisted value is falsy.
    /// 5. The reconciled table is persisted.
    pub fn load<I, S>(
        &mut self,
        known: I,
        defaults: &BTreeMap<String, PipelineDefaults>,
    ) -> Result<&TrackingTable>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.backend.read()?.is_none() {
            self.bootstrap()?;
        }
        let snapshot = self
            .backend
            .read()?
            .ok_or_else(|| EtlflowError::Snapshot("snapshot missing after bootstrap".into()))?;

        let stored: BTreeMap<String, StoredRecord> = serde_json::from_str(&snapshot)
            .map_err(|e| EtlflowError::Snapshot(format!("cannot parse snapshot: {e}")))?;
        let mut table: TrackingTable = stored
            .into_iter()
            .map(|(name, record)| (name, PipelineRecord::backfilled(record)))
            .collect();

        let names = known
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .chain(defaults.keys().cloned());
        for name in names {
            if !table.contains(&name) {
                debug!(pipeline = %name, "Adding tracking record");
                table.insert(name, PipelineRecord::template());
            }
        }

        for (name, pipeline_defaults) in defaults {
            if let Some(record) = table.get_mut(name) {
                if record.apply_defaults(pipeline_defaults) {
                    debug!(pipeline = %name, "Applied caller defaults");
                }
            }
        }

        self.table = table;
        self.flush()?;

        info!(pipelines = self.table.len(), "Loaded tracking table");
        self.event_sink.emit(
            "tracking.loaded",
            Some(serde_json::json!({ "pipelines": self.table.names() })),
        );
        Ok(&self.table)
    }

    /// Stamps `field` of `pipeline` with the current time and persists the table.
    ///
    /// For [`TrackedField::LastTriggerTime`] on a record with an interval, the
    /// stored time moves to the latest interval boundary at or before now,
    /// counted from the previously stored trigger time. Repeated calls within
    /// one interval window leave the value unchanged.
    ///
    /// Returns the value written.
    pub fn update(&mut self, pipeline: &str, field: TrackedField) -> Result<Timestamp> {
        let now = self.clock.now();
        let record = self
            .table
            .get_mut(pipeline)
            .ok_or_else(|| EtlflowError::unknown_pipeline(pipeline))?;

        let value = match (field, record.interval) {
            (TrackedField::LastTriggerTime, Some(interval)) if !interval.is_zero() => {
                let anchor = record.last_trigger_time;
                if now < anchor {
                    warn!(pipeline = %pipeline, "Clock is behind the last trigger time; keeping it");
                }
                align_to_interval(anchor, now, interval).ok_or_else(|| {
                    EtlflowError::TimeOverflow {
                        pipeline: pipeline.to_string(),
                    }
                })?
            }
            _ => now,
        };
        record.set(field, value);
        self.flush()?;

        debug!(pipeline = %pipeline, field = %field, value = %format_iso8601(&value), "Updated tracking record");
        self.event_sink.emit(
            "tracking.updated",
            Some(serde_json::json!({
                "pipeline": pipeline,
                "field": field.as_str(),
                "value": format_iso8601(&value),
            })),
        );
        Ok(value)
    }

    /// Writes the whole in-memory table to the backend.
    pub fn flush(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.table)?;
        self.backend.write(&contents)
    }

    /// Returns the in-memory table.
    #[must_use]
    pub fn table(&self) -> &TrackingTable {
        &self.table
    }

    /// Returns the record of one pipeline.
    #[must_use]
    pub fn record(&self, pipeline: &str) -> Option<&PipelineRecord> {
        self.table.get(pipeline)
    }

    /// Returns when `pipeline` is next due, or `None` if it has no interval.
    pub fn next_due(&self, pipeline: &str) -> Result<Option<Timestamp>> {
        let record = self
            .record(pipeline)
            .ok_or_else(|| EtlflowError::unknown_pipeline(pipeline))?;
        let Some(interval) = record.interval.filter(|i| !i.is_zero()) else {
            return Ok(None);
        };
        let next = to_time_delta(interval)
            .and_then(|delta| record.last_trigger_time.checked_add_signed(delta))
            .ok_or_else(|| EtlflowError::TimeOverflow {
                pipeline: pipeline.to_string(),
            })?;
        Ok(Some(next))
    }

    /// Returns true if a full interval has passed since the last trigger.
    ///
    /// Pipelines without an interval are always due.
    pub fn is_due(&self, pipeline: &str) -> Result<bool> {
        Ok(self
            .next_due(pipeline)?
            .map_or(true, |next| self.clock.now() >= next))
    }

    fn bootstrap(&self) -> Result<()> {
        let mut table = TrackingTable::new();
        table.insert(self.placeholder_key.clone(), PipelineRecord::template());
        self.backend.write(&serde_json::to_string_pretty(&table)?)?;

        info!(placeholder = %self.placeholder_key, "Created new tracking snapshot");
        self.event_sink.emit("tracking.bootstrapped", None);
        Ok(())
    }
}

impl std::fmt::Debug for TrackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingStore")
            .field("placeholder_key", &self.placeholder_key)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Returns the last `anchor + k * interval` (k ≥ 0) that is not after `now`.
///
/// If `now` precedes `anchor`, `anchor` is returned unchanged. `None` means the
/// arithmetic left chrono's range.
pub(crate) fn align_to_interval(
    anchor: Timestamp,
    now: Timestamp,
    interval: Duration,
) -> Option<Timestamp> {
    let elapsed = now.signed_duration_since(anchor);
    if elapsed <= TimeDelta::zero() {
        return Some(anchor);
    }

    let elapsed_nanos =
        i128::from(elapsed.num_seconds()) * NANOS_PER_SEC + i128::from(elapsed.subsec_nanos());
    let interval_nanos = i128::try_from(interval.as_nanos()).ok()?;
    if interval_nanos == 0 {
        return Some(now);
    }
    let advance = elapsed_nanos / interval_nanos * interval_nanos;

    let secs = i64::try_from(advance / NANOS_PER_SEC).ok()?;
    let nanos = i64::try_from(advance % NANOS_PER_SEC).ok()?;
    let delta = TimeDelta::try_seconds(secs)?.checked_add(&TimeDelta::nanoseconds(nanos))?;
    anchor.checked_add_signed(delta)
}

fn to_time_delta(interval: Duration) -> Option<TimeDelta> {
    TimeDelta::from_std(interval).ok()
}
