//! Tracking records and the table that holds them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::EtlflowError;
use crate::utils::{is_sentinel, sentinel_timestamp, Timestamp};

/// Scheduling and bookkeeping state for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// When the pipeline last ran (interval-aligned when an interval is set).
    pub last_trigger_time: Timestamp,
    /// When the pipeline last failed.
    pub last_error_time: Timestamp,
    /// The scheduling interval, if any.
    pub interval: Option<Duration>,
    /// Opaque schedule description owned by the external scheduler.
    pub schedule: Option<serde_json::Value>,
}

impl Default for PipelineRecord {
    fn default() -> Self {
        Self::template()
    }
}

impl PipelineRecord {
    /// Returns the template record: sentinel timestamps, no interval, no schedule.
    #[must_use]
    pub fn template() -> Self {
        Self {
            last_trigger_time: sentinel_timestamp(),
            last_error_time: sentinel_timestamp(),
            interval: None,
            schedule: None,
        }
    }

    /// Builds a full record from a persisted one, taking absent fields from the template.
    #[must_use]
    pub fn backfilled(stored: StoredRecord) -> Self {
        let template = Self::template();
        Self {
            last_trigger_time: stored.last_trigger_time.unwrap_or(template.last_trigger_time),
            last_error_time: stored.last_error_time.unwrap_or(template.last_error_time),
            interval: stored.interval.or(template.interval),
            schedule: stored.schedule.or(template.schedule),
        }
    }

    /// Applies caller defaults to fields whose current value is falsy.
    ///
    /// Returns true if any field changed.
    pub fn apply_defaults(&mut self, defaults: &PipelineDefaults) -> bool {
        let mut changed = false;

        if let Some(ts) = defaults.last_trigger_time {
            if is_sentinel(&self.last_trigger_time) && ts != self.last_trigger_time {
                self.last_trigger_time = ts;
                changed = true;
            }
        }
        if let Some(ts) = defaults.last_error_time {
            if is_sentinel(&self.last_error_time) && ts != self.last_error_time {
                self.last_error_time = ts;
                changed = true;
            }
        }
        if let Some(interval) = defaults.interval {
            if !self.has_interval() && Some(interval) != self.interval {
                self.interval = Some(interval);
                changed = true;
            }
        }
        if let Some(schedule) = &defaults.schedule {
            if !is_truthy(self.schedule.as_ref()) && self.schedule.as_ref() != Some(schedule) {
                self.schedule = Some(schedule.clone());
                changed = true;
            }
        }

        changed
    }

    /// Returns true if a non-zero interval is configured.
    #[must_use]
    pub fn has_interval(&self) -> bool {
        self.interval.is_some_and(|i| !i.is_zero())
    }

    /// Returns the value of a tracked timestamp field.
    #[must_use]
    pub fn get(&self, field: TrackedField) -> Timestamp {
        match field {
            TrackedField::LastTriggerTime => self.last_trigger_time,
            TrackedField::LastErrorTime => self.last_error_time,
        }
    }

    /// Sets a tracked timestamp field.
    pub fn set(&mut self, field: TrackedField, value: Timestamp) {
        match field {
            TrackedField::LastTriggerTime => self.last_trigger_time = value,
            TrackedField::LastErrorTime => self.last_error_time = value,
        }
    }
}

/// A record as read back from a snapshot; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredRecord {
    /// Persisted last trigger time.
    pub last_trigger_time: Option<Timestamp>,
    /// Persisted last error time.
    pub last_error_time: Option<Timestamp>,
    /// Persisted interval.
    pub interval: Option<Duration>,
    /// Persisted schedule.
    pub schedule: Option<serde_json::Value>,
}

/// Caller-supplied values applied to fields that are still unset after backfill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Initial last trigger time.
    pub last_trigger_time: Option<Timestamp>,
    /// Initial last error time.
    pub last_error_time: Option<Timestamp>,
    /// Scheduling interval.
    pub interval: Option<Duration>,
    /// Schedule description.
    pub schedule: Option<serde_json::Value>,
}

impl PipelineDefaults {
    /// Creates empty defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: serde_json::Value) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Sets the initial last trigger time.
    #[must_use]
    pub fn with_last_trigger_time(mut self, ts: Timestamp) -> Self {
        self.last_trigger_time = Some(ts);
        self
    }
}

/// The timestamp fields `update` can stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    /// `last_trigger_time`; interval-aligned when an interval is set.
    LastTriggerTime,
    /// `last_error_time`; always set to now.
    LastErrorTime,
}

impl TrackedField {
    /// Returns the snapshot field name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastTriggerTime => "last_trigger_time",
            Self::LastErrorTime => "last_error_time",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedField {
    type Err = EtlflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_trigger_time" => Ok(Self::LastTriggerTime),
            "last_error_time" => Ok(Self::LastErrorTime),
            other => Err(EtlflowError::UnknownField {
                field: other.to_string(),
            }),
        }
    }
}

/// Mapping from pipeline name to its tracking record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingTable {
    records: BTreeMap<String, PipelineRecord>,
}

impl TrackingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a pipeline.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PipelineRecord> {
        self.records.get(name)
    }

    /// Returns a mutable record for a pipeline.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PipelineRecord> {
        self.records.get_mut(name)
    }

    /// Returns true if the pipeline has a record.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Inserts or replaces a record.
    pub fn insert(&mut self, name: impl Into<String>, record: PipelineRecord) {
        self.records.insert(name.into(), record);
    }

    /// Iterates over records in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PipelineRecord)> {
        self.records.iter()
    }

    /// Returns the pipeline names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, PipelineRecord)> for TrackingTable {
    fn from_iter<I: IntoIterator<Item = (String, PipelineRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// JSON truthiness: null, false, zero, and empty strings/collections are falsy.
fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    use serde_json::Value;

    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
