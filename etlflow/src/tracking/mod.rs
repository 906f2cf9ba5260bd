//! Durable run tracking.
//!
//! The [`TrackingStore`] remembers, across process restarts, when each named
//! pipeline last ran, when it last failed, and its scheduling interval. The
//! whole table lives in one snapshot, read and written in full through a
//! [`SnapshotBackend`].

mod backend;
mod config;
mod record;
mod store;

pub use backend::{JsonFileBackend, MemoryBackend, SnapshotBackend};
pub use config::{TrackingConfig, DEFAULT_PLACEHOLDER_KEY, DEFAULT_SNAPSHOT_FILE};
pub use record::{PipelineDefaults, PipelineRecord, StoredRecord, TrackedField, TrackingTable};
pub use store::TrackingStore;
