//! # Etlflow
//!
//! Triggered ETL pipelines with durable run tracking.
//!
//! Etlflow provides:
//!
//! - **Stage-based execution**: extract → transform → load → check → clean,
//!   run strictly in order, or replaced wholesale by a custom run function
//! - **Run tracking**: a snapshot-backed store remembering when each pipeline
//!   last ran and failed, with interval-aligned trigger times
//! - **Pluggable loaders**: destination clients built from a
//!   `{server, database, table}` descriptor
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlflow::prelude::*;
//!
//! let pipeline = PipelineInstance::builder(
//!     "orders",
//!     || Ok(find_new_exports()),
//!     |targets| read_csv(targets),
//!     LoadDestination::new("sql.example.net", "warehouse", "orders"),
//! )
//! .loader(|dest| WarehouseClient::connect(dest))
//! .build();
//!
//! let mut store = TrackingStore::from_config(&TrackingConfig::default());
//! store.load(["orders"], &BTreeMap::new())?;
//!
//! let mut node = Node::new(pipeline);
//! node.tick_if_due(&mut store)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod tracking;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{DataSlot, RunState, StageName};
    pub use crate::errors::{EtlflowError, Result, StageFailure};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        LoadDestination, Loader, MemoryLoader, Node, PipelineInstance, TickOutcome,
    };
    pub use crate::tracking::{
        JsonFileBackend, MemoryBackend, PipelineDefaults, PipelineRecord, SnapshotBackend,
        TrackedField, TrackingConfig, TrackingStore, TrackingTable,
    };
    pub use crate::utils::{Clock, FixedClock, SystemClock, Timestamp};
}
