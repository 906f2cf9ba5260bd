//! Event sink system for observability.
//!
//! Pipelines and the tracking store report lifecycle events
//! (`stage.started`, `run.completed`, `tracking.updated`, ...) to an
//! [`EventSink`] supplied at construction.

mod sink;

pub use sink::{CollectingEventSink, Event, EventSink, LoggingEventSink, NoOpEventSink};
