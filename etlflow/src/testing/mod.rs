//! Testing utilities for etlflow pipelines.
//!
//! This module provides:
//! - A tracking fixture with an in-memory snapshot and a fixed clock
//! - Assertions over the stage events a pipeline emitted

mod assertions;
mod fixtures;

pub use assertions::{assert_data_window, assert_stage_sequence, stage_events};
pub use fixtures::TrackingFixture;
