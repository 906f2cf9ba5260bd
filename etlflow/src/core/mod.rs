//! Core domain model types for etlflow.
//!
//! This module contains the stage names, the run state machine, and the
//! transient data slot a pipeline fills between extract and clean.

mod data;
mod status;

pub use data::DataSlot;
pub use status::{RunState, StageName};
