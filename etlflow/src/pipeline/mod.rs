//! Pipeline definition and execution.
//!
//! This module provides:
//! - [`PipelineInstance`], the five-stage runner with its builder
//! - Load destinations and loader clients
//! - [`Node`], which records each run in a tracking store

mod instance;
#[cfg(test)]
mod instance_tests;
mod loader;
mod node;

pub use instance::{
    CheckFn, ExtractFn, PipelineInstance, PipelineInstanceBuilder, RunFn, TransformFn, TriggerFn,
};
pub use loader::{
    default_loader_factory, LoadDestination, Loader, LoaderFactory, MemoryLoader,
};
pub use node::{Node, TickOutcome};
