//! Error types for the etlflow crate.
//!
//! Every fallible operation in the crate returns [`EtlflowError`]. Caller
//! supplied stage callables report failures through [`anyhow::Error`], which
//! is carried unchanged inside a [`StageFailure`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::{RunState, StageName};

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, EtlflowError>;

/// The main error type for etlflow operations.
#[derive(Debug, Error)]
pub enum EtlflowError {
    /// `update` was called for a pipeline the tracking table does not know.
    #[error("Unknown pipeline: '{name}'")]
    UnknownPipeline {
        /// The pipeline name that was looked up.
        name: String,
    },

    /// A field name could not be mapped to a tracked timestamp field.
    #[error("Unknown tracking field: '{field}'")]
    UnknownField {
        /// The rejected field name.
        field: String,
    },

    /// A stage callable failed; the run was aborted at this stage.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// A stage was invoked out of order.
    #[error("Cannot run stage '{stage}' from state '{state}'")]
    InvalidTransition {
        /// The stage that was requested.
        stage: StageName,
        /// The state the pipeline was in.
        state: RunState,
    },

    /// Deleting an existing cleanup target failed.
    #[error("Failed to remove '{}': {source}", path.display())]
    Cleanup {
        /// The target that could not be removed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted snapshot exists but cannot be used.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Interval arithmetic left the representable timestamp range.
    #[error("Timestamp arithmetic overflowed for pipeline '{pipeline}'")]
    TimeOverflow {
        /// The pipeline being updated.
        pipeline: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlflowError {
    /// Creates an unknown pipeline error.
    #[must_use]
    pub fn unknown_pipeline(name: impl Into<String>) -> Self {
        Self::UnknownPipeline { name: name.into() }
    }

    /// Returns the failed stage if this error aborted a run.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageName> {
        match self {
            Self::Stage(failure) => Some(failure.stage),
            _ => None,
        }
    }
}

/// A caller-supplied stage callable returned an error.
#[derive(Debug)]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: StageName,
    /// The error raised by the callable.
    pub source: anyhow::Error,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: StageName, source: anyhow::Error) -> Self {
        Self { stage, source }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage '{}' failed: {:#}", self.stage, self.source)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}
