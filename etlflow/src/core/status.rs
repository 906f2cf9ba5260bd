//! Stage names and the run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the pipeline workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// The trigger predicate deciding whether to run.
    Trigger,
    /// Pulls data from the trigger's targets.
    Extract,
    /// Reshapes the extracted data.
    Transform,
    /// Writes the data to the destination.
    Load,
    /// Verifies the loaded data.
    Check,
    /// Removes the targets and drops the data.
    Clean,
    /// A caller-supplied replacement for the whole workflow.
    CustomRun,
}

impl StageName {
    /// The default workflow, in execution order.
    pub const WORKFLOW: [Self; 5] = [
        Self::Extract,
        Self::Transform,
        Self::Load,
        Self::Check,
        Self::Clean,
    ];

    /// Returns the stage name as used in logs and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Load => "load",
            Self::Check => "check",
            Self::Clean => "clean",
            Self::CustomRun => "custom_run",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pipeline instance is in the default workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// Data has been extracted.
    Extracted,
    /// Data has been transformed.
    Transformed,
    /// Data has been loaded.
    Loaded,
    /// The check passed.
    Checked,
    /// Targets removed and data dropped.
    Cleaned,
}

impl RunState {
    /// Returns the state reached by running `stage` from this state, if allowed.
    ///
    /// Transitions are strictly sequential. `Clean` is accepted from any state
    /// so an aborted run can always be cleaned up.
    #[must_use]
    pub fn advance(self, stage: StageName) -> Option<Self> {
        match (self, stage) {
            (Self::Idle | Self::Cleaned, StageName::Extract) => Some(Self::Extracted),
            (Self::Extracted, StageName::Transform) => Some(Self::Transformed),
            (Self::Transformed, StageName::Load) => Some(Self::Loaded),
            (Self::Loaded, StageName::Check) => Some(Self::Checked),
            (_, StageName::Clean) => Some(Self::Cleaned),
            _ => None,
        }
    }

    /// Returns true if the data payload must be present in this state.
    #[must_use]
    pub fn holds_data(&self) -> bool {
        matches!(self, Self::Extracted | Self::Transformed | Self::Loaded | Self::Checked)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Extracted => write!(f, "extracted"),
            Self::Transformed => write!(f, "transformed"),
            Self::Loaded => write!(f, "loaded"),
            Self::Checked => write!(f, "checked"),
            Self::Cleaned => write!(f, "cleaned"),
        }
    }
}
