//! Binding a pipeline to the tracking store.

use tracing::{debug, warn};

use super::instance::PipelineInstance;
use crate::errors::{EtlflowError, Result};
use crate::tracking::{TrackedField, TrackingStore};
use crate::utils::Timestamp;

/// What a single [`Node::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The pipeline's interval has not elapsed yet.
    NotDue,
    /// The trigger declined to run.
    Skipped,
    /// The run succeeded; the recorded trigger time is attached.
    Completed(Timestamp),
}

/// One pipeline wired to run tracking.
///
/// A tick asks the trigger, runs the pipeline, and records the outcome in the
/// tracking store. When to tick is up to the caller.
#[derive(Debug)]
pub struct Node<D> {
    pipeline: PipelineInstance<D>,
}

impl<D> Node<D> {
    /// Wraps a pipeline. Its name is the tracking key.
    #[must_use]
    pub fn new(pipeline: PipelineInstance<D>) -> Self {
        Self { pipeline }
    }

    /// Returns the wrapped pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineInstance<D> {
        &self.pipeline
    }

    /// Returns the wrapped pipeline mutably.
    pub fn pipeline_mut(&mut self) -> &mut PipelineInstance<D> {
        &mut self.pipeline
    }

    /// Triggers and, if fired, runs the pipeline.
    ///
    /// Success stamps `last_trigger_time`; a trigger or run failure stamps
    /// `last_error_time` and the original error is returned.
    pub fn tick(&mut self, store: &mut TrackingStore) -> Result<TickOutcome> {
        let name = self.pipeline.name().to_string();
        if store.record(&name).is_none() {
            return Err(EtlflowError::unknown_pipeline(name));
        }

        let outcome = self
            .pipeline
            .trigger()
            .and_then(|targets| match targets {
                Some(targets) => self.pipeline.run(&targets).map(|()| true),
                None => Ok(false),
            });

        match outcome {
            Ok(true) => {
                let recorded = store.update(&name, TrackedField::LastTriggerTime)?;
                Ok(TickOutcome::Completed(recorded))
            }
            Ok(false) => {
                debug!(pipeline = %name, "Trigger declined; nothing to run");
                Ok(TickOutcome::Skipped)
            }
            Err(err) => {
                if let Err(track_err) = store.update(&name, TrackedField::LastErrorTime) {
                    warn!(pipeline = %name, error = %track_err, "Could not record failure");
                }
                Err(err)
            }
        }
    }

    /// Ticks only if the tracking store says the pipeline is due.
    pub fn tick_if_due(&mut self, store: &mut TrackingStore) -> Result<TickOutcome> {
        if !store.is_due(self.pipeline.name())? {
            return Ok(TickOutcome::NotDue);
        }
        self.tick(store)
    }
}
