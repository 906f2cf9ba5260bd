//! A triggered extract → transform → load → check → clean pipeline.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

use super::loader::{default_loader_factory, LoadDestination, Loader, LoaderFactory};
use crate::core::{DataSlot, RunState, StageName};
use crate::errors::{EtlflowError, Result, StageFailure};
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::generate_run_id;

/// Trigger predicate: `Some(targets)` to run, `None` to skip.
pub type TriggerFn = Box<dyn FnMut() -> anyhow::Result<Option<Vec<PathBuf>>>>;
/// Pulls data from the trigger's targets.
pub type ExtractFn<D> = Box<dyn FnMut(&[PathBuf]) -> anyhow::Result<D>>;
/// Reshapes extracted data in place.
pub type TransformFn<D> = Box<dyn FnMut(&mut D) -> anyhow::Result<()>>;
/// Verifies a completed load.
pub type CheckFn = Box<dyn FnMut() -> anyhow::Result<()>>;
/// Replaces the whole default workflow.
pub type RunFn = Box<dyn FnMut(&[PathBuf]) -> anyhow::Result<()>>;

/// One configured pipeline.
///
/// The default [`run`](Self::run) walks the stages strictly in order. The
/// `data` payload is filled by extract and dropped by clean; any stage error
/// aborts the run on the spot, leaving later stages (clean included) unrun.
pub struct PipelineInstance<D> {
    name: String,
    trigger: TriggerFn,
    extractor: ExtractFn<D>,
    transformer: TransformFn<D>,
    loader_factory: LoaderFactory<D>,
    check: CheckFn,
    run_fn: Option<RunFn>,
    destination: LoadDestination,
    event_sink: Arc<dyn EventSink>,
    state: RunState,
    data: DataSlot<D>,
}

impl<D: 'static> PipelineInstance<D> {
    /// Starts building a pipeline from its required parts.
    pub fn builder(
        name: impl Into<String>,
        trigger: impl FnMut() -> anyhow::Result<Option<Vec<PathBuf>>> + 'static,
        extractor: impl FnMut(&[PathBuf]) -> anyhow::Result<D> + 'static,
        destination: LoadDestination,
    ) -> PipelineInstanceBuilder<D> {
        PipelineInstanceBuilder {
            name: name.into(),
            trigger: Box::new(trigger),
            extractor: Box::new(extractor),
            destination,
            transformer: None,
            loader_factory: None,
            check: None,
            run_fn: None,
            event_sink: None,
        }
    }
}

impl<D> PipelineInstance<D> {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the load destination.
    #[must_use]
    pub fn destination(&self) -> &LoadDestination {
        &self.destination
    }

    /// Returns the current workflow state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the data payload, present between extract and clean.
    #[must_use]
    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    /// Returns true if a custom run function replaces the default workflow.
    #[must_use]
    pub fn has_custom_run(&self) -> bool {
        self.run_fn.is_some()
    }

    /// Asks the trigger whether to run.
    ///
    /// An empty target list counts as "do not run".
    pub fn trigger(&mut self) -> Result<Option<Vec<PathBuf>>> {
        let targets = (self.trigger)().map_err(|e| self.fail(StageName::Trigger, e))?;
        let targets = targets.filter(|t| !t.is_empty());
        debug!(pipeline = %self.name, fired = targets.is_some(), "Trigger evaluated");
        Ok(targets)
    }

    /// Extracts data from `targets`.
    pub fn extract(&mut self, targets: &[PathBuf]) -> Result<()> {
        let next = self.begin(StageName::Extract)?;
        let data = (self.extractor)(targets).map_err(|e| self.fail(StageName::Extract, e))?;
        self.data.fill(data);
        self.finish(StageName::Extract, next);
        Ok(())
    }

    /// Applies the transformer to the data. Identity when none was supplied.
    ///
    /// On failure the pipeline stays `Extracted` with its data, so the
    /// transform can be retried.
    pub fn transform(&mut self) -> Result<()> {
        let next = self.begin(StageName::Transform)?;
        let Some(data) = self.data.as_mut() else {
            return Err(EtlflowError::InvalidTransition {
                stage: StageName::Transform,
                state: self.state,
            });
        };
        let outcome = (self.transformer)(data);
        outcome.map_err(|e| self.fail(StageName::Transform, e))?;
        self.finish(StageName::Transform, next);
        Ok(())
    }

    /// Builds a loader for the destination and inserts the data.
    pub fn load(&mut self) -> Result<()> {
        let next = self.begin(StageName::Load)?;
        let loader = (self.loader_factory)(&self.destination)
            .map_err(|e| self.fail(StageName::Load, e))?;
        let data = self.data.as_ref().ok_or(EtlflowError::InvalidTransition {
            stage: StageName::Load,
            state: self.state,
        })?;
        loader
            .insert(data, &self.destination.table)
            .map_err(|e| self.fail(StageName::Load, e))?;
        self.finish(StageName::Load, next);
        Ok(())
    }

    /// Runs the check function. No-op when none was supplied.
    pub fn check(&mut self) -> Result<()> {
        let next = self.begin(StageName::Check)?;
        (self.check)().map_err(|e| self.fail(StageName::Check, e))?;
        self.finish(StageName::Check, next);
        Ok(())
    }

    /// Deletes every target that exists and drops the data.
    ///
    /// Missing targets are skipped. Failing to delete an existing target is an
    /// error. Allowed from any state.
    pub fn clean(&mut self, targets: &[PathBuf]) -> Result<()> {
        let next = self.begin(StageName::Clean)?;
        for target in targets {
            if let Err(e) = remove_if_exists(target) {
                error!(pipeline = %self.name, path = %target.display(), error = %e, "Cleanup failed");
                self.emit_stage("stage.failed", StageName::Clean);
                return Err(e);
            }
        }
        if self.data.clear() {
            debug!(pipeline = %self.name, "Dropped run data");
        }
        self.finish(StageName::Clean, next);
        Ok(())
    }

    /// Runs the pipeline for `targets`.
    ///
    /// With a custom run function, only that function runs. Otherwise the
    /// five stages run in order, starting from a clean slate.
    pub fn run(&mut self, targets: &[PathBuf]) -> Result<()> {
        let run_id = generate_run_id();
        let span = info_span!("pipeline_run", pipeline = %self.name, run_id = %run_id);
        let _enter = span.enter();

        let custom = self.run_fn.is_some();
        self.event_sink.emit(
            "run.started",
            Some(serde_json::json!({
                "pipeline": self.name,
                "run_id": run_id.to_string(),
                "custom": custom,
            })),
        );

        let result = if custom {
            self.run_custom(targets)
        } else {
            self.run_stages(targets)
        };

        match &result {
            Ok(()) => {
                info!(targets = targets.len(), "Pipeline run completed");
                self.event_sink.emit(
                    "run.completed",
                    Some(serde_json::json!({ "pipeline": self.name, "run_id": run_id.to_string() })),
                );
            }
            Err(e) => {
                error!(error = %e, "Pipeline run aborted");
                self.event_sink.emit(
                    "run.failed",
                    Some(serde_json::json!({
                        "pipeline": self.name,
                        "run_id": run_id.to_string(),
                        "stage": e.failed_stage().map(|s| s.as_str()),
                        "error": e.to_string(),
                    })),
                );
            }
        }
        result
    }

    /// Returns to `Idle`, dropping any data left by an aborted run.
    pub fn reset(&mut self) {
        if self.data.clear() {
            debug!(pipeline = %self.name, state = %self.state, "Discarded data from an unfinished run");
        }
        self.state = RunState::Idle;
    }

    fn run_custom(&mut self, targets: &[PathBuf]) -> Result<()> {
        let Some(run_fn) = self.run_fn.as_mut() else {
            return Ok(());
        };
        debug!(pipeline = %self.name, "Delegating to custom run function");
        run_fn(targets).map_err(|e| self.fail(StageName::CustomRun, e))
    }

    fn run_stages(&mut self, targets: &[PathBuf]) -> Result<()> {
        self.reset();
        self.extract(targets)?;
        self.transform()?;
        self.load()?;
        self.check()?;
        self.clean(targets)
    }

    fn begin(&self, stage: StageName) -> Result<RunState> {
        let next = self
            .state
            .advance(stage)
            .ok_or(EtlflowError::InvalidTransition {
                stage,
                state: self.state,
            })?;
        debug!(pipeline = %self.name, stage = %stage, "Stage started");
        self.emit_stage("stage.started", stage);
        Ok(next)
    }

    fn finish(&mut self, stage: StageName, next: RunState) {
        debug_assert_eq!(
            next.holds_data(),
            self.data.is_populated(),
            "data slot out of step with state '{next}'"
        );
        self.state = next;
        debug!(pipeline = %self.name, stage = %stage, state = %next, "Stage completed");
        self.emit_stage("stage.completed", stage);
    }

    fn fail(&self, stage: StageName, source: anyhow::Error) -> EtlflowError {
        error!(pipeline = %self.name, stage = %stage, error = %source, "Stage failed");
        self.emit_stage("stage.failed", stage);
        StageFailure::new(stage, source).into()
    }

    fn emit_stage(&self, event_type: &str, stage: StageName) {
        self.event_sink.emit(
            event_type,
            Some(serde_json::json!({
                "pipeline": self.name,
                "stage": stage.as_str(),
                "state": self.state,
                "data_present": self.data.is_populated(),
            })),
        );
    }
}

impl<D> fmt::Debug for PipelineInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInstance")
            .field("name", &self.name)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("data_present", &self.data.is_populated())
            .field("custom_run", &self.run_fn.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipelineInstance`].
pub struct PipelineInstanceBuilder<D> {
    name: String,
    trigger: TriggerFn,
    extractor: ExtractFn<D>,
    destination: LoadDestination,
    transformer: Option<TransformFn<D>>,
    loader_factory: Option<LoaderFactory<D>>,
    check: Option<CheckFn>,
    run_fn: Option<RunFn>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl<D: 'static> PipelineInstanceBuilder<D> {
    /// Sets the transformer.
    #[must_use]
    pub fn transformer(mut self, f: impl FnMut(&mut D) -> anyhow::Result<()> + 'static) -> Self {
        self.transformer = Some(Box::new(f));
        self
    }

    /// Sets the check function.
    #[must_use]
    pub fn check(mut self, f: impl FnMut() -> anyhow::Result<()> + 'static) -> Self {
        self.check = Some(Box::new(f));
        self
    }

    /// Replaces the default workflow with `f`.
    #[must_use]
    pub fn run_with(mut self, f: impl FnMut(&[PathBuf]) -> anyhow::Result<()> + 'static) -> Self {
        self.run_fn = Some(Box::new(f));
        self
    }

    /// Sets how loaders are built from the destination.
    ///
    /// The factory runs once per load stage.
    #[must_use]
    pub fn loader<L, F>(mut self, factory: F) -> Self
    where
        L: Loader<D> + 'static,
        F: Fn(&LoadDestination) -> anyhow::Result<L> + 'static,
    {
        self.loader_factory = Some(Box::new(
            move |destination: &LoadDestination| -> anyhow::Result<Box<dyn Loader<D>>> {
                Ok(Box::new(factory(destination)?))
            },
        ));
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> PipelineInstance<D> {
        PipelineInstance {
            name: self.name,
            trigger: self.trigger,
            extractor: self.extractor,
            transformer: self
                .transformer
                .unwrap_or_else(|| Box::new(|_data: &mut D| -> anyhow::Result<()> { Ok(()) })),
            loader_factory: self.loader_factory.unwrap_or_else(default_loader_factory),
            check: self
                .check
                .unwrap_or_else(|| Box::new(|| -> anyhow::Result<()> { Ok(()) })),
            run_fn: self.run_fn,
            destination: self.destination,
            event_sink: self.event_sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            state: RunState::Idle,
            data: DataSlot::Empty,
        }
    }
}

impl<D> fmt::Debug for PipelineInstanceBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInstanceBuilder")
            .field("name", &self.name)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// Removes a file if it exists. A missing file, or a symlink whose target is
/// missing, is not an error.
fn remove_if_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        debug!(path = %path.display(), "Cleanup target does not exist");
        return Ok(());
    }
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed cleanup target");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Cleanup target already gone");
            Ok(())
        }
        Err(source) => Err(EtlflowError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
