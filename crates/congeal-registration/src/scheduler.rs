//! Multiscale schedule controller.
//!
//! Sequences the four stages Coarse → Medium → Fine → Finest over a
//! registration engine, interleaving checkpoints:
//!
//! 1. `iteration_0` is written from the initial (identity) state.
//! 2. Each stage applies its profile and runs its subspace sweeps.
//! 3. `iteration_k` follows stage `k` when verbose, and always after the
//!    terminal stage, which also re-applies the transforms to the full
//!    resolution input.
//!
//! Every configuration problem is reported before the first checkpoint is
//! written. Engine failures abort the run; checkpoints already written are
//! left in place and there is no resume path.

use congeal_core::SubjectSet;
use std::sync::Arc;
use std::time::Duration;

use crate::checkpoint::{should_checkpoint, Checkpoint, CheckpointSink, CheckpointWriter};
use crate::engine::RegistrationEngine;
use crate::error::{RegistrationError, Result};
use crate::profile::{Schedule, ScheduleConfig, Stage};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::runner::run_stage;

/// Fibers per subject drawn in checkpoint previews by default.
pub const DEFAULT_FIBERS_RENDERED: usize = 100;

/// Result of a completed schedule.
#[derive(Debug)]
pub struct RegistrationOutcome<E> {
    /// The engine in its final state.
    pub engine: E,
    /// The profiles that were run.
    pub schedule: Schedule,
    /// Wall-clock time of each stage, in execution order.
    pub stage_times: Vec<(Stage, Duration)>,
    /// Checkpoints written, in order.
    pub checkpoints: Vec<Checkpoint>,
}

impl<E: RegistrationEngine> RegistrationOutcome<E> {
    /// Per-stage elapsed times without stage labels.
    pub fn elapsed(&self) -> Vec<Duration> {
        self.stage_times.iter().map(|(_, d)| *d).collect()
    }

    /// Last objective value, if any solver call ran.
    pub fn final_objective(&self) -> Option<f64> {
        self.engine.objective_history().last().copied()
    }
}

/// Top-level controller of the coarse-to-fine schedule.
#[derive(Clone)]
pub struct MultiscaleScheduler {
    config: ScheduleConfig,
    verbose: bool,
    fibers_rendered: usize,
    tracker: ProgressTracker,
}

impl MultiscaleScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            verbose: false,
            fibers_rendered: DEFAULT_FIBERS_RENDERED,
            tracker: ProgressTracker::new(),
        }
    }

    /// Write a checkpoint after every stage, not only the terminal one.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Fibers per subject drawn in previews.
    pub fn with_fibers_rendered(mut self, fibers_rendered: usize) -> Self {
        self.fibers_rendered = fibers_rendered;
        self
    }

    /// Register a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.tracker.add_callback(callback);
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Derive the stage profiles for `dataset_count` subjects.
    pub fn plan(&self, dataset_count: usize) -> Result<Schedule> {
        Schedule::derive(&self.config, dataset_count)
    }

    /// Run the full schedule.
    ///
    /// `engine` must already hold one subject per entry of `subjects`, in
    /// the same order.
    pub fn run<E, S>(
        &mut self,
        engine: E,
        subjects: &SubjectSet,
        sink: &mut S,
    ) -> Result<RegistrationOutcome<E>>
    where
        E: RegistrationEngine,
        S: CheckpointSink,
    {
        let result = self.run_schedule(engine, subjects, sink);
        if let Err(e) = &result {
            self.tracker.error(&e.to_string());
        }
        result
    }

    fn run_schedule<E, S>(
        &mut self,
        mut engine: E,
        subjects: &SubjectSet,
        sink: &mut S,
    ) -> Result<RegistrationOutcome<E>>
    where
        E: RegistrationEngine,
        S: CheckpointSink,
    {
        let schedule = self.plan(subjects.len())?;
        if engine.subject_count() != subjects.len() {
            return Err(RegistrationError::invalid_configuration(format!(
                "engine holds {} subjects but the subject set has {}",
                engine.subject_count(),
                subjects.len()
            )));
        }

        self.tracker.start(schedule.total_compute_calls());
        let mut writer = CheckpointWriter::new(subjects, sink, self.fibers_rendered);
        let mut checkpoints = Vec::new();
        let mut stage_times = Vec::with_capacity(Stage::ORDER.len());

        let initial = writer.write(&engine, 0, false)?;
        self.tracker.checkpoint(&initial.label);
        checkpoints.push(initial);

        for profile in schedule.iter() {
            let summary = run_stage(&mut engine, profile, &mut self.tracker).map_err(|e| {
                tracing::error!("{} stage failed: {}", profile.stage, e);
                e
            })?;
            stage_times.push((profile.stage, summary.elapsed));

            if should_checkpoint(profile.stage, self.verbose) {
                let checkpoint =
                    writer.write(&engine, profile.stage.index() + 1, profile.stage.is_terminal())?;
                self.tracker.checkpoint(&checkpoint.label);
                checkpoints.push(checkpoint);
            }
        }

        self.tracker.complete();
        Ok(RegistrationOutcome {
            engine,
            schedule,
            stage_times,
            checkpoints,
        })
    }
}
