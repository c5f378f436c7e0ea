//! Progress tracking and callbacks for the multiscale schedule.
//!
//! The scheduler and stage runner report stage boundaries, every solver
//! invocation and every checkpoint to a [`ProgressTracker`], which fans the
//! events out to registered [`ProgressCallback`]s.

use congeal_core::Subspace;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::profile::{Stage, StageProfile};

/// Progress information for one solver invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Stage being run.
    pub stage: Stage,
    /// One-based step (subspace sweep) within the stage.
    pub step: usize,
    /// Steps in this stage.
    pub total_steps: usize,
    /// Subspace that was optimised.
    pub subspace: Subspace,
    /// One-based solver invocation counter over the whole schedule.
    pub compute_index: usize,
    /// Solver invocations in the whole schedule, if known.
    pub total_computes: Option<usize>,
    /// Objective value after the invocation.
    pub objective: f64,
    /// Time elapsed since the schedule started.
    pub elapsed: Duration,
}

impl StepInfo {
    /// Calculate progress percentage over the whole schedule.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_computes
            .filter(|&total| total > 0)
            .map(|total| (self.compute_index as f64 / total as f64) * 100.0)
    }

    /// Estimated remaining time, from the average time per invocation so far.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let total = self.total_computes?;
        if self.compute_index == 0 {
            return None;
        }
        let per_call = self.elapsed.as_secs_f64() / self.compute_index as f64;
        let remaining = total.saturating_sub(self.compute_index);
        Some(Duration::from_secs_f64(per_call * remaining as f64))
    }
}

/// Summary emitted when a stage finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub stage: Stage,
    pub elapsed: Duration,
    pub compute_calls: usize,
    /// Last objective value recorded by the stage.
    pub objective: Option<f64>,
}

/// Progress callback trait for monitoring a registration run.
pub trait ProgressCallback: Send + Sync {
    /// Called after every solver invocation.
    fn on_step(&self, info: &StepInfo);

    /// Called once before the first checkpoint.
    fn on_start(&self, _total_computes: usize) {
        // Default: no-op
    }

    /// Called before a stage applies its profile.
    fn on_stage_start(&self, _profile: &StageProfile) {
        // Default: no-op
    }

    /// Called when a stage completes successfully.
    fn on_stage_complete(&self, _summary: &StageSummary) {
        // Default: no-op
    }

    /// Called after a checkpoint directory has been written.
    fn on_checkpoint(&self, _label: &str) {
        // Default: no-op
    }

    /// Called when the whole schedule completes successfully.
    fn on_complete(&self, _elapsed: Duration) {
        // Default: no-op
    }

    /// Called when the run fails.
    fn on_error(&self, _error: &str) {
        // Default: no-op
    }
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log every solver invocation at info level instead of debug.
    pub log_every_compute: bool,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self {
            log_every_compute: false,
        }
    }
}

impl ConsoleProgressCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log each solver invocation at info level.
    pub fn verbose(mut self) -> Self {
        self.log_every_compute = true;
        self
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_step(&self, info: &StepInfo) {
        let eta = info
            .estimated_remaining()
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        if self.log_every_compute {
            tracing::info!(
                "{} {}/{} {:<11} | objective {:.6} | {:.1}% | ETA {}",
                info.stage,
                info.step,
                info.total_steps,
                info.subspace,
                info.objective,
                info.progress_percent().unwrap_or(0.0),
                eta
            );
        } else {
            tracing::debug!(
                "{} {}/{} {} | objective {:.6} | ETA {}",
                info.stage,
                info.step,
                info.total_steps,
                info.subspace,
                info.objective,
                eta
            );
        }
    }

    fn on_start(&self, total_computes: usize) {
        tracing::info!("Registration started: {} solver invocations scheduled", total_computes);
    }

    fn on_stage_start(&self, profile: &StageProfile) {
        tracing::info!(
            "SCALE: {} SIGMA: {} SAMPLES: {} MAXFUN: {} STEPS: {}",
            profile.stage,
            profile.bandwidth,
            profile.sample_size,
            profile.iteration_budget,
            profile.steps
        );
    }

    fn on_stage_complete(&self, summary: &StageSummary) {
        tracing::info!(
            "{} finished in {:.2}s ({} solver calls, objective {})",
            summary.stage,
            summary.elapsed.as_secs_f64(),
            summary.compute_calls,
            summary
                .objective
                .map(|v| format!("{:.6}", v))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    fn on_checkpoint(&self, label: &str) {
        tracing::info!("Wrote checkpoint {}", label);
    }

    fn on_complete(&self, elapsed: Duration) {
        tracing::info!("Registration completed in {:.2}s", elapsed.as_secs_f64());
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// Everything a [`HistoryCallback`] records.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Start(usize),
    StageStart(Stage),
    Step(StepInfo),
    StageComplete(StageSummary),
    Checkpoint(String),
    Complete,
    Error(String),
}

/// History callback that records all progress events.
#[derive(Debug, Clone)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the recorded events.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    /// Only the per-invocation step events.
    pub fn steps(&self) -> Vec<StepInfo> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Step(info) => Some(info.clone()),
                _ => None,
            })
            .collect()
    }

    /// Labels of the checkpoints reported so far.
    pub fn checkpoints(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Checkpoint(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, event: ProgressEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProgressEvent>> {
        // A panicking callback must not hide the history from later readers.
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for HistoryCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_step(&self, info: &StepInfo) {
        self.push(ProgressEvent::Step(info.clone()));
    }

    fn on_start(&self, total_computes: usize) {
        self.push(ProgressEvent::Start(total_computes));
    }

    fn on_stage_start(&self, profile: &StageProfile) {
        self.push(ProgressEvent::StageStart(profile.stage));
    }

    fn on_stage_complete(&self, summary: &StageSummary) {
        self.push(ProgressEvent::StageComplete(summary.clone()));
    }

    fn on_checkpoint(&self, label: &str) {
        self.push(ProgressEvent::Checkpoint(label.to_string()));
    }

    fn on_complete(&self, _elapsed: Duration) {
        self.push(ProgressEvent::Complete);
    }

    fn on_error(&self, error: &str) {
        self.push(ProgressEvent::Error(error.to_string()));
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
    total_computes: Option<usize>,
    computes_done: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder form of [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    /// Start tracking a run of `total_computes` solver invocations.
    pub fn start(&mut self, total_computes: usize) {
        self.start_time = Some(Instant::now());
        self.total_computes = Some(total_computes);
        self.computes_done = 0;
        for callback in &self.callbacks {
            callback.on_start(total_computes);
        }
    }

    /// Time since [`start`](Self::start).
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    pub fn stage_started(&self, profile: &StageProfile) {
        for callback in &self.callbacks {
            callback.on_stage_start(profile);
        }
    }

    /// Report one finished solver invocation.
    pub fn step(&mut self, stage: Stage, step: usize, total_steps: usize, subspace: Subspace, objective: f64) {
        self.computes_done += 1;
        let info = StepInfo {
            stage,
            step,
            total_steps,
            subspace,
            compute_index: self.computes_done,
            total_computes: self.total_computes,
            objective,
            elapsed: self.elapsed(),
        };
        for callback in &self.callbacks {
            callback.on_step(&info);
        }
    }

    pub fn stage_completed(&self, summary: &StageSummary) {
        for callback in &self.callbacks {
            callback.on_stage_complete(summary);
        }
    }

    pub fn checkpoint(&self, label: &str) {
        for callback in &self.callbacks {
            callback.on_checkpoint(label);
        }
    }

    pub fn complete(&self) {
        let elapsed = self.elapsed();
        for callback in &self.callbacks {
            callback.on_complete(elapsed);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}
