#![allow(dead_code)]

use congeal_core::{AffineParameters, BlockBounds, Fiber, FiberBundle, Point, Subspace, SubjectSet, SubspaceMask};
use congeal_registration::{CheckpointSink, PreviewHandle, RegistrationEngine, RegistrationError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Everything the scheduler did to the engine and the sink, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Select(Subspace),
    Compute {
        subspace: Subspace,
        sample_size: usize,
        bandwidth: f64,
        budget: usize,
        step_bounds: BlockBounds,
        tolerance_bounds: BlockBounds,
    },
    CheckpointDir(String),
    Materialize(String),
    Preview(usize),
    SavePreview(String),
    ExportTransforms(String),
    Plot(String, usize),
    FullResolution(String),
}

pub type Log = Arc<Mutex<Vec<Event>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &Log) -> Vec<Event> {
    log.lock().unwrap().clone()
}

pub fn computes(log: &Log) -> Vec<Event> {
    events(log)
        .into_iter()
        .filter(|e| matches!(e, Event::Compute { .. }))
        .collect()
}

pub fn checkpoint_labels(log: &Log) -> Vec<String> {
    events(log)
        .into_iter()
        .filter_map(|e| match e {
            Event::CheckpointDir(label) => Some(label),
            _ => None,
        })
        .collect()
}

/// Engine that records every call and returns a decreasing objective.
#[derive(Debug)]
pub struct RecordingEngine {
    log: Log,
    subjects: usize,
    sample_size: usize,
    bandwidth: f64,
    budget: usize,
    step_bounds: BlockBounds,
    tolerance_bounds: BlockBounds,
    mask: SubspaceMask,
    history: Vec<f64>,
    /// One-based compute call that fails.
    pub fail_at: Option<usize>,
}

impl RecordingEngine {
    pub fn new(log: Log, subjects: usize) -> Self {
        Self {
            log,
            subjects,
            sample_size: 0,
            bandwidth: 0.0,
            budget: 0,
            step_bounds: BlockBounds::new(0.0, 0.0, 0.0, 0.0),
            tolerance_bounds: BlockBounds::new(0.0, 0.0, 0.0, 0.0),
            mask: SubspaceMask::frozen(),
            history: Vec::new(),
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    fn record(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl RegistrationEngine for RecordingEngine {
    fn add_subject(&mut self, _bundle: FiberBundle) -> Result<()> {
        self.subjects += 1;
        Ok(())
    }

    fn subject_count(&self) -> usize {
        self.subjects
    }

    fn set_curve_sample_size(&mut self, sample_size: usize) {
        self.sample_size = sample_size;
    }

    fn set_bandwidth(&mut self, sigma: f64) {
        self.bandwidth = sigma;
    }

    fn set_iteration_budget(&mut self, budget: usize) {
        self.budget = budget;
    }

    fn set_step_bounds(&mut self, bounds: BlockBounds) {
        self.step_bounds = bounds;
    }

    fn set_tolerance_bounds(&mut self, bounds: BlockBounds) {
        self.tolerance_bounds = bounds;
    }

    fn set_subspace_mask(&mut self, mask: SubspaceMask) {
        if let Some(subspace) = mask.active() {
            self.record(Event::Select(subspace));
        }
        self.mask = mask;
    }

    fn subspace_mask(&self) -> SubspaceMask {
        self.mask
    }

    fn compute(&mut self) -> Result<f64> {
        let subspace = self
            .mask
            .active()
            .ok_or_else(|| RegistrationError::invalid_configuration("no subspace enabled"))?;
        let call = self.history.len() + 1;
        if self.fail_at == Some(call) {
            return Err(RegistrationError::numerical_instability(format!(
                "objective diverged at call {}",
                call
            )));
        }
        self.record(Event::Compute {
            subspace,
            sample_size: self.sample_size,
            bandwidth: self.bandwidth,
            budget: self.budget,
            step_bounds: self.step_bounds,
            tolerance_bounds: self.tolerance_bounds,
        });
        let value = 100.0 / call as f64;
        self.history.push(value);
        Ok(value)
    }

    fn objective_history(&self) -> &[f64] {
        &self.history
    }

    fn export_transforms(&self) -> Vec<AffineParameters> {
        vec![AffineParameters::identity(); self.subjects]
    }
}

pub struct RecordingPreview {
    log: Log,
}

impl PreviewHandle for RecordingPreview {
    fn save(&self, dir: &Path) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(Event::SavePreview(dir.display().to_string()));
        Ok(())
    }
}

/// Sink that records calls without touching the filesystem.
pub struct RecordingSink {
    log: Log,
}

impl RecordingSink {
    pub fn new(log: Log) -> Self {
        Self { log }
    }

    fn record(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl CheckpointSink for RecordingSink {
    type Preview = RecordingPreview;

    fn checkpoint_dir(&mut self, label: &str) -> Result<PathBuf> {
        self.record(Event::CheckpointDir(label.to_string()));
        Ok(PathBuf::from(label))
    }

    fn materialize(&mut self, bundles: &[FiberBundle], subject_ids: &[String], dir: &Path) -> Result<()> {
        assert_eq!(bundles.len(), subject_ids.len());
        self.record(Event::Materialize(dir.display().to_string()));
        Ok(())
    }

    fn render_preview(&mut self, _bundles: &[FiberBundle], sample_count: usize) -> Result<RecordingPreview> {
        self.record(Event::Preview(sample_count));
        Ok(RecordingPreview {
            log: Arc::clone(&self.log),
        })
    }

    fn export_transforms(
        &mut self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> Result<()> {
        assert_eq!(transforms.len(), subject_ids.len());
        self.record(Event::ExportTransforms(dir.display().to_string()));
        Ok(())
    }

    fn plot_objective_history(&mut self, history: &[f64], dir: &Path) -> Result<()> {
        self.record(Event::Plot(dir.display().to_string(), history.len()));
        Ok(())
    }

    fn materialize_full_resolution(
        &mut self,
        _transforms: &[AffineParameters],
        _subject_ids: &[String],
        dir: &Path,
    ) -> Result<()> {
        self.record(Event::FullResolution(dir.display().to_string()));
        Ok(())
    }
}

/// `count` subjects holding a single straight fiber each.
pub fn subjects(count: usize) -> SubjectSet {
    let bundles = (0..count)
        .map(|i| {
            let fiber = Fiber::new(vec![
                Point::new(0.0, i as f64, 0.0),
                Point::new(10.0, i as f64, 0.0),
            ]);
            FiberBundle::new(vec![fiber])
        })
        .collect();
    let ids = (0..count).map(|i| format!("subject_{:02}", i)).collect();
    SubjectSet::new(bundles, ids).unwrap()
}
