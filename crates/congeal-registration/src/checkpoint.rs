//! Checkpoint emission.
//!
//! A checkpoint materializes the current group alignment into its own
//! directory (`iteration_k`). The controller only reads engine state here;
//! what gets written, and how, is up to the [`CheckpointSink`].

use congeal_core::{AffineParameters, FiberBundle, SubjectSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::RegistrationEngine;
use crate::error::Result;
use crate::profile::Stage;

/// A rendered preview that can be written into a checkpoint directory.
pub trait PreviewHandle {
    fn save(&self, dir: &Path) -> Result<()>;
}

/// Destination of checkpoint output.
///
/// Implementations report I/O problems as
/// [`RegistrationError::Checkpoint`](crate::RegistrationError::Checkpoint).
pub trait CheckpointSink {
    type Preview: PreviewHandle;

    /// Create (if needed) and return the directory for checkpoint `label`.
    fn checkpoint_dir(&mut self, label: &str) -> Result<PathBuf>;

    /// Write the aligned fiber bundles.
    fn materialize(&mut self, bundles: &[FiberBundle], subject_ids: &[String], dir: &Path) -> Result<()>;

    /// Render up to `sample_count` fibers per subject.
    fn render_preview(&mut self, bundles: &[FiberBundle], sample_count: usize) -> Result<Self::Preview>;

    /// Write one transform per subject.
    fn export_transforms(
        &mut self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> Result<()>;

    /// Plot the objective history.
    fn plot_objective_history(&mut self, history: &[f64], dir: &Path) -> Result<()>;

    /// Apply the transforms to the original, full-resolution input data
    /// (read fresh from the input location) and write the result.
    fn materialize_full_resolution(
        &mut self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> Result<()>;
}

/// Record of a written checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 0 before any stage, then the one-based stage index.
    pub index: usize,
    pub label: String,
    pub dir: PathBuf,
    pub terminal: bool,
    /// Last objective value at the time of the checkpoint.
    pub objective: Option<f64>,
}

/// Directory label of checkpoint `index`.
pub fn checkpoint_label(index: usize) -> String {
    format!("iteration_{}", index)
}

/// Whether a checkpoint follows `stage`.
///
/// The terminal stage is always materialized; the others only when verbose.
pub fn should_checkpoint(stage: Stage, verbose: bool) -> bool {
    verbose || stage.is_terminal()
}

/// Writes checkpoints for one subject set through a sink.
pub struct CheckpointWriter<'a, S: CheckpointSink> {
    subjects: &'a SubjectSet,
    sink: &'a mut S,
    fibers_rendered: usize,
}

impl<'a, S: CheckpointSink> CheckpointWriter<'a, S> {
    pub fn new(subjects: &'a SubjectSet, sink: &'a mut S, fibers_rendered: usize) -> Self {
        Self {
            subjects,
            sink,
            fibers_rendered,
        }
    }

    /// Materialize the engine's current alignment as checkpoint `index`.
    ///
    /// Terminal checkpoints also re-apply the transforms to the full input
    /// data and plot the objective history.
    pub fn write<E: RegistrationEngine + ?Sized>(
        &mut self,
        engine: &E,
        index: usize,
        terminal: bool,
    ) -> Result<Checkpoint> {
        let label = checkpoint_label(index);
        let dir = self.sink.checkpoint_dir(&label)?;
        let transforms = engine.export_transforms();
        let ids = self.subjects.ids();

        let aligned = self.subjects.transformed(&transforms)?;
        self.sink.materialize(&aligned, &ids, &dir)?;

        let preview = self.sink.render_preview(&aligned, self.fibers_rendered)?;
        preview.save(&dir)?;

        if terminal {
            self.sink.materialize_full_resolution(&transforms, &ids, &dir)?;
        }
        self.sink.export_transforms(&transforms, &ids, &dir)?;
        if terminal {
            self.sink.plot_objective_history(engine.objective_history(), &dir)?;
        }

        tracing::debug!("Checkpoint {} written to {}", label, dir.display());
        Ok(Checkpoint {
            index,
            label,
            dir,
            terminal,
            objective: engine.objective_history().last().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(checkpoint_label(0), "iteration_0");
        assert_eq!(checkpoint_label(4), "iteration_4");
    }

    #[test]
    fn test_policy() {
        for stage in [Stage::Coarse, Stage::Medium, Stage::Fine] {
            assert!(!should_checkpoint(stage, false));
            assert!(should_checkpoint(stage, true));
        }
        assert!(should_checkpoint(Stage::Finest, false));
        assert!(should_checkpoint(Stage::Finest, true));
    }
}
