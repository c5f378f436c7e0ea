//! Checkpoint output to a directory tree.
//!
//! ```text
//! <output>/iteration_k/
//!     <id>.vtk  atlas.vtk
//!     view_axial.png  view_sagittal.png  view_coronal.png
//!     <id>.tfm  transforms.json
//!     objective_function.svg  objective_function.csv     (terminal only)
//!     full_resolution/<id>.vtk                           (terminal only)
//! ```

use anyhow::{anyhow, Context};
use congeal_core::{AffineParameters, FiberBundle};
use congeal_registration::{CheckpointSink, RegistrationError, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plot::write_objective_plot;
use crate::preview::Preview;
use crate::transform_io::write_transforms;
use crate::vtk::{read_vtk, write_vtk};

pub const ATLAS_FILE: &str = "atlas.vtk";
pub const FULL_RESOLUTION_DIR: &str = "full_resolution";

fn to_checkpoint_error(dir: &Path, error: anyhow::Error) -> RegistrationError {
    RegistrationError::checkpoint(dir.display().to_string(), format!("{:#}", error))
}

/// [`CheckpointSink`] writing VTK, PNG, ITK and SVG files.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    sources: BTreeMap<String, PathBuf>,
}

impl DirectorySink {
    /// Sink rooted at `root`. The directory is created on first use.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Input file of every subject, read again for full-resolution output.
    pub fn with_sources(mut self, sources: BTreeMap<String, PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_full_resolution(
        &self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> anyhow::Result<()> {
        let out_dir = dir.join(FULL_RESOLUTION_DIR);
        fs::create_dir_all(&out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;
        transforms
            .par_iter()
            .zip(subject_ids.par_iter())
            .try_for_each(|(params, id)| -> anyhow::Result<()> {
                let source = self
                    .sources
                    .get(id)
                    .ok_or_else(|| anyhow!("no input file recorded for subject {}", id))?;
                let bundle = read_vtk(source)?;
                let moved = bundle.transformed(&params.to_transform());
                write_vtk(out_dir.join(format!("{}.vtk", id)), &moved)
            })
    }
}

impl CheckpointSink for DirectorySink {
    type Preview = Preview;

    fn checkpoint_dir(&mut self, label: &str) -> Result<PathBuf> {
        let dir = self.root.join(label);
        fs::create_dir_all(&dir).map_err(|e| {
            RegistrationError::checkpoint(label, format!("failed to create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    fn materialize(&mut self, bundles: &[FiberBundle], subject_ids: &[String], dir: &Path) -> Result<()> {
        if bundles.len() != subject_ids.len() {
            return Err(RegistrationError::dimension_mismatch(format!(
                "{} bundles for {} subjects",
                bundles.len(),
                subject_ids.len()
            )));
        }
        bundles
            .par_iter()
            .zip(subject_ids.par_iter())
            .try_for_each(|(bundle, id)| write_vtk(dir.join(format!("{}.vtk", id)), bundle))
            .map_err(|e| to_checkpoint_error(dir, e))?;

        let atlas = FiberBundle::new(bundles.iter().flat_map(|b| b.fibers().iter().cloned()).collect());
        write_vtk(dir.join(ATLAS_FILE), &atlas).map_err(|e| to_checkpoint_error(dir, e))
    }

    fn render_preview(&mut self, bundles: &[FiberBundle], sample_count: usize) -> Result<Preview> {
        Ok(Preview::render(bundles, sample_count))
    }

    fn export_transforms(
        &mut self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> Result<()> {
        write_transforms(dir, transforms, subject_ids).map_err(|e| to_checkpoint_error(dir, e))
    }

    fn plot_objective_history(&mut self, history: &[f64], dir: &Path) -> Result<()> {
        write_objective_plot(dir, history).map_err(|e| to_checkpoint_error(dir, e))
    }

    fn materialize_full_resolution(
        &mut self,
        transforms: &[AffineParameters],
        subject_ids: &[String],
        dir: &Path,
    ) -> Result<()> {
        if transforms.len() != subject_ids.len() {
            return Err(RegistrationError::dimension_mismatch(format!(
                "{} transforms for {} subjects",
                transforms.len(),
                subject_ids.len()
            )));
        }
        self.write_full_resolution(transforms, subject_ids, dir)
            .map_err(|e| to_checkpoint_error(dir, e))
    }
}
