//! Directory loading and fiber preprocessing.

use anyhow::{bail, Context, Result};
use congeal_core::FiberBundle;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::vtk::read_vtk;

/// Preprocessing applied to every subject on load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Fibers shorter than this (mm) are dropped.
    pub min_length: f64,
    /// At most this many fibers are kept per subject.
    pub max_count: usize,
    /// Seed of the random fiber selection.
    pub seed: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            min_length: 75.0,
            max_count: 300,
            seed: 0,
        }
    }
}

/// Subjects loaded from one input directory, in file-name order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub bundles: Vec<FiberBundle>,
    pub ids: Vec<String>,
    pub sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Input file of each subject id.
    pub fn source_map(&self) -> BTreeMap<String, PathBuf> {
        self.ids
            .iter()
            .cloned()
            .zip(self.sources.iter().cloned())
            .collect()
    }
}

/// List the `.vtk` files of `dir`, sorted by path.
pub fn find_vtk_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("vtk") => files.push(path),
            Some(ext) if ext.eq_ignore_ascii_case("vtp") => {
                tracing::warn!("Skipping {}: XML polydata is not supported", path.display());
            }
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

/// Drop short fibers, then keep a seeded random subset of at most `max_count`.
pub fn preprocess(bundle: &FiberBundle, options: &LoadOptions, rng: &mut StdRng) -> FiberBundle {
    let long = bundle.filter_min_length(options.min_length);
    if long.len() > options.max_count {
        long.subsample(options.max_count, rng)
    } else {
        long
    }
}

/// Load and preprocess every subject in `dir`.
///
/// Subject ids are the file stems. Files are parsed in parallel; the
/// preprocessing of subject `i` uses the seed `options.seed + i`, so the
/// result does not depend on the thread count.
pub fn load_directory<P: AsRef<Path>>(dir: P, options: &LoadOptions) -> Result<Dataset> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!("Input directory {} does not exist", dir.display());
    }
    let files = find_vtk_files(dir)?;
    if files.len() < 2 {
        bail!(
            "Groupwise registration needs at least 2 .vtk subjects, found {} in {}",
            files.len(),
            dir.display()
        );
    }

    let bundles = files
        .par_iter()
        .enumerate()
        .map(|(i, path)| {
            let raw = read_vtk(path)?;
            let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(i as u64));
            let bundle = preprocess(&raw, options, &mut rng);
            tracing::info!(
                "Loaded {}: {} fibers, {} kept",
                path.display(),
                raw.len(),
                bundle.len()
            );
            Ok(bundle)
        })
        .collect::<Result<Vec<_>>>()?;

    let ids: Vec<String> = files
        .iter()
        .map(|p| {
            p.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();

    for (id, bundle) in ids.iter().zip(&bundles) {
        if bundle.is_empty() {
            bail!(
                "Subject {} has no fibers of at least {} mm",
                id,
                options.min_length
            );
        }
    }

    Ok(Dataset {
        bundles,
        ids,
        sources: files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vtk::write_vtk;
    use congeal_core::{Fiber, Point};
    use tempfile::tempdir;

    fn bundle(lengths: &[f64]) -> FiberBundle {
        FiberBundle::new(
            lengths
                .iter()
                .map(|&l| Fiber::new(vec![Point::new(0.0, 0.0, 0.0), Point::new(l, 0.0, 0.0)]))
                .collect(),
        )
    }

    #[test]
    fn test_preprocess_filters_then_subsamples() {
        let options = LoadOptions {
            min_length: 10.0,
            max_count: 2,
            seed: 1,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let out = preprocess(&bundle(&[5.0, 20.0, 30.0, 40.0]), &options, &mut rng);
        assert_eq!(out.len(), 2);
        assert!(out.fibers().iter().all(|f| f.length() >= 10.0));
    }

    #[test]
    fn test_load_directory_sorted_ids() -> Result<()> {
        let dir = tempdir()?;
        write_vtk(dir.path().join("b_subject.vtk"), &bundle(&[100.0, 120.0]))?;
        write_vtk(dir.path().join("a_subject.vtk"), &bundle(&[90.0, 10.0]))?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let options = LoadOptions {
            min_length: 50.0,
            max_count: 10,
            seed: 0,
        };
        let data = load_directory(dir.path(), &options)?;
        assert_eq!(data.ids, vec!["a_subject", "b_subject"]);
        assert_eq!(data.bundles[0].len(), 1);
        assert_eq!(data.bundles[1].len(), 2);
        assert_eq!(data.source_map()["b_subject"], dir.path().join("b_subject.vtk"));
        Ok(())
    }

    #[test]
    fn test_load_directory_needs_two_subjects() -> Result<()> {
        let dir = tempdir()?;
        write_vtk(dir.path().join("only.vtk"), &bundle(&[100.0]))?;
        assert!(load_directory(dir.path(), &LoadOptions::default()).is_err());
        assert!(load_directory(dir.path().join("missing"), &LoadOptions::default()).is_err());
        Ok(())
    }
}
