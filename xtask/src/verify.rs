use anyhow::{bail, Context, Result};
use congeal_io::{parse_itk_transform, read_transforms_json, read_vtk};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

const STAGE_CHECKPOINTS: usize = 4;

const PER_CHECKPOINT: [&str; 5] = [
    "atlas.vtk",
    "view_axial.png",
    "view_sagittal.png",
    "view_coronal.png",
    "transforms.json",
];

const TERMINAL_ONLY: [&str; 2] = ["objective_function.svg", "objective_function.csv"];

fn check_checkpoint(dir: &Path, terminal: bool) -> Result<usize> {
    let mut problems = 0;
    let extra: &[&str] = if terminal { &TERMINAL_ONLY } else { &[] };
    for file in PER_CHECKPOINT.iter().chain(extra) {
        if !dir.join(file).is_file() {
            warn!("{}: missing {}", dir.display(), file);
            problems += 1;
        }
    }
    if !dir.join("transforms.json").is_file() {
        return Ok(problems);
    }

    let records = read_transforms_json(&dir.join("transforms.json"))?;
    for record in &records {
        let vtk = dir.join(format!("{}.vtk", record.id));
        match read_vtk(&vtk) {
            Ok(bundle) if bundle.is_empty() => {
                warn!("{}: no fibers", vtk.display());
                problems += 1;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("{:#}", e);
                problems += 1;
            }
        }

        let tfm = dir.join(format!("{}.tfm", record.id));
        let text = fs::read_to_string(&tfm).with_context(|| format!("Failed to read {}", tfm.display()))?;
        let transform = parse_itk_transform(&text).with_context(|| format!("Failed to parse {}", tfm.display()))?;
        let h = transform.to_homogeneous();
        let max_diff = (0..3)
            .flat_map(|r| (0..4).map(move |c| (r, c)))
            .map(|(r, c)| (h[(r, c)] - record.matrix[r][c]).abs())
            .fold(0.0, f64::max);
        if max_diff > 1e-9 {
            warn!("{}: disagrees with transforms.json by {:e}", tfm.display(), max_diff);
            problems += 1;
        }

        if terminal {
            let full = dir.join("full_resolution").join(format!("{}.vtk", record.id));
            if !full.is_file() {
                warn!("{}: missing", full.display());
                problems += 1;
            }
        }
    }
    info!("{}: {} subjects", dir.display(), records.len());
    Ok(problems)
}

/// Check that a run directory holds the expected checkpoint layout.
pub fn verify_output(output: &Path) -> Result<()> {
    if !output.is_dir() {
        bail!("Output directory does not exist: {}", output.display());
    }
    let mut problems = 0;
    for required in [0, STAGE_CHECKPOINTS] {
        let dir = output.join(format!("iteration_{}", required));
        if !dir.is_dir() {
            warn!("missing checkpoint {}", dir.display());
            problems += 1;
            continue;
        }
        problems += check_checkpoint(&dir, required == STAGE_CHECKPOINTS)?;
    }
    let intermediate: Vec<usize> = (1..STAGE_CHECKPOINTS)
        .filter(|k| output.join(format!("iteration_{}", k)).is_dir())
        .collect();
    match intermediate.len() {
        0 => info!("No intermediate checkpoints (non-verbose run)"),
        n if n == STAGE_CHECKPOINTS - 1 => {
            for k in intermediate {
                problems += check_checkpoint(&output.join(format!("iteration_{}", k)), false)?;
            }
        }
        _ => {
            warn!("Incomplete intermediate checkpoints: {:?}", intermediate);
            problems += 1;
        }
    }

    let files = WalkDir::new(output)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    info!("{} files under {}", files, output.display());

    if problems > 0 {
        bail!("{} problem(s) found in {}", problems, output.display());
    }
    info!("Output layout verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(verify_output(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_empty_run_fails() {
        let dir = tempdir().unwrap();
        assert!(verify_output(dir.path()).is_err());
    }
}
