use anyhow::{Context, Result};
use congeal_core::{AffineParameters, Fiber, FiberBundle, Point, Subspace};
use congeal_io::write_vtk;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Parameters of a synthetic multi-subject dataset.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub subjects: usize,
    pub fibers: usize,
    pub points: usize,
    pub max_shift: f64,
    pub max_rotation_deg: f64,
    pub max_scale: f64,
    pub seed: u64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            subjects: 4,
            fibers: 500,
            points: 30,
            max_shift: 5.0,
            max_rotation_deg: 5.0,
            max_scale: 0.05,
            seed: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct GroundTruth {
    id: String,
    parameters: Vec<f64>,
}

/// A bundle of curved tracts: arcs fanning out from a common stem.
pub fn template_bundle(options: &SynthOptions, rng: &mut StdRng) -> FiberBundle {
    let fibers = (0..options.fibers)
        .map(|_| {
            let radius = rng.gen_range(40.0..70.0);
            let tilt: f64 = rng.gen_range(-0.6..0.6);
            let sweep: f64 = rng.gen_range(2.0..3.0);
            let jitter = Point::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            let points = (0..options.points)
                .map(|i| {
                    let t = sweep * i as f64 / (options.points - 1).max(1) as f64;
                    Point::new(
                        radius * t.cos() + jitter.x,
                        radius * t.sin() * tilt.cos() + jitter.y,
                        radius * t.sin() * tilt.sin() + jitter.z,
                    )
                })
                .collect();
            Fiber::new(points)
        })
        .collect();
    FiberBundle::new(fibers)
}

/// A random small affine perturbation.
pub fn random_perturbation(options: &SynthOptions, rng: &mut StdRng) -> AffineParameters {
    let max_rot = options.max_rotation_deg.to_radians();
    let mut params = AffineParameters::identity();
    let rotation: Vec<f64> = (0..3).map(|_| rng.gen_range(-max_rot..=max_rot)).collect();
    let translation: Vec<f64> = (0..3)
        .map(|_| rng.gen_range(-options.max_shift..=options.max_shift))
        .collect();
    let scale: Vec<f64> = (0..3)
        .map(|_| 1.0 + rng.gen_range(-options.max_scale..=options.max_scale))
        .collect();
    params.set_block(Subspace::Rotation, &rotation);
    params.set_block(Subspace::Translation, &translation);
    params.set_block(Subspace::Scale, &scale);
    params
}

/// Write `subject_XX.vtk` files and `ground_truth.json` into `output`.
pub fn write_dataset(output: &Path, options: &SynthOptions) -> Result<()> {
    fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let template = template_bundle(options, &mut rng);

    let mut truth = Vec::with_capacity(options.subjects);
    for s in 0..options.subjects {
        let id = format!("subject_{:02}", s);
        let params = random_perturbation(options, &mut rng);
        let bundle = template.transformed(&params.to_transform());
        write_vtk(output.join(format!("{}.vtk", id)), &bundle)?;
        info!("Wrote {} ({} fibers)", id, bundle.len());
        truth.push(GroundTruth {
            id,
            parameters: params.as_array().to_vec(),
        });
    }

    let path = output.join("ground_truth.json");
    fs::write(&path, serde_json::to_string_pretty(&truth)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use congeal_io::read_vtk;
    use tempfile::tempdir;

    #[test]
    fn test_write_dataset() -> Result<()> {
        let dir = tempdir()?;
        let options = SynthOptions {
            subjects: 3,
            fibers: 20,
            ..SynthOptions::default()
        };
        write_dataset(dir.path(), &options)?;
        let bundle = read_vtk(dir.path().join("subject_02.vtk"))?;
        assert_eq!(bundle.len(), 20);
        assert!(bundle.fibers().iter().all(|f| f.length() > 75.0));
        assert!(dir.path().join("ground_truth.json").is_file());
        Ok(())
    }
}
