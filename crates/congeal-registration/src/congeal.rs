//! Reference groupwise registration engine ("congealing").
//!
//! Every `compute()` draws a fresh fiber sample per subject, then optimises
//! the enabled parameter block of each subject in turn against the current
//! state of all other subjects. Fiber costs are evaluated in parallel on a
//! dedicated thread pool. After the updates the block is re-centred
//! across the group so the mean transform stays the identity, which keeps
//! the common frame from drifting toward any one subject.

use congeal_core::{AffineParameters, BlockBounds, Fiber, FiberBundle, Subspace, SubspaceMask};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::RegistrationEngine;
use crate::error::{RegistrationError, Result};
use crate::metric::{DistanceMethod, GroupObjective};
use crate::optimizer::{BoundedOptimizer, BoundedProblem, CompassSearch};

/// Box limits on each parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterLimits {
    /// Maximum absolute rotation per axis (radians).
    pub rotation: f64,
    /// Maximum absolute translation per axis (mm).
    pub translation: f64,
    /// Allowed scale range per axis.
    pub scale: (f64, f64),
    /// Maximum absolute shear per component.
    pub shear: f64,
}

impl Default for ParameterLimits {
    fn default() -> Self {
        Self {
            rotation: 45f64.to_radians(),
            translation: 100.0,
            scale: (0.5, 2.0),
            shear: 30f64.to_radians(),
        }
    }
}

impl ParameterLimits {
    /// `(lower, upper)` limits of one parameter block.
    pub fn block(&self, subspace: Subspace) -> (f64, f64) {
        match subspace {
            Subspace::Rotation => (-self.rotation, self.rotation),
            Subspace::Translation => (-self.translation, self.translation),
            Subspace::Scale => self.scale,
            Subspace::Shear => (-self.shear, self.shear),
        }
    }

    fn validate(&self) -> Result<()> {
        let ok = self.rotation > 0.0
            && self.translation > 0.0
            && self.shear > 0.0
            && self.scale.0 > 0.0
            && self.scale.0 < 1.0
            && self.scale.1 > 1.0;
        if !ok {
            return Err(RegistrationError::invalid_configuration(format!(
                "parameter limits must contain the identity: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Settings fixed when the engine is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Worker threads used inside one `compute()`.
    pub parallel_jobs: usize,
    /// Points each fiber is resampled to.
    pub points_per_fiber: usize,
    pub distance_method: DistanceMethod,
    /// Seed of the per-compute fiber sampling.
    pub seed: u64,
    pub limits: ParameterLimits,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            parallel_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            points_per_fiber: 5,
            distance_method: DistanceMethod::Hausdorff,
            seed: 0,
            limits: ParameterLimits::default(),
        }
    }
}

impl EngineSettings {
    pub fn with_parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = jobs;
        self
    }

    pub fn with_points_per_fiber(mut self, points: usize) -> Self {
        self.points_per_fiber = points;
        self
    }

    pub fn with_distance_method(mut self, method: DistanceMethod) -> Self {
        self.distance_method = method;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_limits(mut self, limits: ParameterLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallel_jobs == 0 {
            return Err(RegistrationError::invalid_configuration(
                "parallel jobs must be at least 1",
            ));
        }
        if self.points_per_fiber < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "points per fiber must be at least 2, got {}",
                self.points_per_fiber
            )));
        }
        self.limits.validate()
    }
}

/// Groupwise kernel-entropy registration engine.
pub struct CongealEngine {
    settings: EngineSettings,
    pool: rayon::ThreadPool,
    optimizer: CompassSearch,
    rng: StdRng,
    subjects: Vec<Vec<Fiber>>,
    transforms: Vec<AffineParameters>,
    sample_size: usize,
    sigma: f64,
    iteration_budget: usize,
    step_bounds: BlockBounds,
    tolerance_bounds: BlockBounds,
    mask: SubspaceMask,
    history: Vec<f64>,
}

impl std::fmt::Debug for CongealEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CongealEngine")
            .field("settings", &self.settings)
            .field("subjects", &self.subjects.len())
            .field("sample_size", &self.sample_size)
            .field("sigma", &self.sigma)
            .field("iteration_budget", &self.iteration_budget)
            .field("mask", &self.mask)
            .field("history", &self.history.len())
            .finish()
    }
}

impl CongealEngine {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        let pool = build_pool(settings.parallel_jobs)?;
        Ok(Self {
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            pool,
            optimizer: CompassSearch::default(),
            subjects: Vec::new(),
            transforms: Vec::new(),
            sample_size: 0,
            sigma: 0.0,
            iteration_budget: 0,
            step_bounds: BlockBounds::new(1.0, 1.0, 1.0, 1.0),
            tolerance_bounds: BlockBounds::new(0.1, 0.1, 0.1, 0.1),
            mask: SubspaceMask::frozen(),
            history: Vec::new(),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Change the worker count used by subsequent `compute()` calls.
    pub fn set_parallel_jobs(&mut self, jobs: usize) -> Result<()> {
        if jobs == 0 {
            return Err(RegistrationError::invalid_configuration(
                "parallel jobs must be at least 1",
            ));
        }
        self.pool = build_pool(jobs)?;
        self.settings.parallel_jobs = jobs;
        Ok(())
    }

    /// Change the fiber resampling. Only allowed before subjects are added.
    pub fn set_points_per_fiber(&mut self, points: usize) -> Result<()> {
        if !self.subjects.is_empty() {
            return Err(RegistrationError::invalid_configuration(
                "points per fiber cannot change after subjects were added",
            ));
        }
        if points < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "points per fiber must be at least 2, got {}",
                points
            )));
        }
        self.settings.points_per_fiber = points;
        Ok(())
    }

    pub fn set_distance_method(&mut self, method: DistanceMethod) {
        self.settings.distance_method = method;
    }

    pub fn curve_sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn bandwidth(&self) -> f64 {
        self.sigma
    }

    pub fn iteration_budget(&self) -> usize {
        self.iteration_budget
    }

    pub fn step_bounds(&self) -> BlockBounds {
        self.step_bounds
    }

    pub fn tolerance_bounds(&self) -> BlockBounds {
        self.tolerance_bounds
    }

    fn check_ready(&self) -> Result<Subspace> {
        if self.subjects.len() < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "compute needs at least 2 subjects, have {}",
                self.subjects.len()
            )));
        }
        let subspace = self.mask.active().ok_or_else(|| {
            RegistrationError::invalid_configuration("no subspace enabled before compute")
        })?;
        if self.sample_size == 0 {
            return Err(RegistrationError::invalid_configuration(
                "curve sample size was not set",
            ));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "bandwidth must be positive, got {}",
                self.sigma
            )));
        }
        if self.iteration_budget == 0 {
            return Err(RegistrationError::invalid_configuration(
                "iteration budget was not set",
            ));
        }
        Ok(subspace)
    }

    /// Draw up to `sample_size` untransformed fibers per subject.
    fn draw_samples(&mut self) -> Vec<Vec<Fiber>> {
        let sample_size = self.sample_size;
        let rng = &mut self.rng;
        self.subjects
            .iter()
            .map(|fibers| {
                let amount = sample_size.min(fibers.len());
                let mut picked = index::sample(&mut *rng, fibers.len(), amount).into_vec();
                picked.sort_unstable();
                picked.into_iter().map(|i| fibers[i].clone()).collect()
            })
            .collect()
    }

    fn transformed_samples(samples: &[Vec<Fiber>], transforms: &[AffineParameters]) -> Vec<Vec<Fiber>> {
        samples
            .iter()
            .zip(transforms)
            .map(|(fibers, params)| {
                let t = params.to_transform();
                fibers.iter().map(|f| f.transformed(&t)).collect()
            })
            .collect()
    }

    /// Re-centre one block so the group mean is the identity.
    fn recenter(&mut self, subspace: Subspace) {
        let n = self.transforms.len() as f64;
        let (lo, hi) = self.settings.limits.block(subspace);
        for i in subspace.range() {
            if subspace.is_multiplicative() {
                let log_mean = self
                    .transforms
                    .iter()
                    .map(|p| p.as_array()[i].ln())
                    .sum::<f64>()
                    / n;
                let geo_mean = log_mean.exp();
                for p in &mut self.transforms {
                    let mut values = *p.as_array();
                    values[i] = (values[i] / geo_mean).clamp(lo, hi);
                    *p = AffineParameters::from_array(values);
                }
            } else {
                let mean = self.transforms.iter().map(|p| p.as_array()[i]).sum::<f64>() / n;
                for p in &mut self.transforms {
                    let mut values = *p.as_array();
                    values[i] = (values[i] - mean).clamp(lo, hi);
                    *p = AffineParameters::from_array(values);
                }
            }
        }
    }
}

fn build_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| RegistrationError::engine(format!("failed to build thread pool: {}", e)))
}

impl RegistrationEngine for CongealEngine {
    fn add_subject(&mut self, bundle: FiberBundle) -> Result<()> {
        if bundle.is_empty() {
            return Err(RegistrationError::invalid_configuration(format!(
                "subject {} has no fibers",
                self.subjects.len()
            )));
        }
        let resampled = bundle.resampled(self.settings.points_per_fiber)?;
        self.subjects.push(resampled.into_fibers());
        self.transforms.push(AffineParameters::identity());
        Ok(())
    }

    fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    fn set_curve_sample_size(&mut self, sample_size: usize) {
        self.sample_size = sample_size;
    }

    fn set_bandwidth(&mut self, sigma: f64) {
        self.sigma = sigma;
    }

    fn set_iteration_budget(&mut self, budget: usize) {
        self.iteration_budget = budget;
    }

    fn set_step_bounds(&mut self, bounds: BlockBounds) {
        self.step_bounds = bounds;
    }

    fn set_tolerance_bounds(&mut self, bounds: BlockBounds) {
        self.tolerance_bounds = bounds;
    }

    fn set_subspace_mask(&mut self, mask: SubspaceMask) {
        self.mask = mask;
    }

    fn subspace_mask(&self) -> SubspaceMask {
        self.mask
    }

    fn compute(&mut self) -> Result<f64> {
        let subspace = self.check_ready()?;
        let samples = self.draw_samples();
        let mut current = Self::transformed_samples(&samples, &self.transforms);

        let objective = GroupObjective::new(self.sigma, self.settings.distance_method);
        let dim = subspace.dimension();
        let (lo, hi) = self.settings.limits.block(subspace);
        let step = self.step_bounds.get(subspace);
        let tolerance = self.tolerance_bounds.get(subspace);
        let budget = self.iteration_budget;

        let optimizer = &self.optimizer;
        let transforms = &mut self.transforms;
        // Subjects are updated in turn against the latest state of the
        // others; fiber costs are evaluated on the pool.
        let evaluations = self.pool.install(|| -> Result<usize> {
            let mut evaluations = 0;
            for s in 0..transforms.len() {
                let base = transforms[s];
                let problem = BoundedProblem {
                    x0: base.block(subspace).to_vec(),
                    initial_step: vec![step; dim],
                    tolerance: vec![tolerance; dim],
                    lower: vec![lo; dim],
                    upper: vec![hi; dim],
                    max_evaluations: budget,
                };
                let mut cost = |x: &[f64]| {
                    let mut params = base;
                    params.set_block(subspace, x);
                    let t = params.to_transform();
                    let moved: Vec<Fiber> = samples[s].par_iter().map(|f| f.transformed(&t)).collect();
                    objective.subject(s, &moved, &current)
                };
                let result = optimizer.minimize(&mut cost, &problem)?;
                evaluations += result.evaluations;

                transforms[s].set_block(subspace, &result.x);
                let t = transforms[s].to_transform();
                current[s] = samples[s].iter().map(|f| f.transformed(&t)).collect();
            }
            Ok(evaluations)
        })?;

        self.recenter(subspace);

        let aligned = Self::transformed_samples(&samples, &self.transforms);
        let value = objective.total(&aligned);
        if !value.is_finite() || self.transforms.iter().any(|p| !p.is_finite()) {
            return Err(RegistrationError::numerical_instability(format!(
                "objective became {} after optimising {}",
                value, subspace
            )));
        }

        tracing::debug!(
            "compute #{}: {} objective {:.6} ({} evaluations, sigma {}, {} samples)",
            self.history.len() + 1,
            subspace,
            value,
            evaluations,
            self.sigma,
            self.sample_size
        );
        self.history.push(value);
        Ok(value)
    }

    fn objective_history(&self) -> &[f64] {
        &self.history
    }

    fn export_transforms(&self) -> Vec<AffineParameters> {
        self.transforms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use congeal_core::Point;

    fn arc_bundle(offset: [f64; 3], count: usize) -> FiberBundle {
        let fibers = (0..count)
            .map(|k| {
                let bend = k as f64 * 2.0;
                Fiber::new(
                    (0..10)
                        .map(|i| {
                            let t = i as f64 * 4.0;
                            Point::new(t + offset[0], bend + 0.02 * t * t + offset[1], offset[2] + k as f64)
                        })
                        .collect(),
                )
            })
            .collect();
        FiberBundle::new(fibers)
    }

    fn engine_with(offsets: &[[f64; 3]]) -> CongealEngine {
        let settings = EngineSettings::default()
            .with_parallel_jobs(2)
            .with_distance_method(DistanceMethod::PointWise)
            .with_seed(11);
        let mut engine = CongealEngine::new(settings).unwrap();
        for &offset in offsets {
            engine.add_subject(arc_bundle(offset, 12)).unwrap();
        }
        engine.set_curve_sample_size(12);
        engine.set_bandwidth(10.0);
        engine.set_iteration_budget(200);
        engine.set_step_bounds(BlockBounds::from_degrees(5.0, 4.0, 0.05, 2.0));
        engine.set_tolerance_bounds(BlockBounds::from_degrees(0.5, 0.1, 0.005, 0.5));
        engine
    }

    #[test]
    fn test_settings_validation() {
        assert!(EngineSettings::default().with_parallel_jobs(0).validate().is_err());
        assert!(EngineSettings::default().with_points_per_fiber(1).validate().is_err());
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_compute_requires_subspace() {
        let mut engine = engine_with(&[[0.0; 3], [5.0, 0.0, 0.0]]);
        let err = engine.compute().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
        assert!(engine.objective_history().is_empty());
    }

    #[test]
    fn test_compute_requires_two_subjects() {
        let mut engine = engine_with(&[[0.0; 3]]);
        engine.enable_translation_only();
        assert!(engine.compute().is_err());
    }

    #[test]
    fn test_translation_reduces_misalignment() {
        let mut engine = engine_with(&[[0.0; 3], [6.0, -3.0, 0.0]]);
        engine.enable_translation_only();
        let first = engine.compute().unwrap();
        let second = engine.compute().unwrap();
        assert_eq!(engine.objective_history(), &[first, second]);

        let t = engine.export_transforms();
        // The group is re-centred: translations are opposite.
        for k in 0..3 {
            assert!((t[0].translation()[k] + t[1].translation()[k]).abs() < 1e-9);
        }
        let gap = (t[0].translation()[0] + 0.0) - (t[1].translation()[0] + 6.0);
        assert!(gap.abs() < 6.0, "x gap did not shrink: {}", gap);
        // Frozen blocks stay at identity.
        assert_eq!(t[0].rotation(), [0.0; 3]);
        assert_eq!(t[1].scale(), [1.0; 3]);
    }

    #[test]
    fn test_scale_recentering_is_geometric() {
        let mut engine = engine_with(&[[0.0; 3], [0.0; 3], [1.0, 1.0, 0.0]]);
        engine.enable_scale_only();
        engine.compute().unwrap();
        let t = engine.export_transforms();
        for k in 0..3 {
            let log_sum: f64 = t.iter().map(|p| p.scale()[k].ln()).sum();
            assert!(log_sum.abs() < 1e-9);
        }
    }

    #[test]
    fn test_points_per_fiber_locked_after_add() {
        let mut engine = engine_with(&[[0.0; 3], [1.0, 0.0, 0.0]]);
        assert!(engine.set_points_per_fiber(8).is_err());
        assert!(engine.set_parallel_jobs(1).is_ok());
        assert_eq!(engine.settings().parallel_jobs, 1);
    }

    #[test]
    fn test_compute_is_deterministic_for_a_seed() {
        let run = || {
            let mut engine = engine_with(&[[0.0; 3], [3.0, 2.0, 1.0], [-2.0, 0.0, 1.0]]);
            engine.set_curve_sample_size(5);
            engine.enable_translation_only();
            engine.compute().unwrap();
            engine.enable_rotation_only();
            engine.compute().unwrap();
            engine.export_transforms()
        };
        assert_eq!(run(), run());
    }
}
