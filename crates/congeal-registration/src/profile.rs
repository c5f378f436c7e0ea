//! Stage parameter profiles for the coarse-to-fine schedule.
//!
//! Each [`Stage`] carries fixed step and tolerance bounds. The per-stage
//! sample size, bandwidth, solver budget and step count come from a
//! [`ScheduleConfig`] and the number of subjects being registered.

use congeal_core::{BlockBounds, Subspace};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegistrationError, Result};

/// Number of stages in the schedule.
pub const STAGE_COUNT: usize = 4;

/// One phase of the coarse-to-fine schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Coarse,
    Medium,
    Fine,
    Finest,
}

const RIGID_ORDER: [Subspace; 2] = [Subspace::Translation, Subspace::Rotation];
const AFFINE_ORDER: [Subspace; 4] = [
    Subspace::Translation,
    Subspace::Rotation,
    Subspace::Scale,
    Subspace::Shear,
];

impl Stage {
    /// Stages in execution order.
    pub const ORDER: [Stage; STAGE_COUNT] = [Stage::Coarse, Stage::Medium, Stage::Fine, Stage::Finest];

    /// Zero-based position in [`Stage::ORDER`].
    pub fn index(self) -> usize {
        match self {
            Stage::Coarse => 0,
            Stage::Medium => 1,
            Stage::Fine => 2,
            Stage::Finest => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Coarse => "Coarse",
            Stage::Medium => "Medium",
            Stage::Fine => "Fine",
            Stage::Finest => "Finest",
        }
    }

    /// The last stage of the schedule, whose result is always materialized.
    pub fn is_terminal(self) -> bool {
        self == Stage::Finest
    }

    /// Subspaces optimised, in order, during one step of this stage.
    ///
    /// Coarse only aligns rigidly: scale and shear are not freed until
    /// translation and rotation have been roughly settled.
    pub fn subspace_order(self) -> &'static [Subspace] {
        match self {
            Stage::Coarse => &RIGID_ORDER,
            Stage::Medium | Stage::Fine | Stage::Finest => &AFFINE_ORDER,
        }
    }

    /// Initial solver step per parameter block.
    pub fn step_bounds(self) -> BlockBounds {
        match self {
            Stage::Coarse => BlockBounds::from_degrees(5.0, 5.0, 0.01, 2.0),
            Stage::Medium => BlockBounds::from_degrees(4.0, 4.0, 0.01, 2.0),
            Stage::Fine => BlockBounds::from_degrees(3.0, 3.0, 0.008, 1.5),
            Stage::Finest => BlockBounds::from_degrees(1.0, 1.0, 0.005, 1.0),
        }
    }

    /// Solver convergence tolerance per parameter block.
    pub fn tolerance_bounds(self) -> BlockBounds {
        match self {
            Stage::Coarse => BlockBounds::from_degrees(4.5, 4.5, 0.005, 1.5),
            Stage::Medium => BlockBounds::from_degrees(3.0, 3.0, 0.008, 1.5),
            Stage::Fine => BlockBounds::from_degrees(2.0, 2.0, 0.006, 1.0),
            Stage::Finest => BlockBounds::from_degrees(0.5, 0.5, 0.001, 0.75),
        }
    }

    /// Solver evaluations per subject when no explicit budget is configured.
    pub fn budget_per_subject(self) -> usize {
        match self {
            Stage::Coarse | Stage::Medium => 10,
            Stage::Fine => 15,
            Stage::Finest => 30,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Global inputs from which the stage profiles are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fibers kept per subject (F).
    pub fiber_count: usize,
    /// Fraction of F sampled at each stage; strictly increasing.
    pub sample_fractions: [f64; STAGE_COUNT],
    /// Kernel bandwidth (sigma, mm) at each stage; non-increasing.
    pub bandwidths: [f64; STAGE_COUNT],
    /// Full subspace sweeps per stage.
    pub steps_per_stage: [usize; STAGE_COUNT],
    /// Explicit solver budgets. When absent they are derived from the
    /// subject count.
    pub iteration_budgets: Option<[usize; STAGE_COUNT]>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fiber_count: 300,
            sample_fractions: [0.10, 0.20, 0.30, 0.40],
            bandwidths: [30.0, 10.0, 10.0, 5.0],
            steps_per_stage: [10, 3, 2, 2],
            iteration_budgets: None,
        }
    }
}

impl ScheduleConfig {
    pub fn new(fiber_count: usize) -> Self {
        Self {
            fiber_count,
            ..Default::default()
        }
    }

    pub fn with_sample_fractions(mut self, fractions: [f64; STAGE_COUNT]) -> Self {
        self.sample_fractions = fractions;
        self
    }

    pub fn with_bandwidths(mut self, bandwidths: [f64; STAGE_COUNT]) -> Self {
        self.bandwidths = bandwidths;
        self
    }

    pub fn with_steps(mut self, steps: [usize; STAGE_COUNT]) -> Self {
        self.steps_per_stage = steps;
        self
    }

    /// Use explicit solver budgets instead of deriving them.
    pub fn with_iteration_budgets(mut self, budgets: [usize; STAGE_COUNT]) -> Self {
        self.iteration_budgets = Some(budgets);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fiber_count == 0 {
            return Err(RegistrationError::invalid_configuration(
                "fiber count must be positive",
            ));
        }
        for (stage, &fraction) in Stage::ORDER.iter().zip(&self.sample_fractions) {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "{} sample fraction must lie in (0, 1], got {}",
                    stage, fraction
                )));
            }
        }
        if self.sample_fractions.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RegistrationError::invalid_configuration(format!(
                "sample fractions must be strictly increasing, got {:?}",
                self.sample_fractions
            )));
        }
        for (stage, &sigma) in Stage::ORDER.iter().zip(&self.bandwidths) {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "{} bandwidth must be positive, got {}",
                    stage, sigma
                )));
            }
        }
        if self.bandwidths.windows(2).any(|w| w[1] > w[0]) {
            return Err(RegistrationError::invalid_configuration(format!(
                "bandwidths must be non-increasing, got {:?}",
                self.bandwidths
            )));
        }
        for (stage, &steps) in Stage::ORDER.iter().zip(&self.steps_per_stage) {
            if steps == 0 {
                return Err(RegistrationError::invalid_configuration(format!(
                    "{} needs at least one step",
                    stage
                )));
            }
        }
        if let Some(budgets) = &self.iteration_budgets {
            for (stage, &budget) in Stage::ORDER.iter().zip(budgets) {
                if budget == 0 {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "{} iteration budget must be positive",
                        stage
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Immutable parameterisation of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProfile {
    pub stage: Stage,
    pub step_bounds: BlockBounds,
    pub tolerance_bounds: BlockBounds,
    /// Fibers sampled per subject for each objective evaluation.
    pub sample_size: usize,
    /// Kernel bandwidth (sigma).
    pub bandwidth: f64,
    /// Solver evaluation budget per `compute()` call.
    pub iteration_budget: usize,
    /// Full subspace sweeps.
    pub steps: usize,
}

impl StageProfile {
    /// Number of `compute()` calls this stage performs.
    pub fn compute_calls(&self) -> usize {
        self.steps * self.stage.subspace_order().len()
    }

    /// Check the invariants every profile must satisfy before it is run.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size < 1 {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} sample size must be at least 1",
                self.stage
            )));
        }
        if self.steps < 1 {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} needs at least one step",
                self.stage
            )));
        }
        if !self.step_bounds.is_positive() || !self.tolerance_bounds.is_positive() {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} step and tolerance bounds must be positive",
                self.stage
            )));
        }
        if !self.tolerance_bounds.strictly_below(&self.step_bounds) {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} tolerance bounds {:?} must be strictly below step bounds {:?}",
                self.stage, self.tolerance_bounds, self.step_bounds
            )));
        }
        Ok(())
    }
}

/// Per-stage sample sizes `floor(F * fraction)`.
pub fn derive_sample_sizes(
    fiber_count: usize,
    fractions: &[f64; STAGE_COUNT],
) -> Result<[usize; STAGE_COUNT]> {
    let mut sizes = [0; STAGE_COUNT];
    for (i, (&fraction, stage)) in fractions.iter().zip(Stage::ORDER).enumerate() {
        let size = (fiber_count as f64 * fraction).floor() as usize;
        if size < 1 {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} sample size floor({} x {}) is below 1; request more fibers",
                stage, fiber_count, fraction
            )));
        }
        sizes[i] = size;
    }
    Ok(sizes)
}

/// Default solver budgets `[10N, 10N, 15N, 30N]` for `N` subjects.
pub fn derive_iteration_budgets(dataset_count: usize) -> [usize; STAGE_COUNT] {
    Stage::ORDER.map(|stage| stage.budget_per_subject() * dataset_count)
}

/// The full, ordered set of stage profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    profiles: [StageProfile; STAGE_COUNT],
}

impl Schedule {
    /// Derive every stage profile from the configuration and subject count.
    ///
    /// Pure: identical inputs always produce identical profiles.
    pub fn derive(config: &ScheduleConfig, dataset_count: usize) -> Result<Self> {
        config.validate()?;
        if dataset_count < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "groupwise registration needs at least 2 subjects, got {}",
                dataset_count
            )));
        }

        let sample_sizes = derive_sample_sizes(config.fiber_count, &config.sample_fractions)?;
        let budgets = config
            .iteration_budgets
            .unwrap_or_else(|| derive_iteration_budgets(dataset_count));

        let profiles = Stage::ORDER.map(|stage| {
            let i = stage.index();
            StageProfile {
                stage,
                step_bounds: stage.step_bounds(),
                tolerance_bounds: stage.tolerance_bounds(),
                sample_size: sample_sizes[i],
                bandwidth: config.bandwidths[i],
                iteration_budget: budgets[i],
                steps: config.steps_per_stage[i],
            }
        });
        for profile in &profiles {
            profile.validate()?;
        }
        Ok(Self { profiles })
    }

    pub fn profiles(&self) -> &[StageProfile; STAGE_COUNT] {
        &self.profiles
    }

    pub fn profile(&self, stage: Stage) -> &StageProfile {
        &self.profiles[stage.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageProfile> {
        self.profiles.iter()
    }

    /// Total `compute()` calls over the whole schedule.
    pub fn total_compute_calls(&self) -> usize {
        self.profiles.iter().map(StageProfile::compute_calls).sum()
    }
}
