//! Stage runner: executes one stage of the schedule to completion.

use std::time::Instant;

use crate::engine::RegistrationEngine;
use crate::error::Result;
use crate::profile::StageProfile;
use crate::progress::{ProgressTracker, StageSummary};
use crate::selector::run_subspace_step;

/// Push a stage's parameters into the engine.
///
/// Must happen before the first `compute()` of the stage.
pub fn apply_profile<E: RegistrationEngine + ?Sized>(engine: &mut E, profile: &StageProfile) {
    engine.set_curve_sample_size(profile.sample_size);
    engine.set_bandwidth(profile.bandwidth);
    engine.set_iteration_budget(profile.iteration_budget);
    engine.set_step_bounds(profile.step_bounds);
    engine.set_tolerance_bounds(profile.tolerance_bounds);
}

/// Run `profile.steps` sweeps over the stage's subspaces.
///
/// Each sweep enables the subspaces of [`Stage::subspace_order`] one at a
/// time and runs the solver once per subspace, so the objective history
/// grows by exactly [`StageProfile::compute_calls`] entries. Engine errors
/// are returned unchanged; the engine keeps whatever state it reached.
///
/// [`Stage::subspace_order`]: crate::profile::Stage::subspace_order
pub fn run_stage<E: RegistrationEngine + ?Sized>(
    engine: &mut E,
    profile: &StageProfile,
    tracker: &mut ProgressTracker,
) -> Result<StageSummary> {
    let start = Instant::now();
    tracker.stage_started(profile);
    apply_profile(engine, profile);

    let mut objective = None;
    for step in 1..=profile.steps {
        tracing::debug!("SCALE: {} {} / {}", profile.stage, step, profile.steps);
        for &subspace in profile.stage.subspace_order() {
            let value = run_subspace_step(engine, subspace)?;
            tracker.step(profile.stage, step, profile.steps, subspace, value);
            objective = Some(value);
        }
    }

    let summary = StageSummary {
        stage: profile.stage,
        elapsed: start.elapsed(),
        compute_calls: profile.compute_calls(),
        objective,
    };
    tracker.stage_completed(&summary);
    Ok(summary)
}
