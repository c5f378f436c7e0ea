//! Transform-subspace selection.
//!
//! The mask is global engine state, so selecting a subspace and running
//! the solver are paired here: nothing else in the schedule calls
//! `compute()` directly.

use congeal_core::Subspace;

use crate::engine::RegistrationEngine;
use crate::error::Result;

/// Free exactly `subspace` and freeze every other block.
pub fn select_subspace<E: RegistrationEngine + ?Sized>(engine: &mut E, subspace: Subspace) {
    match subspace {
        Subspace::Translation => engine.enable_translation_only(),
        Subspace::Rotation => engine.enable_rotation_only(),
        Subspace::Scale => engine.enable_scale_only(),
        Subspace::Shear => engine.enable_shear_only(),
    }
}

/// Select `subspace`, then run one solver invocation over it.
pub fn run_subspace_step<E: RegistrationEngine + ?Sized>(
    engine: &mut E,
    subspace: Subspace,
) -> Result<f64> {
    select_subspace(engine, subspace);
    debug_assert_eq!(engine.subspace_mask().active(), Some(subspace));
    engine.compute()
}
