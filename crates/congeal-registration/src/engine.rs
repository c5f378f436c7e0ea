//! Registration engine interface.
//!
//! The schedule controller drives an engine through this trait only. The
//! engine owns the registration state (transforms, bandwidth, sample size,
//! subspace mask, objective history); the controller sets its parameters
//! before each `compute()` and never reads back anything except the
//! objective history and the exported transforms.

use congeal_core::{AffineParameters, BlockBounds, FiberBundle, Subspace, SubspaceMask};

use crate::error::Result;

/// Mutable registration state driven by the multiscale schedule.
///
/// Implementations must only change sample size, bandwidth, budgets and
/// bounds through the setters below; `compute()` optimises the transforms
/// within the currently enabled subspace and appends exactly one value to
/// the objective history when it succeeds.
pub trait RegistrationEngine {
    /// Add one subject's fibers. Subjects keep their insertion order.
    fn add_subject(&mut self, bundle: FiberBundle) -> Result<()>;

    /// Number of subjects added so far.
    fn subject_count(&self) -> usize;

    /// Fibers sampled per subject for each objective evaluation.
    fn set_curve_sample_size(&mut self, sample_size: usize);

    /// Kernel bandwidth (sigma) of the fiber similarity.
    fn set_bandwidth(&mut self, sigma: f64);

    /// Solver evaluation budget per `compute()`.
    fn set_iteration_budget(&mut self, budget: usize);

    /// Initial solver step for each parameter block.
    fn set_step_bounds(&mut self, bounds: BlockBounds);

    /// Solver convergence tolerance for each parameter block.
    fn set_tolerance_bounds(&mut self, bounds: BlockBounds);

    /// Replace the free/frozen mask. The previous mask is discarded.
    fn set_subspace_mask(&mut self, mask: SubspaceMask);

    /// The current free/frozen mask.
    fn subspace_mask(&self) -> SubspaceMask;

    /// Run one solver invocation over the enabled subspace.
    ///
    /// Returns the objective value appended to the history.
    fn compute(&mut self) -> Result<f64>;

    /// Objective values, one per successful `compute()`.
    fn objective_history(&self) -> &[f64];

    /// Current transform of every subject, in insertion order.
    fn export_transforms(&self) -> Vec<AffineParameters>;

    fn enable_translation_only(&mut self) {
        self.set_subspace_mask(SubspaceMask::only(Subspace::Translation));
    }

    fn enable_rotation_only(&mut self) {
        self.set_subspace_mask(SubspaceMask::only(Subspace::Rotation));
    }

    fn enable_scale_only(&mut self) {
        self.set_subspace_mask(SubspaceMask::only(Subspace::Scale));
    }

    fn enable_shear_only(&mut self) {
        self.set_subspace_mask(SubspaceMask::only(Subspace::Shear));
    }
}

impl<E: RegistrationEngine + ?Sized> RegistrationEngine for &mut E {
    fn add_subject(&mut self, bundle: FiberBundle) -> Result<()> {
        (**self).add_subject(bundle)
    }

    fn subject_count(&self) -> usize {
        (**self).subject_count()
    }

    fn set_curve_sample_size(&mut self, sample_size: usize) {
        (**self).set_curve_sample_size(sample_size)
    }

    fn set_bandwidth(&mut self, sigma: f64) {
        (**self).set_bandwidth(sigma)
    }

    fn set_iteration_budget(&mut self, budget: usize) {
        (**self).set_iteration_budget(budget)
    }

    fn set_step_bounds(&mut self, bounds: BlockBounds) {
        (**self).set_step_bounds(bounds)
    }

    fn set_tolerance_bounds(&mut self, bounds: BlockBounds) {
        (**self).set_tolerance_bounds(bounds)
    }

    fn set_subspace_mask(&mut self, mask: SubspaceMask) {
        (**self).set_subspace_mask(mask)
    }

    fn subspace_mask(&self) -> SubspaceMask {
        (**self).subspace_mask()
    }

    fn compute(&mut self) -> Result<f64> {
        (**self).compute()
    }

    fn objective_history(&self) -> &[f64] {
        (**self).objective_history()
    }

    fn export_transforms(&self) -> Vec<AffineParameters> {
        (**self).export_transforms()
    }

    fn enable_translation_only(&mut self) {
        (**self).enable_translation_only()
    }

    fn enable_rotation_only(&mut self) {
        (**self).enable_rotation_only()
    }

    fn enable_scale_only(&mut self) {
        (**self).enable_scale_only()
    }

    fn enable_shear_only(&mut self) {
        (**self).enable_shear_only()
    }
}
