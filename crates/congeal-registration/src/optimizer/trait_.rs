//! Optimizer trait for bound-constrained parameter search.

use crate::error::{RegistrationError, Result};

/// A box-constrained minimisation problem.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedProblem {
    /// Starting point.
    pub x0: Vec<f64>,
    /// Initial trial step per coordinate.
    pub initial_step: Vec<f64>,
    /// Per-coordinate step below which the search is converged.
    pub tolerance: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Maximum objective evaluations, including the starting point.
    pub max_evaluations: usize,
}

impl BoundedProblem {
    /// Check that every vector has the dimension of `x0` and the box is valid.
    pub fn validate(&self) -> Result<()> {
        let n = self.x0.len();
        for (name, v) in [
            ("initial_step", &self.initial_step),
            ("tolerance", &self.tolerance),
            ("lower", &self.lower),
            ("upper", &self.upper),
        ] {
            if v.len() != n {
                return Err(RegistrationError::dimension_mismatch(format!(
                    "{} has {} entries, expected {}",
                    name,
                    v.len(),
                    n
                )));
            }
        }
        if self.lower.iter().zip(&self.upper).any(|(lo, hi)| lo > hi) {
            return Err(RegistrationError::invalid_configuration(
                "lower bound above upper bound",
            ));
        }
        if self.max_evaluations == 0 {
            return Err(RegistrationError::invalid_configuration(
                "evaluation budget must be positive",
            ));
        }
        Ok(())
    }

    /// Project `x` into the box.
    pub fn clamp(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*lo, *hi);
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every step shrank below its tolerance.
    Converged,
    /// The evaluation budget ran out first.
    BudgetExhausted,
}

/// Outcome of a minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub termination: Termination,
}

/// Derivative-free optimizer over a box.
///
/// Implementations fail with
/// [`RegistrationError::NumericalInstability`] when the objective returns
/// NaN, or a non-finite value at the starting point.
pub trait BoundedOptimizer: Send + Sync {
    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        problem: &BoundedProblem,
    ) -> Result<OptimizationResult>;
}
