//! Compass (coordinate pattern) search.

use super::trait_::{BoundedOptimizer, BoundedProblem, OptimizationResult, Termination};
use crate::error::{RegistrationError, Result};

/// Coordinate pattern search with per-coordinate step sizes.
///
/// Each sweep tries `x ± step[i]` along every coordinate whose step is not
/// yet below tolerance and keeps the first improvement. A sweep without
/// improvement multiplies every step by `contraction`.
#[derive(Debug, Clone)]
pub struct CompassSearch {
    /// Step reduction factor after an unsuccessful sweep, in (0, 1).
    pub contraction: f64,
}

impl Default for CompassSearch {
    fn default() -> Self {
        Self { contraction: 0.5 }
    }
}

impl CompassSearch {
    pub fn new(contraction: f64) -> Self {
        Self { contraction }
    }
}

impl BoundedOptimizer for CompassSearch {
    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        problem: &BoundedProblem,
    ) -> Result<OptimizationResult> {
        problem.validate()?;
        if !(self.contraction > 0.0 && self.contraction < 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "contraction must lie in (0, 1), got {}",
                self.contraction
            )));
        }

        let mut x = problem.x0.clone();
        problem.clamp(&mut x);
        let mut fx = objective(&x);
        let mut evaluations = 1;
        if !fx.is_finite() {
            return Err(RegistrationError::numerical_instability(format!(
                "objective is {} at the starting point",
                fx
            )));
        }

        let mut step = problem.initial_step.clone();
        let active = |step: &[f64]| -> Vec<usize> {
            (0..step.len())
                .filter(|&i| step[i] >= problem.tolerance[i])
                .collect()
        };

        loop {
            let coords = active(&step);
            if coords.is_empty() {
                return Ok(OptimizationResult {
                    x,
                    value: fx,
                    evaluations,
                    termination: Termination::Converged,
                });
            }

            let mut improved = false;
            'sweep: for i in coords {
                for direction in [1.0, -1.0] {
                    if evaluations >= problem.max_evaluations {
                        return Ok(OptimizationResult {
                            x,
                            value: fx,
                            evaluations,
                            termination: Termination::BudgetExhausted,
                        });
                    }
                    let mut candidate = x.clone();
                    candidate[i] = (x[i] + direction * step[i]).clamp(problem.lower[i], problem.upper[i]);
                    if candidate[i] == x[i] {
                        continue;
                    }
                    let fc = objective(&candidate);
                    evaluations += 1;
                    if fc.is_nan() {
                        return Err(RegistrationError::numerical_instability(format!(
                            "objective is NaN at {:?}",
                            candidate
                        )));
                    }
                    if fc < fx {
                        x = candidate;
                        fx = fc;
                        improved = true;
                        break 'sweep;
                    }
                }
            }

            if !improved {
                for s in step.iter_mut() {
                    *s *= self.contraction;
                }
            }
        }
    }
}
