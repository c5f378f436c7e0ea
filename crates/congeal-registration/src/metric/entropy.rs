//! Groupwise kernel-entropy objective.
//!
//! Each fiber of a subject is scored by the kernel density of the other
//! subjects' fibers around it; a subject's cost is the mean negative log
//! density of its fibers. Lower is better aligned.

use congeal_core::Fiber;
use rayon::prelude::*;

use super::distance::{fiber_distance, DistanceMethod};

/// Added to densities before taking the log.
const DENSITY_FLOOR: f64 = 1e-20;

/// Gaussian-like similarity `exp(-d² / σ²)`.
pub fn kernel(distance: f64, sigma: f64) -> f64 {
    (-(distance * distance) / (sigma * sigma)).exp()
}

/// Mean negative log density of `fibers` under the other subjects' fibers.
///
/// Returns 0 when `fibers` is empty and the maximal cost when there is
/// nothing to compare against.
pub fn subject_cost(fibers: &[Fiber], others: &[&[Fiber]], sigma: f64, method: DistanceMethod) -> f64 {
    if fibers.is_empty() {
        return 0.0;
    }
    let reference: usize = others.iter().map(|o| o.len()).sum();
    if reference == 0 {
        return -DENSITY_FLOOR.ln();
    }

    // Collected in order so the sum does not depend on the thread count.
    let costs: Vec<f64> = fibers
        .par_iter()
        .map(|f| {
            let density: f64 = others
                .iter()
                .flat_map(|o| o.iter())
                .map(|g| kernel(fiber_distance(f, g, method), sigma))
                .sum::<f64>()
                / reference as f64;
            -(density + DENSITY_FLOOR).ln()
        })
        .collect();
    costs.iter().sum::<f64>() / fibers.len() as f64
}

/// Groupwise objective over per-subject fiber samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupObjective {
    pub sigma: f64,
    pub method: DistanceMethod,
}

impl GroupObjective {
    pub fn new(sigma: f64, method: DistanceMethod) -> Self {
        Self { sigma, method }
    }

    /// Cost of subject `index` against every other subject in `samples`.
    pub fn subject(&self, index: usize, fibers: &[Fiber], samples: &[Vec<Fiber>]) -> f64 {
        let others: Vec<&[Fiber]> = samples
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, s)| s.as_slice())
            .collect();
        subject_cost(fibers, &others, self.sigma, self.method)
    }

    /// Sum of subject costs.
    pub fn total(&self, samples: &[Vec<Fiber>]) -> f64 {
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| self.subject(i, s, samples))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use congeal_core::Point;

    fn line(offset: f64) -> Fiber {
        Fiber::new((0..5).map(|i| Point::new(i as f64, offset, 0.0)).collect())
    }

    #[test]
    fn test_kernel() {
        assert_eq!(kernel(0.0, 10.0), 1.0);
        assert!((kernel(10.0, 10.0) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_identical_subjects_have_zero_cost() {
        let a = vec![line(0.0)];
        let b = vec![line(0.0)];
        let cost = subject_cost(&a, &[&b], 5.0, DistanceMethod::Hausdorff);
        assert!(cost.abs() < 1e-12);
    }

    #[test]
    fn test_cost_grows_with_misalignment() {
        let objective = GroupObjective::new(5.0, DistanceMethod::PointWise);
        let near = vec![vec![line(0.0)], vec![line(1.0)]];
        let far = vec![vec![line(0.0)], vec![line(8.0)]];
        assert!(objective.total(&near) < objective.total(&far));
    }

    #[test]
    fn test_empty_reference_is_maximal() {
        let a = vec![line(0.0)];
        let cost = subject_cost(&a, &[], 5.0, DistanceMethod::Hausdorff);
        assert!(cost > 40.0);
        assert_eq!(subject_cost(&[], &[&a], 5.0, DistanceMethod::Hausdorff), 0.0);
    }
}
