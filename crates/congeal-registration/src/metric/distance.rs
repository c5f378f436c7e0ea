//! Fiber-to-fiber distances.

use congeal_core::{Fiber, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How two fibers are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMethod {
    /// Symmetric Hausdorff distance between the point sets.
    #[default]
    Hausdorff,
    /// Mean of the two directed mean-closest-point distances.
    MeanClosestPoint,
    /// Mean distance between corresponding points, taking the better of the
    /// two fiber orientations. Requires equal point counts; otherwise falls
    /// back to [`DistanceMethod::MeanClosestPoint`].
    PointWise,
}

impl DistanceMethod {
    pub fn name(self) -> &'static str {
        match self {
            DistanceMethod::Hausdorff => "hausdorff",
            DistanceMethod::MeanClosestPoint => "mean-closest-point",
            DistanceMethod::PointWise => "pointwise",
        }
    }
}

impl fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hausdorff" => Ok(DistanceMethod::Hausdorff),
            "mean-closest-point" | "mcp" | "meanclosestpoint" => Ok(DistanceMethod::MeanClosestPoint),
            "pointwise" | "mean" => Ok(DistanceMethod::PointWise),
            other => Err(format!("unknown distance method: {}", other)),
        }
    }
}

/// Distance between two fibers in millimetres.
pub fn fiber_distance(a: &Fiber, b: &Fiber, method: DistanceMethod) -> f64 {
    match method {
        DistanceMethod::Hausdorff => {
            directed_max_closest(a.points(), b.points()).max(directed_max_closest(b.points(), a.points()))
        }
        DistanceMethod::MeanClosestPoint => mean_closest_point(a.points(), b.points()),
        DistanceMethod::PointWise => {
            if a.len() != b.len() || a.is_empty() {
                return mean_closest_point(a.points(), b.points());
            }
            let n = a.len() as f64;
            let forward: f64 = a
                .points()
                .iter()
                .zip(b.points())
                .map(|(p, q)| (p - q).norm())
                .sum();
            let backward: f64 = a
                .points()
                .iter()
                .zip(b.points().iter().rev())
                .map(|(p, q)| (p - q).norm())
                .sum();
            forward.min(backward) / n
        }
    }
}

fn closest(p: &Point, to: &[Point]) -> f64 {
    to.iter()
        .map(|q| (p - q).norm_squared())
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}

fn directed_max_closest(from: &[Point], to: &[Point]) -> f64 {
    from.iter().map(|p| closest(p, to)).fold(0.0, f64::max)
}

fn directed_mean_closest(from: &[Point], to: &[Point]) -> f64 {
    if from.is_empty() {
        return f64::INFINITY;
    }
    from.iter().map(|p| closest(p, to)).sum::<f64>() / from.len() as f64
}

fn mean_closest_point(a: &[Point], b: &[Point]) -> f64 {
    0.5 * (directed_mean_closest(a, b) + directed_mean_closest(b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(offset: f64, n: usize) -> Fiber {
        Fiber::new((0..n).map(|i| Point::new(i as f64, offset, 0.0)).collect())
    }

    #[test]
    fn test_parallel_lines() {
        let a = line(0.0, 5);
        let b = line(2.0, 5);
        for method in [
            DistanceMethod::Hausdorff,
            DistanceMethod::MeanClosestPoint,
            DistanceMethod::PointWise,
        ] {
            let d = fiber_distance(&a, &b, method);
            assert!((d - 2.0).abs() < 1e-12, "{}: {}", method, d);
        }
    }

    #[test]
    fn test_pointwise_ignores_orientation() {
        let a = line(0.0, 5);
        let b = a.reversed();
        assert!(fiber_distance(&a, &b, DistanceMethod::PointWise) < 1e-12);
    }

    #[test]
    fn test_hausdorff_dominates_mean() {
        let a = line(0.0, 5);
        let b = Fiber::new(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(3.0, 0.0, 0.0),
            Point::new(4.0, 6.0, 0.0),
        ]);
        let h = fiber_distance(&a, &b, DistanceMethod::Hausdorff);
        let m = fiber_distance(&a, &b, DistanceMethod::MeanClosestPoint);
        assert!((h - 6.0).abs() < 1e-12);
        assert!(m < h);
    }

    #[test]
    fn test_symmetry() {
        let a = line(0.0, 4);
        let b = Fiber::new(vec![Point::new(0.5, 1.0, 2.0), Point::new(9.0, -1.0, 0.0)]);
        for method in [DistanceMethod::Hausdorff, DistanceMethod::MeanClosestPoint] {
            let ab = fiber_distance(&a, &b, method);
            let ba = fiber_distance(&b, &a, method);
            assert!((ab - ba).abs() < 1e-12);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("Hausdorff".parse::<DistanceMethod>(), Ok(DistanceMethod::Hausdorff));
        assert_eq!("mean".parse::<DistanceMethod>(), Ok(DistanceMethod::PointWise));
        assert!("euclid".parse::<DistanceMethod>().is_err());
    }
}
