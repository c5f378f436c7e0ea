//! Fiber (streamline) representation.
//!
//! A fiber is an ordered 3-D polyline in physical (millimetre) coordinates.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::transform::AffineTransform;

/// A point in physical space, in millimetres.
pub type Point = Point3<f64>;

/// An ordered polyline traced through white matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    points: Vec<Point>,
}

impl Fiber {
    /// Create a fiber from its points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Points along the fiber, in tracing order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Arc length of the polyline in millimetres.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .sum()
    }

    /// The same fiber traced in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Resample to `count` points spaced equally along the arc length.
    ///
    /// The first and last points are preserved. A fiber with zero length
    /// resamples to `count` copies of its first point.
    pub fn resample(&self, count: usize) -> Result<Self> {
        if self.points.len() < 2 {
            return Err(CoreError::degenerate_fiber(format!(
                "cannot resample a fiber with {} point(s)",
                self.points.len()
            )));
        }
        if count < 2 {
            return Err(CoreError::degenerate_fiber(format!(
                "resampling needs at least 2 output points, got {}",
                count
            )));
        }

        let mut cumulative = Vec::with_capacity(self.points.len());
        cumulative.push(0.0);
        for w in self.points.windows(2) {
            let last = *cumulative.last().unwrap_or(&0.0);
            cumulative.push(last + (w[1] - w[0]).norm());
        }
        let total = *cumulative.last().unwrap_or(&0.0);
        if total <= f64::EPSILON {
            return Ok(Self {
                points: vec![self.points[0]; count],
            });
        }

        let mut resampled = Vec::with_capacity(count);
        let mut segment = 0;
        for k in 0..count {
            let target = total * k as f64 / (count - 1) as f64;
            while segment + 2 < cumulative.len() && cumulative[segment + 1] < target {
                segment += 1;
            }
            let span = cumulative[segment + 1] - cumulative[segment];
            let t = if span > 0.0 {
                ((target - cumulative[segment]) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let a = self.points[segment];
            let b = self.points[segment + 1];
            resampled.push(a + (b - a) * t);
        }

        Ok(Self { points: resampled })
    }

    /// Apply an affine transform to every point.
    pub fn transformed(&self, transform: &AffineTransform) -> Self {
        Self {
            points: self.points.iter().map(|p| transform.apply(p)).collect(),
        }
    }
}

impl From<Vec<Point>> for Fiber {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(n: usize, step: f64) -> Fiber {
        Fiber::new((0..n).map(|i| Point::new(i as f64 * step, 0.0, 0.0)).collect())
    }

    #[test]
    fn test_length() {
        let fiber = straight(11, 1.0);
        assert!((fiber.length() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_keeps_endpoints() {
        let fiber = Fiber::new(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(3.0, 0.0, 0.0),
            Point::new(3.0, 4.0, 0.0),
        ]);
        let resampled = fiber.resample(5).unwrap();
        assert_eq!(resampled.len(), 5);
        assert_eq!(resampled.points()[0], fiber.points()[0]);
        let last = resampled.points()[4];
        assert!((last - Point::new(3.0, 4.0, 0.0)).norm() < 1e-12);
        // total length 7, spacing 1.75: third point sits 0.5 past the corner
        let mid = resampled.points()[2];
        assert!((mid - Point::new(3.0, 0.5, 0.0)).norm() < 1e-12, "got {:?}", mid);
    }

    #[test]
    fn test_resample_rejects_degenerate() {
        let fiber = Fiber::new(vec![Point::origin()]);
        assert!(fiber.resample(5).is_err());
        assert!(straight(4, 1.0).resample(1).is_err());
    }

    #[test]
    fn test_resample_zero_length() {
        let fiber = Fiber::new(vec![Point::new(1.0, 2.0, 3.0); 3]);
        let resampled = fiber.resample(4).unwrap();
        assert!(resampled.points().iter().all(|p| *p == Point::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_reversed() {
        let fiber = straight(3, 2.0);
        let rev = fiber.reversed();
        assert_eq!(rev.points()[0], Point::new(4.0, 0.0, 0.0));
        assert_eq!(rev.points()[2], Point::origin());
    }
}
