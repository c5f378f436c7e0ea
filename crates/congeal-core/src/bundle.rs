//! Fiber bundles (one tractogram per subject).

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fiber::{Fiber, Point};
use crate::transform::AffineTransform;

/// The set of fibers traced for one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiberBundle {
    fibers: Vec<Fiber>,
}

impl FiberBundle {
    pub fn new(fibers: Vec<Fiber>) -> Self {
        Self { fibers }
    }

    pub fn fibers(&self) -> &[Fiber] {
        &self.fibers
    }

    pub fn into_fibers(self) -> Vec<Fiber> {
        self.fibers
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Total number of points over all fibers.
    pub fn point_count(&self) -> usize {
        self.fibers.iter().map(Fiber::len).sum()
    }

    /// Keep only fibers at least `min_length` millimetres long.
    pub fn filter_min_length(&self, min_length: f64) -> Self {
        Self {
            fibers: self
                .fibers
                .iter()
                .filter(|f| f.len() >= 2 && f.length() >= min_length)
                .cloned()
                .collect(),
        }
    }

    /// Randomly keep at most `count` fibers, preserving their relative order.
    pub fn subsample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Self {
        if count >= self.fibers.len() {
            return self.clone();
        }
        let mut picked = index::sample(rng, self.fibers.len(), count).into_vec();
        picked.sort_unstable();
        Self {
            fibers: picked.into_iter().map(|i| self.fibers[i].clone()).collect(),
        }
    }

    /// Resample every fiber to `points_per_fiber` points.
    pub fn resampled(&self, points_per_fiber: usize) -> Result<Self> {
        let fibers = self
            .fibers
            .iter()
            .map(|f| f.resample(points_per_fiber))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fibers })
    }

    /// Apply an affine transform to every fiber.
    pub fn transformed(&self, transform: &AffineTransform) -> Self {
        Self {
            fibers: self.fibers.iter().map(|f| f.transformed(transform)).collect(),
        }
    }

    /// Axis-aligned bounding box `(min, max)`, or `None` for an empty bundle.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut points = self.fibers.iter().flat_map(|f| f.points().iter());
        let first = *points.next()?;
        let (mut lo, mut hi) = (first, first);
        for p in points {
            for k in 0..3 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
        }
        Some((lo, hi))
    }
}

impl From<Vec<Fiber>> for FiberBundle {
    fn from(fibers: Vec<Fiber>) -> Self {
        Self::new(fibers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line(len: f64) -> Fiber {
        Fiber::new(vec![Point::origin(), Point::new(len, 0.0, 0.0)])
    }

    #[test]
    fn test_filter_min_length() {
        let bundle = FiberBundle::new(vec![line(10.0), line(80.0), line(75.0)]);
        let kept = bundle.filter_min_length(75.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_subsample_is_seeded_and_ordered() {
        let bundle = FiberBundle::new((1..=50).map(|i| line(i as f64)).collect());
        let a = bundle.subsample(10, &mut StdRng::seed_from_u64(7));
        let b = bundle.subsample(10, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        let lengths: Vec<f64> = a.fibers().iter().map(Fiber::length).collect();
        assert!(lengths.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_subsample_larger_than_bundle() {
        let bundle = FiberBundle::new(vec![line(1.0), line(2.0)]);
        let kept = bundle.subsample(10, &mut StdRng::seed_from_u64(0));
        assert_eq!(kept, bundle);
    }

    #[test]
    fn test_bounds() {
        let bundle = FiberBundle::new(vec![
            Fiber::new(vec![Point::new(-1.0, 2.0, 0.0), Point::new(3.0, -4.0, 5.0)]),
        ]);
        let (lo, hi) = bundle.bounds().unwrap();
        assert_eq!(lo, Point::new(-1.0, -4.0, 0.0));
        assert_eq!(hi, Point::new(3.0, 2.0, 5.0));
        assert!(FiberBundle::default().bounds().is_none());
    }
}
