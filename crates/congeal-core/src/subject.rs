//! Subjects and the immutable subject set.

use serde::{Deserialize, Serialize};

use crate::bundle::FiberBundle;
use crate::error::{CoreError, Result};
use crate::transform::AffineParameters;

/// One subject's tractogram with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub index: usize,
    pub id: String,
    pub bundle: FiberBundle,
}

/// Ordered collection of at least two subjects, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSet {
    subjects: Vec<Subject>,
}

impl SubjectSet {
    /// Build a subject set from parallel lists of bundles and ids.
    pub fn new(bundles: Vec<FiberBundle>, ids: Vec<String>) -> Result<Self> {
        if bundles.len() != ids.len() {
            return Err(CoreError::dimension_mismatch(format!(
                "{} bundles but {} subject ids",
                bundles.len(),
                ids.len()
            )));
        }
        if bundles.len() < 2 {
            return Err(CoreError::TooFewSubjects(bundles.len()));
        }
        let subjects = bundles
            .into_iter()
            .zip(ids)
            .enumerate()
            .map(|(index, (bundle, id))| Subject { index, id, bundle })
            .collect();
        Ok(Self { subjects })
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.subjects.iter().map(|s| s.id.clone()).collect()
    }

    pub fn bundles(&self) -> impl Iterator<Item = &FiberBundle> {
        self.subjects.iter().map(|s| &s.bundle)
    }

    /// Apply one transform per subject and return the aligned bundles.
    pub fn transformed(&self, transforms: &[AffineParameters]) -> Result<Vec<FiberBundle>> {
        if transforms.len() != self.subjects.len() {
            return Err(CoreError::dimension_mismatch(format!(
                "{} transforms for {} subjects",
                transforms.len(),
                self.subjects.len()
            )));
        }
        Ok(self
            .subjects
            .iter()
            .zip(transforms)
            .map(|(s, p)| s.bundle.transformed(&p.to_transform()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{Fiber, Point};
    use crate::transform::Subspace;

    fn bundle(x: f64) -> FiberBundle {
        FiberBundle::new(vec![Fiber::new(vec![
            Point::new(x, 0.0, 0.0),
            Point::new(x, 1.0, 0.0),
        ])])
    }

    #[test]
    fn test_requires_two_subjects() {
        let err = SubjectSet::new(vec![bundle(0.0)], vec!["a".into()]).unwrap_err();
        assert_eq!(err, CoreError::TooFewSubjects(1));
    }

    #[test]
    fn test_mismatched_ids() {
        let err = SubjectSet::new(vec![bundle(0.0), bundle(1.0)], vec!["a".into()]).unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch(_)));
    }

    #[test]
    fn test_indices_follow_input_order() {
        let set = SubjectSet::new(
            vec![bundle(0.0), bundle(1.0), bundle(2.0)],
            vec!["s0".into(), "s1".into(), "s2".into()],
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.subjects()[2].index, 2);
        assert_eq!(set.ids(), vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn test_transformed() {
        let set = SubjectSet::new(vec![bundle(0.0), bundle(1.0)], vec!["a".into(), "b".into()])
            .unwrap();
        let mut shift = AffineParameters::identity();
        shift.set_block(Subspace::Translation, &[10.0, 0.0, 0.0]);
        let out = set
            .transformed(&[AffineParameters::identity(), shift])
            .unwrap();
        assert_eq!(out[0], set.subjects()[0].bundle);
        assert_eq!(out[1].fibers()[0].points()[0], Point::new(11.0, 0.0, 0.0));
        assert!(set.transformed(&[shift]).is_err());
    }
}
