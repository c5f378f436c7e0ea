//! Raw 15-parameter affine vector.

use serde::{Deserialize, Serialize};

use super::affine::AffineTransform;
use super::subspace::Subspace;
use crate::error::{CoreError, Result};

/// Number of parameters in the affine parameterisation.
pub const PARAMETER_COUNT: usize = 15;

/// Affine transform parameters of one subject.
///
/// Layout: rotation `[0..3]` (radians, about x, y, z), translation `[3..6]`
/// (mm), scale `[6..9]`, shear `[9..15]` (radians; xy, xz, yx, yz, zx, zy).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineParameters {
    values: [f64; PARAMETER_COUNT],
}

impl Default for AffineParameters {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineParameters {
    /// Parameters of the identity transform.
    pub fn identity() -> Self {
        let mut values = [0.0; PARAMETER_COUNT];
        for i in Subspace::Scale.range() {
            values[i] = 1.0;
        }
        Self { values }
    }

    pub fn from_array(values: [f64; PARAMETER_COUNT]) -> Self {
        Self { values }
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; PARAMETER_COUNT] =
            values
                .try_into()
                .map_err(|_| CoreError::InvalidParameters {
                    expected: PARAMETER_COUNT,
                    actual: values.len(),
                })?;
        Ok(Self { values })
    }

    pub fn as_array(&self) -> &[f64; PARAMETER_COUNT] {
        &self.values
    }

    /// The parameters of one block.
    pub fn block(&self, subspace: Subspace) -> &[f64] {
        &self.values[subspace.range()]
    }

    /// Overwrite the parameters of one block.
    ///
    /// # Panics
    /// Panics if `values` does not have the block's dimension.
    pub fn set_block(&mut self, subspace: Subspace, values: &[f64]) {
        self.values[subspace.range()].copy_from_slice(values);
    }

    pub fn rotation(&self) -> [f64; 3] {
        [self.values[0], self.values[1], self.values[2]]
    }

    pub fn translation(&self) -> [f64; 3] {
        [self.values[3], self.values[4], self.values[5]]
    }

    pub fn scale(&self) -> [f64; 3] {
        [self.values[6], self.values[7], self.values[8]]
    }

    pub fn shear(&self) -> [f64; 6] {
        let mut shear = [0.0; 6];
        shear.copy_from_slice(&self.values[9..15]);
        shear
    }

    /// Whether every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Build the point transform described by these parameters.
    pub fn to_transform(&self) -> AffineTransform {
        AffineTransform::from_parameters(self)
    }
}
