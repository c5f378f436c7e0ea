//! Parameter blocks ("subspaces") of the affine transform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One independently optimisable block of the affine parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subspace {
    Translation,
    Rotation,
    Scale,
    Shear,
}

impl Subspace {
    /// All subspaces, in parameter-vector order.
    pub const ALL: [Subspace; 4] = [
        Subspace::Rotation,
        Subspace::Translation,
        Subspace::Scale,
        Subspace::Shear,
    ];

    /// Indices of this block inside [`AffineParameters`](super::AffineParameters).
    pub fn range(self) -> Range<usize> {
        match self {
            Subspace::Rotation => 0..3,
            Subspace::Translation => 3..6,
            Subspace::Scale => 6..9,
            Subspace::Shear => 9..15,
        }
    }

    /// Number of parameters in this block.
    pub fn dimension(self) -> usize {
        self.range().len()
    }

    /// Whether the block composes multiplicatively (scale) rather than additively.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, Subspace::Scale)
    }

    pub fn name(self) -> &'static str {
        match self {
            Subspace::Translation => "translation",
            Subspace::Rotation => "rotation",
            Subspace::Scale => "scale",
            Subspace::Shear => "shear",
        }
    }
}

impl fmt::Display for Subspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which parameter block is free for the next optimisation call.
///
/// At most one block is free at a time; every other block is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubspaceMask {
    active: Option<Subspace>,
}

impl SubspaceMask {
    /// A mask with every block frozen.
    pub fn frozen() -> Self {
        Self { active: None }
    }

    /// A mask with exactly `subspace` free.
    pub fn only(subspace: Subspace) -> Self {
        Self {
            active: Some(subspace),
        }
    }

    /// The free block, if any.
    pub fn active(&self) -> Option<Subspace> {
        self.active
    }

    pub fn is_free(&self, subspace: Subspace) -> bool {
        self.active == Some(subspace)
    }

    /// Per-parameter free flags in parameter-vector order.
    pub fn free_parameters(&self) -> [bool; 15] {
        let mut flags = [false; 15];
        if let Some(subspace) = self.active {
            for i in subspace.range() {
                flags[i] = true;
            }
        }
        flags
    }
}

/// One scalar per parameter block, e.g. a step size or a tolerance.
///
/// Rotation and shear are in radians, translation in millimetres and
/// scale is unitless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockBounds {
    pub rotation: f64,
    pub translation: f64,
    pub scale: f64,
    pub shear: f64,
}

impl BlockBounds {
    pub fn new(rotation: f64, translation: f64, scale: f64, shear: f64) -> Self {
        Self {
            rotation,
            translation,
            scale,
            shear,
        }
    }

    /// Build bounds with the angular components given in degrees.
    pub fn from_degrees(rotation_deg: f64, translation: f64, scale: f64, shear_deg: f64) -> Self {
        Self::new(
            rotation_deg.to_radians(),
            translation,
            scale,
            shear_deg.to_radians(),
        )
    }

    /// The scalar that applies to `subspace`.
    pub fn get(&self, subspace: Subspace) -> f64 {
        match subspace {
            Subspace::Rotation => self.rotation,
            Subspace::Translation => self.translation,
            Subspace::Scale => self.scale,
            Subspace::Shear => self.shear,
        }
    }

    /// Expand to one value per parameter, in parameter-vector order.
    pub fn per_parameter(&self) -> [f64; 15] {
        let mut values = [0.0; 15];
        for subspace in Subspace::ALL {
            for i in subspace.range() {
                values[i] = self.get(subspace);
            }
        }
        values
    }

    /// True when every component is strictly smaller than `other`'s.
    pub fn strictly_below(&self, other: &BlockBounds) -> bool {
        Subspace::ALL
            .iter()
            .all(|&s| self.get(s) < other.get(s))
    }

    /// True when every component is finite and strictly positive.
    pub fn is_positive(&self) -> bool {
        Subspace::ALL
            .iter()
            .all(|&s| self.get(s).is_finite() && self.get(s) > 0.0)
    }
}
