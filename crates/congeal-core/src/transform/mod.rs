//! Affine transform parameterisation.
//!
//! Each subject carries a 15-parameter affine transform split into four
//! independently optimisable blocks: rotation, translation, scale and shear.

pub mod params;
pub mod subspace;
pub mod affine;

pub use params::AffineParameters;
pub use subspace::{BlockBounds, Subspace, SubspaceMask};
pub use affine::AffineTransform;
