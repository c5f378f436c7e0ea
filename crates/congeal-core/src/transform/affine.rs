//! Affine point transform built from [`AffineParameters`].

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};

use super::params::AffineParameters;
use crate::fiber::Point;

/// Affine transform `p' = A p + t` with `A = R · Sh · S`.
///
/// * `R` is the rotation from Euler angles (x, then y, then z)
/// * `Sh` is a unit-diagonal shear matrix
/// * `S` is a diagonal scale matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(matrix: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            matrix,
            translation,
        }
    }

    pub fn from_parameters(params: &AffineParameters) -> Self {
        let [rx, ry, rz] = params.rotation();
        let rotation = Rotation3::from_euler_angles(rx, ry, rz).into_inner();

        let [sxy, sxz, syx, syz, szx, szy] = params.shear();
        let shear = Matrix3::new(
            1.0, sxy, sxz, //
            syx, 1.0, syz, //
            szx, szy, 1.0,
        );

        let [kx, ky, kz] = params.scale();
        let scale = Matrix3::from_diagonal(&Vector3::new(kx, ky, kz));

        let [tx, ty, tz] = params.translation();
        Self {
            matrix: rotation * shear * scale,
            translation: Vector3::new(tx, ty, tz),
        }
    }

    /// Linear part `A`.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Translation `t`.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Homogeneous 4x4 form.
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.matrix);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Transform a single point.
    pub fn apply(&self, point: &Point) -> Point {
        Point::from(self.matrix * point.coords + self.translation)
    }

    /// Inverse transform, if the linear part is invertible.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.matrix.try_inverse()?;
        Some(Self {
            matrix: inv,
            translation: -(inv * self.translation),
        })
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}
