use nalgebra::{Matrix3, Matrix4, Translation3, UnitQuaternion};

use crate::{
    error::{Result, VolumeError},
    types::{Point, Value, Vector},
};

/// Affine transform applied to the unit sampling cube `[-0.5, 0.5]^3` when a lattice is built.
///
/// It is only used at build time. Shading always treats volume-local space as the canonical
/// unit cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeTransform {
    matrix: Matrix4<Value>,
}

impl Default for LatticeTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl LatticeTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wraps an affine matrix. Projective matrices and matrices with a singular linear part are
    /// rejected.
    pub fn from_matrix(matrix: Matrix4<Value>) -> Result<Self> {
        let affine = matrix[(3, 0)] == 0.0
            && matrix[(3, 1)] == 0.0
            && matrix[(3, 2)] == 0.0
            && matrix[(3, 3)] == 1.0;
        if !affine {
            return Err(VolumeError::DegenerateTransform);
        }
        let det = matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(VolumeError::DegenerateTransform);
        }
        Ok(Self { matrix })
    }

    /// Composes `translation * rotation * scale`, so points are scaled first, then rotated,
    /// then moved.
    pub fn from_parts(
        translation: Vector,
        rotation: UnitQuaternion<Value>,
        scale: Vector,
    ) -> Result<Self> {
        let matrix = Translation3::from(translation).to_homogeneous()
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&scale);
        Self::from_matrix(matrix)
    }

    /// Uniform scale about the origin. `uniform_scale(2.0 * radius)` maps the unit cube onto
    /// `[-radius, radius]^3`.
    pub fn uniform_scale(scale: Value) -> Result<Self> {
        Self::from_matrix(Matrix4::new_scaling(scale))
    }

    pub fn matrix(&self) -> &Matrix4<Value> {
        &self.matrix
    }

    /// Rotation and scale without the translation column.
    pub fn linear(&self) -> Matrix3<Value> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Applies the full transform, translation included.
    #[inline]
    pub fn transform_point(&self, p: &Point) -> Point {
        self.matrix.transform_point(p)
    }

    /// Applies only the linear part. Steps between lattice points go through here so the
    /// translation is never added more than once.
    #[inline]
    pub fn transform_vector(&self, v: &Vector) -> Vector {
        self.linear() * v
    }
}
