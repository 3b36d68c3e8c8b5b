use nalgebra::{Point3, Vector3};

/// Scalar field value (a density) at a point in space.
pub type Value = f64;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// A scalar field function: maps a [`Point`] to a density [`Value`].
///
/// The three components are `(x, y, z)` or `(r, θ, φ)` depending on the
/// [`CoordinateSystem`] the lattice is sampled in. Densities are expected in `[0, 1]`;
/// anything outside wraps during fixed-point quantisation.
pub type ScalarField = dyn Fn(Point) -> Value + Send + Sync;

/// Coordinates handed to a [`ScalarField`] while sampling a lattice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// `(x, y, z)` as produced by the lattice transform.
    #[default]
    Cartesian,
    /// `(r, atan2(y, x), acos(z / r))`: radius, azimuth, then polar angle.
    Spherical,
}

impl CoordinateSystem {
    /// Converts a Cartesian sample position into the coordinates this system passes to a field.
    #[inline]
    pub fn convert(self, p: Point) -> Point {
        match self {
            CoordinateSystem::Cartesian => p,
            CoordinateSystem::Spherical => {
                let r = (p.x * p.x + p.y * p.y + p.z * p.z).sqrt();
                Point::new(r, p.y.atan2(p.x), (p.z / r).acos())
            }
        }
    }
}
