use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::Array3;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    error::{Result, VolumeError},
    resolution::Resolution,
    transform::LatticeTransform,
    types::{CoordinateSystem, Point, ScalarField, Value, Vector},
};

/// Everything needed to sample a field into a lattice, short of the field itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeSpec {
    pub resolution: Resolution,
    pub coordinates: CoordinateSystem,
    pub transform: LatticeTransform,
}

impl VolumeSpec {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    /// Like [`new`](VolumeSpec::new), but validates a raw side length first.
    pub fn from_size(size: u32) -> Result<Self> {
        Ok(Self::new(Resolution::try_from(size)?))
    }

    pub fn with_coordinates(mut self, coordinates: CoordinateSystem) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn with_transform(mut self, transform: LatticeTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// A cubic grid of densities, indexed `values[[i, j, k]]` with `k` varying fastest.
///
/// Lattice point `(i, j, k)` lies at
/// `transform(-0.5, -0.5, -0.5) + i·x_inc + j·y_inc + k·z_inc`, where each increment is the
/// transform's linear part applied to a step of `1 / (size - 1)` along one axis. The lattice
/// therefore spans the closed cube from corner to corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    resolution: Resolution,
    values: Array3<Value>,
}

impl Lattice {
    /// Builds a lattice directly from lattice indices.
    pub fn from_fn<F>(resolution: Resolution, f: F) -> Self
    where
        F: FnMut((usize, usize, usize)) -> Value,
    {
        let n = resolution.size();
        Self {
            resolution,
            values: Array3::from_shape_fn((n, n, n), f),
        }
    }

    /// Evaluates `field` at every lattice point described by `spec`, in parallel over `i`.
    pub fn sample(spec: &VolumeSpec, field: &ScalarField) -> Self {
        let sampler = RowSampler::new(spec, field);
        let rows: Vec<Vec<Value>> = (0..sampler.n)
            .into_par_iter()
            .map(|i| sampler.row(i))
            .collect();
        Self::from_rows(spec.resolution, &rows)
    }

    /// Evaluates `field` over the lattice, checking `cancel` before each `i` row.
    ///
    /// Rows along `i` are independent and sampled in parallel with Rayon. Within a row the
    /// sample point is stepped incrementally along `k`:
    ///
    /// ```text
    /// p = origin + i·x_inc + j·y_inc
    /// for k in 0..size { values[i][j][k] = field(p); p += z_inc }
    /// ```
    pub fn sample_cancellable(
        spec: &VolumeSpec,
        field: &ScalarField,
        cancel: &AtomicBool,
    ) -> Result<Self> {
        let sampler = RowSampler::new(spec, field);
        let rows: Option<Vec<Vec<Value>>> = (0..sampler.n)
            .into_par_iter()
            .map(|i| (!cancel.load(Ordering::Relaxed)).then(|| sampler.row(i)))
            .collect();
        let rows = rows.ok_or(VolumeError::Cancelled)?;
        Ok(Self::from_rows(spec.resolution, &rows))
    }

    fn from_rows(resolution: Resolution, rows: &[Vec<Value>]) -> Self {
        let n = resolution.size();
        Self::from_fn(resolution, |(i, j, k)| rows[i][j * n + k])
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn values(&self) -> &Array3<Value> {
        &self.values
    }

    /// Returns the density at lattice point `(i, j, k)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> Value {
        self.values[[i, j, k]]
    }

    /// Iterates `((i, j, k), value)` in sampling order.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize, usize), Value)> + '_ {
        self.values.indexed_iter().map(|(idx, &v)| (idx, v))
    }
}

/// Lattice origin and per-axis increments for one [`VolumeSpec`].
struct RowSampler<'a> {
    field: &'a ScalarField,
    coordinates: CoordinateSystem,
    n: usize,
    origin: Point,
    x_inc: Vector,
    y_inc: Vector,
    z_inc: Vector,
}

impl<'a> RowSampler<'a> {
    fn new(spec: &VolumeSpec, field: &'a ScalarField) -> Self {
        let n = spec.resolution.size();
        let step = 1.0 / (n - 1) as Value;
        let transform = &spec.transform;
        Self {
            field,
            coordinates: spec.coordinates,
            n,
            origin: transform.transform_point(&Point::new(-0.5, -0.5, -0.5)),
            x_inc: transform.transform_vector(&Vector::new(step, 0.0, 0.0)),
            y_inc: transform.transform_vector(&Vector::new(0.0, step, 0.0)),
            z_inc: transform.transform_vector(&Vector::new(0.0, 0.0, step)),
        }
    }

    /// All densities with first index `i`, `j`-major.
    fn row(&self, i: usize) -> Vec<Value> {
        let mut row = Vec::with_capacity(self.n * self.n);
        for j in 0..self.n {
            let mut p = self.origin + self.x_inc * i as Value + self.y_inc * j as Value;
            for _ in 0..self.n {
                row.push((self.field)(self.coordinates.convert(p)));
                p += self.z_inc;
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::UnitQuaternion;

    use super::*;

    #[test]
    fn default_lattice_spans_the_unit_cube() {
        let spec = VolumeSpec::new(Resolution::R16);
        let xs = Lattice::sample(&spec, &|p: Point| p.x + 0.5);
        let zs = Lattice::sample(&spec, &|p: Point| p.z + 0.5);

        assert!(xs.get(0, 7, 3).abs() < 1e-12);
        assert!((xs.get(15, 7, 3) - 1.0).abs() < 1e-12);
        assert!((xs.get(5, 0, 0) - 5.0 / 15.0).abs() < 1e-12);
        // k is the z axis and varies fastest.
        assert!((zs.get(2, 9, 15) - 1.0).abs() < 1e-12);
        assert!((zs.get(2, 9, 6) - 6.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn transform_translation_is_applied_once() {
        let transform = LatticeTransform::from_parts(
            Vector::new(3.0, 0.0, 0.0),
            UnitQuaternion::identity(),
            Vector::new(2.0, 2.0, 2.0),
        )
        .unwrap();
        let spec = VolumeSpec::new(Resolution::R16).with_transform(transform);
        let xs = Lattice::sample(&spec, &|p: Point| p.x);
        let zs = Lattice::sample(&spec, &|p: Point| p.z);

        assert!((xs.get(0, 0, 0) - 2.0).abs() < 1e-12);
        assert!((xs.get(15, 0, 0) - 4.0).abs() < 1e-12);
        assert!((zs.get(0, 0, 15) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spherical_fields_receive_radius_first() {
        let spec = VolumeSpec::new(Resolution::R16).with_coordinates(CoordinateSystem::Spherical);
        let radii = Lattice::sample(&spec, &|p: Point| p.x);
        let corner = (3.0_f64 * 0.25).sqrt();
        assert!((radii.get(0, 0, 0) - corner).abs() < 1e-12);
        assert!((radii.get(15, 15, 15) - corner).abs() < 1e-12);
    }

    #[test]
    fn cancelled_sampling_returns_no_lattice() {
        let cancel = AtomicBool::new(true);
        let spec = VolumeSpec::new(Resolution::R16);
        let result = Lattice::sample_cancellable(&spec, &|_: Point| 1.0, &cancel);
        assert_eq!(result, Err(VolumeError::Cancelled));
    }

    #[test]
    fn uncancelled_sampling_matches_plain_sampling() {
        let spec = VolumeSpec::new(Resolution::R16);
        let field = |p: Point| p.x * 2.0 + p.y - p.z;
        let plain = Lattice::sample(&spec, &field);
        let cancellable = Lattice::sample_cancellable(&spec, &field, &AtomicBool::new(false));
        assert_eq!(cancellable, Ok(plain));
    }

    #[test]
    fn raw_sizes_are_validated_before_sampling() {
        assert_eq!(
            VolumeSpec::from_size(100),
            Err(VolumeError::UnsupportedResolution(100))
        );
    }
}
