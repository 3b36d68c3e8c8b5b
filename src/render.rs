use rayon::{iter::IndexedParallelIterator, iter::ParallelIterator, slice::ParallelSliceMut};

use crate::{
    integrate::shade,
    interp::remap,
    intersect::{contains, cube_interval},
    texture::VolumeTexture,
    types::{Point, Value, Vector},
};

/// A pinhole camera placed in volume-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCamera {
    pub position: Point,
    pub target: Point,
    pub up: Vector,
    /// Vertical field of view in radians.
    pub fov_y: Value,
}

impl Default for ViewCamera {
    fn default() -> Self {
        Self {
            position: Point::new(0.0, 0.0, -2.0),
            target: Point::origin(),
            up: Vector::y(),
            fov_y: std::f64::consts::FRAC_PI_4,
        }
    }
}

impl ViewCamera {
    /// Normalised direction of the ray through pixel `(px, py)` of a `width × height` image.
    pub fn ray_direction(&self, px: usize, py: usize, width: usize, height: usize) -> Vector {
        let (forward, right, up) = self.basis();

        let half_height = (self.fov_y * 0.5).tan();
        let half_width = half_height * width as Value / height as Value;

        let x = remap(px as Value + 0.5, [0.0, width as Value], [-1.0, 1.0]) * half_width;
        let y = remap(py as Value + 0.5, [0.0, height as Value], [1.0, -1.0]) * half_height;

        (forward + right * x + up * y).normalize()
    }

    /// Orthonormal `(forward, right, up)` frame. When `up` is parallel to the view direction
    /// the least aligned world axis stands in for it.
    fn basis(&self) -> (Vector, Vector, Vector) {
        let forward = (self.target - self.position).normalize();
        let right = forward
            .cross(&self.up)
            .try_normalize(1e-9)
            .unwrap_or_else(|| forward.cross(&least_aligned_axis(&forward)).normalize());
        (forward, right, right.cross(&forward))
    }

    /// The cube surface point a rasteriser would shade for this pixel: the entry face seen
    /// from outside, or the exit face seen from inside.
    pub fn surface_point(&self, direction: &Vector) -> Option<Point> {
        let (t_near, t_far) = cube_interval(&self.position, direction)?;
        let t = if contains(&self.position) { t_far } else { t_near };
        Some(self.position + direction * t)
    }
}

fn least_aligned_axis(v: &Vector) -> Vector {
    let a = v.abs();
    if a.x <= a.y && a.x <= a.z {
        Vector::x()
    } else if a.y <= a.z {
        Vector::y()
    } else {
        Vector::z()
    }
}

/// Ray-traces the volume for every pixel of a `width × height` view.
///
/// Returns straight (non-premultiplied) RGBA8 pixels, row 0 at the top. Pixels whose ray
/// misses the cube are left fully transparent. Rows are shaded in parallel.
pub fn render_view(
    texture: &VolumeTexture,
    camera: &ViewCamera,
    intensity: Value,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut pixels = vec![0u8; 4 * width * height];
    if width == 0 || height == 0 {
        return pixels;
    }

    pixels
        .par_chunks_mut(4 * width)
        .enumerate()
        .for_each(|(py, row)| {
            for (px, out) in row.chunks_exact_mut(4).enumerate() {
                let direction = camera.ray_direction(px, py, width, height);
                if let Some(surface) = camera.surface_point(&direction) {
                    let shaded = shade(texture, &camera.position, &surface, intensity);
                    out.copy_from_slice(&shaded.to_rgba8());
                }
            }
        });

    pixels
}
