//! Decoding of slice-tiled volume textures and the path integral along a camera ray.
//!
//! This is the CPU counterpart of the ray-tracing fragment stage. Texture reads reproduce
//! an 8-bit unorm texture bound with linear filtering and clamp-to-edge addressing, so the
//! numbers here match what the GPU sees.

use crate::{
    interp::mix,
    intersect::{HALF_EXTENT, RaySegment, ray_segment},
    texture::VolumeTexture,
    types::{Point, Value, Vector},
};

/// Number of intervals the integrated segment is split into. `SAMPLE_INTERVALS + 1` points
/// are sampled, whatever the segment length.
pub const SAMPLE_INTERVALS: u32 = 100;

/// Ratio between a decoded density and the density that was encoded.
///
/// Channels arrive normalised by 255 but are recombined in base 256, so a stored density
/// `d` decodes to roughly `d · 256 / 255`.
pub const DECODE_GAIN: Value = 256.0 / 255.0;

/// Recombines four normalised channels as a big-endian base-256 fraction.
#[inline]
pub fn rgba_to_probability(rgba: [Value; 4]) -> Value {
    rgba[0] + rgba[1] / 256.0 + rgba[2] / 65_536.0 + rgba[3] / 16_777_216.0
}

/// Bilinear texture read at normalised `(u, v)`, clamped to the image edge.
pub fn sample_2d(texture: &VolumeTexture, u: Value, v: Value) -> [Value; 4] {
    let size = texture.size();
    let last = (size - 1) as isize;

    let tx = u * size as Value - 0.5;
    let ty = v * size as Value - 0.5;
    let x0 = tx.floor();
    let y0 = ty.floor();
    let fx = tx - x0;
    let fy = ty - y0;

    let fetch = |x: Value, y: Value| {
        let x = (x as isize).clamp(0, last) as usize;
        let y = (y as isize).clamp(0, last) as usize;
        texture.texel(x, y).map(|c| c as Value / 255.0)
    };

    let top = mix(fetch(x0, y0), fetch(x0 + 1.0, y0), fx);
    let bottom = mix(fetch(x0, y0 + 1.0), fetch(x0 + 1.0, y0 + 1.0), fx);
    mix(top, bottom, fy)
}

/// Reads the volume at `coord` in `[0, 1]^3` texture space.
///
/// The two slices around `z` are read from their tiles and blended:
///
/// ```text
/// lower  = floor(z · (size - 1))
/// higher = min(lower + 1, size)
/// ratio  = z · size - lower
/// ```
///
/// `higher` may name the tile one past the last slice, which reads clamped edge texels, and
/// `ratio` may exceed one.
pub fn sample_3d(texture: &VolumeTexture, coord: &Point) -> [Value; 4] {
    let resolution = texture.resolution();
    let size = resolution.size() as Value;
    let per_row = resolution.slices_per_row() as Value;
    let width = texture.size() as Value;

    let z = coord.z.clamp(0.0, 1.0);
    let lower = (z * (size - 1.0)).floor();
    let higher = (lower + 1.0).min(size);
    let ratio = z * size - lower;

    let u = (coord.x.clamp(0.0, 1.0) * (size - 1.0) + 0.5) / width;
    let v = (coord.y.clamp(0.0, 1.0) * (size - 1.0) + 0.5) / width;

    let tile = |slice: Value| ((slice % per_row) / per_row, (slice / per_row).floor() / per_row);

    let (lu, lv) = tile(lower);
    let (hu, hv) = tile(higher);
    mix(
        sample_2d(texture, u + lu, v + lv),
        sample_2d(texture, u + hu, v + hv),
        ratio,
    )
}

/// Decoded density at `coord` in texture space.
#[inline]
pub fn density_at(texture: &VolumeTexture, coord: &Point) -> Value {
    rgba_to_probability(sample_3d(texture, coord))
}

/// Per-ray integration state: the current sample point and the running Riemann sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPathSample {
    pub position: Point,
    pub path_integral: Value,
    pub samples_taken: u32,
    step: Vector,
    spacing: Value,
}

impl RayPathSample {
    /// Starts a march along `segment`, given in volume-local coordinates.
    pub fn new(segment: &RaySegment) -> Self {
        let offset = Vector::repeat(HALF_EXTENT);
        let start = segment.start + offset;
        let end = segment.end + offset;
        let length = (end - start).norm();
        let spacing = length / SAMPLE_INTERVALS as Value;

        let step = if length > 0.0 && length.is_finite() {
            (end - start) / length * spacing
        } else {
            Vector::zeros()
        };

        Self {
            position: start,
            path_integral: 0.0,
            samples_taken: 0,
            step,
            spacing: if length.is_finite() { spacing } else { 0.0 },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.samples_taken > SAMPLE_INTERVALS
    }

    /// Adds one sample to the sum and moves to the next point.
    pub fn advance(&mut self, texture: &VolumeTexture) {
        self.path_integral += self.spacing * density_at(texture, &self.position);
        self.position += self.step;
        self.samples_taken += 1;
    }

    /// Runs the march to completion and returns the sum.
    pub fn integrate(mut self, texture: &VolumeTexture) -> Value {
        if self.spacing == 0.0 {
            return 0.0;
        }
        while !self.is_finished() {
            self.advance(texture);
        }
        self.path_integral
    }
}

/// One-sided Riemann sum of decoded densities over `segment`.
pub fn path_integral(texture: &VolumeTexture, segment: &RaySegment) -> Value {
    RayPathSample::new(segment).integrate(texture)
}

/// Output of the ray-tracing stage for one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaded {
    pub path_integral: Value,
    /// `(0, intensity·integral, 1, intensity·integral)`
    pub color: [Value; 4],
}

impl Shaded {
    /// Alpha equals the scaled integral, so empty regions are fully transparent.
    pub fn alpha(&self) -> Value {
        self.color[3]
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        self.color
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Shades the cube surface fragment at `surface` for a camera at `camera`, both in
/// volume-local coordinates.
pub fn shade(texture: &VolumeTexture, camera: &Point, surface: &Point, intensity: Value) -> Shaded {
    let segment = ray_segment(camera, surface);
    let integral = path_integral(texture, &segment);
    let scaled = intensity * integral;
    Shaded {
        path_integral: integral,
        color: [0.0, scaled, 1.0, scaled],
    }
}
