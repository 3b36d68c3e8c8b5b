use std::sync::atomic::AtomicBool;

use bevy::platform::time::Instant;
use tracing::{debug, info};

use crate::{
    error::Result,
    lattice::{Lattice, VolumeSpec},
    resolution::Resolution,
    types::{ScalarField, Value},
};

/// Scale between a density in `[0, 1]` and its 32-bit fixed-point representation.
pub const FIXED_POINT_MAX: Value = 4_294_967_295.0;

const FIXED_POINT_MODULUS: Value = 4_294_967_296.0;

/// Quantises a density to 32-bit fixed point: `round(d · (2^32 - 1))`.
///
/// Out-of-range densities wrap modulo `2^32` instead of saturating, and non-finite
/// densities encode as `0`.
#[inline]
pub fn quantize(density: Value) -> u32 {
    let scaled = (density * FIXED_POINT_MAX).round();
    if !scaled.is_finite() {
        return 0;
    }
    scaled.rem_euclid(FIXED_POINT_MODULUS) as u32
}

/// Texel index (not byte offset) of lattice point `(i, j, k)`.
///
/// Slice `k` is the tile at `(k % slices_per_row, k / slices_per_row)` in the tile grid.
/// Inside a tile, `i` runs along the scanline and `j` selects the row:
///
/// ```text
///  texture_size
/// +------+------+------+------+
/// | k=0  | k=1  | k=2  | k=3  |   each tile: size × size texels
/// +------+------+------+------+
/// | k=4  | k=5  | ...  |      |   texel = (tile_x·size + i, tile_y·size + j)
/// +------+------+------+------+
/// ```
#[inline]
pub fn texel_index(resolution: Resolution, i: usize, j: usize, k: usize) -> usize {
    let size = resolution.size();
    let per_row = resolution.slices_per_row();
    let width = resolution.texture_size();

    (k / per_row) * width * size + (k % per_row) * size + j * width + i
}

/// A lattice packed into a square RGBA8 image.
///
/// Each texel stores one density as a big-endian 32-bit fixed-point value:
/// `r` holds the most significant byte and `a` the least.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTexture {
    resolution: Resolution,
    data: Vec<u8>,
}

impl VolumeTexture {
    /// Quantises and tiles `lattice` into a new texture.
    pub fn encode(lattice: &Lattice) -> Self {
        let resolution = lattice.resolution();
        let mut data = vec![0u8; 4 * resolution.point_count()];

        for ((i, j, k), density) in lattice.indexed_iter() {
            let offset = 4 * texel_index(resolution, i, j, k);
            data[offset..offset + 4].copy_from_slice(&quantize(density).to_be_bytes());
        }

        Self { resolution, data }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Side length of the square image in texels.
    pub fn size(&self) -> usize {
        self.resolution.texture_size()
    }

    /// Raw RGBA8 bytes, row-major with row 0 first.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The four channel bytes of texel `(x, y)`.
    #[inline]
    pub fn texel(&self, x: usize, y: usize) -> [u8; 4] {
        let offset = 4 * (y * self.size() + x);
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    /// The fixed-point value stored for lattice point `(i, j, k)`.
    pub fn fixed_point(&self, i: usize, j: usize, k: usize) -> u32 {
        let offset = 4 * texel_index(self.resolution, i, j, k);
        u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// A copy of the image with every alpha byte set to 255, for looking at the tiling.
    pub fn preview_rgba(&self) -> Vec<u8> {
        let mut pixels = self.data.clone();
        for texel in pixels.chunks_exact_mut(4) {
            texel[3] = u8::MAX;
        }
        pixels
    }
}

/// Samples `field` as described by `spec` and encodes the result.
pub fn build_volume(spec: &VolumeSpec, field: &ScalarField) -> VolumeTexture {
    let start = Instant::now();
    let lattice = Lattice::sample(spec, field);
    let texture = VolumeTexture::encode(&lattice);
    log_built(spec, &texture, start);
    texture
}

/// Like [`build_volume`], but gives up with [`VolumeError::Cancelled`](crate::error::VolumeError::Cancelled)
/// once `cancel` is set.
pub fn build_volume_cancellable(
    spec: &VolumeSpec,
    field: &ScalarField,
    cancel: &AtomicBool,
) -> Result<VolumeTexture> {
    let start = Instant::now();
    let lattice = Lattice::sample_cancellable(spec, field, cancel).inspect_err(|_| {
        debug!(resolution = spec.resolution.size(), "volume build cancelled");
    })?;
    let texture = VolumeTexture::encode(&lattice);
    log_built(spec, &texture, start);
    Ok(texture)
}

fn log_built(spec: &VolumeSpec, texture: &VolumeTexture, start: Instant) {
    info!(
        resolution = spec.resolution.size(),
        coordinates = ?spec.coordinates,
        texture_size = texture.size(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "volume texture built"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::types::Point;

    #[test]
    fn quantize_covers_the_full_range() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), u32::MAX);
        assert_eq!(quantize(0.5), 2_147_483_648);
    }

    #[test]
    fn quantize_wraps_out_of_range_densities() {
        assert_eq!(quantize(Value::NAN), 0);
        assert_eq!(quantize(Value::INFINITY), 0);
        assert_eq!(quantize(-1.0), 1);
        assert_eq!(quantize(2.0), u32::MAX - 1);
    }

    #[test]
    fn every_lattice_point_maps_to_a_unique_texel() {
        for resolution in [Resolution::R16, Resolution::R64] {
            let n = resolution.size();
            let mut seen = HashSet::with_capacity(resolution.point_count());
            for i in 0..n {
                for j in 0..n {
                    for k in 0..n {
                        let index = texel_index(resolution, i, j, k);
                        assert!(index < resolution.point_count());
                        assert!(seen.insert(index), "collision at ({i}, {j}, {k})");
                    }
                }
            }
            assert_eq!(seen.len(), resolution.point_count());
        }
    }

    #[test]
    fn largest_resolution_tiles_stay_in_bounds() {
        let resolution = Resolution::R256;
        let n = resolution.size();
        let last = texel_index(resolution, n - 1, n - 1, n - 1);
        assert_eq!(last, resolution.point_count() - 1);
        assert_eq!(texel_index(resolution, 0, 0, 0), 0);
        // Slice 16 starts the second row of tiles.
        assert_eq!(texel_index(resolution, 0, 0, 16), 4096 * 256);
    }

    #[test]
    fn slices_land_in_their_tiles() {
        let resolution = Resolution::R16;
        // k = 5 sits at tile (1, 1); i = 2, j = 3 inside it.
        assert_eq!(texel_index(resolution, 2, 3, 5), (16 + 3) * 64 + 16 + 2);
    }

    #[test]
    fn encoding_is_big_endian() {
        let lattice = Lattice::from_fn(Resolution::R16, |(i, j, k)| {
            if (i, j, k) == (1, 2, 3) { 0.5 } else { 0.0 }
        });
        let texture = VolumeTexture::encode(&lattice);
        assert_eq!(texture.data().len(), 4 * 64 * 64);
        assert_eq!(texture.fixed_point(1, 2, 3), 0x8000_0000);

        // Slice 3 is tile (3, 0); texel (3·16 + 1, 2).
        assert_eq!(texture.texel(49, 2), [0x80, 0, 0, 0]);
    }

    #[test]
    fn preview_forces_opaque_alpha() {
        let texture = build_volume(&VolumeSpec::new(Resolution::R16), &|_: Point| 0.0);
        let preview = texture.preview_rgba();
        assert_eq!(preview.len(), texture.data().len());
        assert!(preview.chunks_exact(4).all(|t| t == [0, 0, 0, 255]));
    }
}
