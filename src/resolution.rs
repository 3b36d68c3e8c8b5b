use crate::error::{Result, VolumeError};

/// Side length of a cubic lattice.
///
/// Only sizes whose square root is an integer tile evenly into a square texture:
///
/// ```text
/// resolution   slices_per_row   texture_size (= resolution^1.5)
///     16             4                 64
///     64             8                512
///    256            16               4096
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    R16,
    #[default]
    R64,
    R256,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::R16, Resolution::R64, Resolution::R256];

    /// Lattice points along one axis.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Resolution::R16 => 16,
            Resolution::R64 => 64,
            Resolution::R256 => 256,
        }
    }

    /// Slices per row (and per column) of the tile grid: `sqrt(size)`.
    #[inline]
    pub const fn slices_per_row(self) -> usize {
        match self {
            Resolution::R16 => 4,
            Resolution::R64 => 8,
            Resolution::R256 => 16,
        }
    }

    /// Side length in texels of the encoded square texture.
    #[inline]
    pub const fn texture_size(self) -> usize {
        self.slices_per_row() * self.size()
    }

    /// Total number of lattice points, which is also the texel count of the texture.
    #[inline]
    pub const fn point_count(self) -> usize {
        self.size() * self.size() * self.size()
    }
}

impl TryFrom<u32> for Resolution {
    type Error = VolumeError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            16 => Ok(Resolution::R16),
            64 => Ok(Resolution::R64),
            256 => Ok(Resolution::R256),
            other => Err(VolumeError::UnsupportedResolution(other)),
        }
    }
}

impl From<Resolution> for u32 {
    fn from(value: Resolution) -> Self {
        value.size() as u32
    }
}
