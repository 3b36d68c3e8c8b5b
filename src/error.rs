use derive_more::Display;

pub type Result<T> = core::result::Result<T, VolumeError>;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum VolumeError {
    /// Lattice side length outside `{16, 64, 256}`.
    #[display("resolution must be 16, 64, or 256 (got {_0})")]
    UnsupportedResolution(u32),
    #[display("invalid quantum numbers n={n}, l={l}, m={m}: {reason}")]
    InvalidQuantumNumbers {
        n: u32,
        l: u32,
        m: i32,
        reason: &'static str,
    },
    /// The lattice transform cannot map the unit cube onto a volume.
    #[display("lattice transform is degenerate")]
    DegenerateTransform,
    #[display("volume build was cancelled")]
    Cancelled,
}

impl std::error::Error for VolumeError {}
