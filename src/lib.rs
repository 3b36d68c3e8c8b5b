pub mod error;
pub mod integrate;
pub mod interp;
pub mod intersect;
pub mod lattice;
pub mod material;
pub mod orbital;
pub mod plugin;
pub mod render;
pub mod resolution;
pub mod texture;
pub mod transform;
pub mod types;
pub mod volume;

pub use plugin::VolumePlugin;
