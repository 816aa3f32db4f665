pub mod error;
pub mod field;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod heightmap;
pub mod interp;
pub mod marching;
pub mod mesh;
pub mod noise;
pub mod plugin;
pub mod settings;
pub mod tables;
pub mod types;
pub mod utils;

pub use field::DensityField;
pub use marching::MarchingCubes;
pub use mesh::TerrainMesh;
pub use plugin::{TerrainParams, TerrainPlugin, TerrainSet, TerrainVolume};
pub use settings::{DensityFieldSettings, ShapeMode};
