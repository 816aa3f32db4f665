use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, TerrainError>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum TerrainError {
    /// Grid edge length below the 2 samples a single cell needs.
    InvalidGridSize(usize),
    /// A flat buffer did not match the requested grid dimensions.
    #[from]
    Shape(ndarray::ShapeError),
    #[from]
    Gpu(GpuError),
}

impl std::error::Error for TerrainError {}

/// Reasons the compute backend could not be brought up or could not finish a frame.
#[derive(Debug, Display, Clone, PartialEq)]
#[display("{self:?}")]
pub enum GpuError {
    NoAdapter(String),
    ComputeUnsupported,
    DeviceRequest(String),
    /// The device rejected the shader or pipeline.
    Validation(String),
    /// The grid needs larger storage buffers or more workgroups than the device allows.
    GridTooLarge { size: usize, limit: u64 },
    BufferMapping(String),
    Poll(String),
    ReadbackMismatch { expected: usize, actual: usize },
}

impl std::error::Error for GpuError {}
