use crate::types::Value;

/// Radius of the reference sphere, in normalised field units.
pub const DEFAULT_SPHERE_RADIUS: Value = 0.35;

/// Tunables of the density field.
///
/// Every field except [`size`](DensityFieldSettings::size) may be changed between frames
/// and takes effect on the next regeneration. Changing `size` requires a new
/// [`DensityField`](crate::field::DensityField).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityFieldSettings {
    /// Samples per axis (the field holds `size³` values).
    pub size: usize,
    /// Base noise frequency applied to normalised positions.
    pub frequency: Value,
    /// Amplitude of the first octave.
    pub amplitude: Value,
    /// Number of fBm layers.
    pub octaves: u32,
    /// Amplitude multiplier applied after each octave.
    pub persistence: Value,
    /// Frequency multiplier applied after each octave.
    pub lacunarity: Value,
    /// Exponent of the ridge fold; values below 1 widen the peaks.
    pub ridge_sharpness: Value,
    /// Speed of the noise along its time axis.
    pub time_scale: Value,
    /// Seed of the noise lattice hash.
    pub seed: u32,
}

impl Default for DensityFieldSettings {
    fn default() -> Self {
        Self {
            size: 48,
            frequency: 0.1,
            amplitude: 1.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            ridge_sharpness: 0.6,
            time_scale: 0.35,
            seed: 0,
        }
    }
}

impl DensityFieldSettings {
    /// Sets the number of samples per axis.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the base noise frequency.
    pub fn with_frequency(mut self, frequency: Value) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sets the number of fBm octaves.
    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves;
        self
    }

    /// Sets the noise lattice seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }
}

/// Shape the density field evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ShapeMode {
    /// Ridged fBm terrain over a vertical gradient.
    #[default]
    Terrain,
    /// Signed distance to a sphere centred in the grid; a noise-free reference shape.
    Sphere { radius: Value },
}

impl ShapeMode {
    /// The reference sphere with [`DEFAULT_SPHERE_RADIUS`].
    pub fn sphere() -> Self {
        ShapeMode::Sphere {
            radius: DEFAULT_SPHERE_RADIUS,
        }
    }

    /// Flips between terrain and the default sphere.
    pub fn toggled(self) -> Self {
        match self {
            ShapeMode::Terrain => ShapeMode::sphere(),
            ShapeMode::Sphere { .. } => ShapeMode::Terrain,
        }
    }
}
