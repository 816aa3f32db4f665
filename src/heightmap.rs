use ndarray::{Array2, Zip};

use crate::{
    error::{Result, TerrainError},
    noise::value_noise,
    types::Value,
};

/// Tunables of a [`Heightmap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightmapSettings {
    pub width: usize,
    pub height: usize,
    pub frequency: Value,
    pub amplitude: Value,
    pub octaves: u32,
    pub persistence: Value,
    pub lacunarity: Value,
    pub seed: u32,
}

impl Default for HeightmapSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            frequency: 1.2,
            amplitude: 8.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 1,
        }
    }
}

impl HeightmapSettings {
    pub fn with_dimensions(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }
}

/// A 2D fBm height grid, `values[[y, x]]`, sampled over `[0, 1)²`.
#[derive(Debug, Clone)]
pub struct Heightmap {
    settings: HeightmapSettings,
    values: Array2<Value>,
}

impl Heightmap {
    /// Allocates a zeroed heightmap. Both dimensions must be non-zero.
    pub fn new(settings: HeightmapSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(TerrainError::InvalidGridSize(
                settings.width.min(settings.height),
            ));
        }
        Ok(Self {
            values: Array2::zeros((settings.height, settings.width)),
            settings,
        })
    }

    /// Recomputes every height in place.
    pub fn regenerate(&mut self) {
        let s = self.settings;
        Zip::indexed(&mut self.values).for_each(|(y, x), value| {
            let u = x as Value / s.width as Value;
            let v = y as Value / s.height as Value;
            let mut amplitude = s.amplitude;
            let mut frequency = s.frequency;
            let mut height = 0.0;
            for _ in 0..s.octaves {
                height += value_noise([u * frequency, v * frequency, 0.0, 0.0], s.seed) * amplitude;
                amplitude *= s.persistence;
                frequency *= s.lacunarity;
            }
            *value = height;
        });
    }

    pub fn settings(&self) -> &HeightmapSettings {
        &self.settings
    }

    pub fn values(&self) -> &Array2<Value> {
        &self.values
    }

    pub fn get(&self, x: usize, y: usize) -> Value {
        self.values[[y, x]]
    }

    /// Row-major index of `(x, y)`.
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        x + y * self.settings.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_dimensions() {
        let settings = HeightmapSettings::default().with_dimensions(0, 4);
        assert!(Heightmap::new(settings).is_err());
    }

    #[test]
    fn rows_are_contiguous() {
        let mut map = Heightmap::new(HeightmapSettings::default().with_dimensions(16, 8)).expect("map");
        map.regenerate();
        let flat = map.values().as_slice().expect("standard layout");
        assert_eq!(flat.len(), 128);
        assert_eq!(flat[map.index_of(5, 3)], map.get(5, 3));
        assert_eq!(map.index_of(0, 1), 16);
    }

    #[test]
    fn heights_are_bounded_by_total_amplitude() {
        let settings = HeightmapSettings::default().with_dimensions(32, 32);
        let mut map = Heightmap::new(settings).expect("map");
        map.regenerate();
        // 8 * (1 + 0.5 + 0.25 + 0.125)
        let bound = 15.0;
        assert!(map.values().iter().all(|h| h.abs() <= bound));
        assert!(map.values().iter().any(|&h| h != 0.0));
    }

    #[test]
    fn seed_changes_the_surface() {
        let base = HeightmapSettings::default().with_dimensions(16, 16);
        let mut a = Heightmap::new(base).expect("map");
        let mut b = Heightmap::new(base.with_seed(2)).expect("map");
        a.regenerate();
        b.regenerate();
        assert_ne!(a.values(), b.values());
    }
}
