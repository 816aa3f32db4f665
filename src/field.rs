use ndarray::{Array3, Zip};
use tracing::{debug, warn};

use crate::{
    error::{Result, TerrainError},
    noise::density,
    settings::{DensityFieldSettings, ShapeMode},
    types::Value,
    utils::cell_position,
};

/// Evaluates the density field on an accelerator device.
///
/// Implementations must fill `out` with the same values [`DensityField`]'s CPU path
/// would produce, up to floating-point evaluation order.
pub trait DensityBackend: Send + Sync {
    fn evaluate(
        &mut self,
        settings: &DensityFieldSettings,
        mode: ShapeMode,
        time: Value,
        out: &mut Array3<Value>,
    ) -> Result<()>;
}

/// Where [`DensityField::generate`] evaluates.
pub enum BackendStatus {
    /// No accelerator was requested; the CPU path runs.
    Uninitialized,
    /// Every frame is evaluated by the accelerator.
    Active(Box<dyn DensityBackend>),
    /// The accelerator failed once and is never tried again for this field.
    PermanentlyUnavailable,
}

/// Field-free view of [`BackendStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Accelerated,
    Unavailable,
}

/// A cubic grid of density samples, regenerated in place every frame.
///
/// Values are stored as `values[[z, y, x]]`; in memory this is the linear layout
/// `x + size * (y + size * z)` that [`MarchingCubes`](crate::marching::MarchingCubes)
/// and the compute shader share.
pub struct DensityField {
    settings: DensityFieldSettings,
    size: usize,
    values: Array3<Value>,
    mode: ShapeMode,
    backend: BackendStatus,
}

impl DensityField {
    /// Allocates a CPU-evaluated field of `settings.size³` samples, all `0.0`.
    ///
    /// Fails with [`TerrainError::InvalidGridSize`] for sizes below 2, before
    /// allocating anything.
    pub fn new(settings: DensityFieldSettings, mode: ShapeMode) -> Result<Self> {
        let size = settings.size;
        if size < 2 {
            return Err(TerrainError::InvalidGridSize(size));
        }
        Ok(Self {
            settings,
            size,
            values: Array3::zeros((size, size, size)),
            mode,
            backend: BackendStatus::Uninitialized,
        })
    }

    /// Tries to bring up an accelerator with `init`.
    ///
    /// Failure is not an error: the field marks its backend as permanently
    /// unavailable and keeps evaluating on the CPU.
    pub fn with_backend<B, F>(mut self, init: F) -> Self
    where
        B: DensityBackend + 'static,
        F: FnOnce(&DensityFieldSettings) -> Result<B>,
    {
        if !matches!(self.backend, BackendStatus::Uninitialized) {
            return self;
        }
        self.backend = match init(&self.settings) {
            Ok(backend) => {
                debug!("density backend active for {}³ field", self.size);
                BackendStatus::Active(Box::new(backend))
            }
            Err(err) => {
                warn!("density backend unavailable, using CPU: {err}");
                BackendStatus::PermanentlyUnavailable
            }
        };
        self
    }

    /// Evaluates on the GPU when a compute-capable adapter is present.
    #[cfg(feature = "gpu")]
    pub fn with_gpu(self) -> Self {
        self.with_backend(crate::gpu::GpuDensityBackend::new)
    }

    /// Regenerates every sample for `elapsed` seconds in shape `mode`.
    ///
    /// Never fails: an accelerator error degrades this field to the CPU for good
    /// and the frame is evaluated on the CPU instead.
    pub fn generate(&mut self, elapsed: Value, mode: ShapeMode) {
        self.mode = mode;

        if let BackendStatus::Active(backend) = &mut self.backend {
            match backend.evaluate(&self.settings, mode, elapsed, &mut self.values) {
                Ok(()) => return,
                Err(err) => {
                    warn!("density backend failed, falling back to CPU: {err}");
                    self.backend = BackendStatus::PermanentlyUnavailable;
                }
            }
        }

        self.generate_cpu(elapsed);
    }

    fn generate_cpu(&mut self, elapsed: Value) {
        let (size, mode, settings) = (self.size, self.mode, &self.settings);
        Zip::indexed(&mut self.values).for_each(|(z, y, x), value| {
            *value = density(mode, &cell_position(x, y, z, size), elapsed, settings);
        });
    }

    /// Drops the accelerator and its device resources. Later frames run on the CPU.
    pub fn release_backend(&mut self) {
        if let BackendStatus::Active(_) = self.backend {
            debug!("releasing density backend");
            self.backend = BackendStatus::Uninitialized;
        }
    }

    /// Samples per axis.
    pub fn size(&self) -> usize {
        self.size
    }

    /// All samples, indexed `[z, y, x]`.
    pub fn values(&self) -> &Array3<Value> {
        &self.values
    }

    /// Returns the sample at `(x, y, z)`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Value {
        self.values[[z, y, x]]
    }

    /// Linear index of `(x, y, z)` in the flat sample layout.
    pub fn index_of(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.size * (y + self.size * z)
    }

    /// Shape evaluated by the last [`generate`](DensityField::generate).
    pub fn mode(&self) -> ShapeMode {
        self.mode
    }

    pub fn settings(&self) -> &DensityFieldSettings {
        &self.settings
    }

    /// Mutable settings; picked up by the next [`generate`](DensityField::generate).
    ///
    /// `size` is fixed at construction and ignored here; see
    /// [`needs_rebuild`](DensityField::needs_rebuild).
    pub fn settings_mut(&mut self) -> &mut DensityFieldSettings {
        &mut self.settings
    }

    /// Whether `settings` asks for a different grid size than this field holds.
    pub fn needs_rebuild(&self, settings: &DensityFieldSettings) -> bool {
        settings.size != self.size
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            BackendStatus::Uninitialized => BackendKind::Cpu,
            BackendStatus::Active(_) => BackendKind::Accelerated,
            BackendStatus::PermanentlyUnavailable => BackendKind::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::error::GpuError;

    fn settings(size: usize) -> DensityFieldSettings {
        DensityFieldSettings::default()
            .with_size(size)
            .with_frequency(3.0)
    }

    /// Succeeds `budget` times, then errors.
    struct FlakyBackend {
        budget: usize,
        calls: Arc<AtomicUsize>,
    }

    impl DensityBackend for FlakyBackend {
        fn evaluate(
            &mut self,
            _settings: &DensityFieldSettings,
            _mode: ShapeMode,
            _time: Value,
            out: &mut Array3<Value>,
        ) -> Result<()> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst);
            if calls >= self.budget {
                return Err(GpuError::Poll("device lost".into()).into());
            }
            out.fill(7.0);
            Ok(())
        }
    }

    #[test]
    fn rejects_degenerate_grid_sizes() {
        for size in [0, 1] {
            let err = DensityField::new(settings(size), ShapeMode::Terrain);
            assert!(matches!(err, Err(TerrainError::InvalidGridSize(s)) if s == size));
        }
        assert!(DensityField::new(settings(2), ShapeMode::Terrain).is_ok());
    }

    #[test]
    fn linear_layout_matches_index_of() {
        let mut field = DensityField::new(settings(5), ShapeMode::Terrain).expect("field");
        field.generate(0.75, ShapeMode::Terrain);
        let flat = field.values().as_slice().expect("standard layout");
        assert_eq!(flat.len(), 125);
        assert_eq!(flat[field.index_of(1, 2, 3)], field.get(1, 2, 3));
        assert_eq!(flat[field.index_of(4, 0, 1)], field.get(4, 0, 1));
    }

    #[test]
    fn cpu_generation_is_bit_identical() {
        let mut a = DensityField::new(settings(8), ShapeMode::Terrain).expect("field");
        let mut b = DensityField::new(settings(8), ShapeMode::Terrain).expect("field");
        a.generate(2.5, ShapeMode::Terrain);
        b.generate(2.5, ShapeMode::Terrain);
        let first = a.values().clone();
        a.generate(2.5, ShapeMode::Terrain);
        assert_eq!(a.values(), &first);
        assert_eq!(b.values(), &first);
    }

    #[test]
    fn sphere_mode_is_signed_distance() {
        let mut field = DensityField::new(settings(8), ShapeMode::sphere()).expect("field");
        field.generate(0.0, ShapeMode::sphere());
        // (4, 4, 4) is the grid centre
        assert!((field.get(4, 4, 4) + 0.35).abs() < 1e-6);
        assert!(field.get(0, 0, 0) > 0.0);
    }

    #[test]
    fn failed_init_degrades_to_cpu() {
        let mut field = DensityField::new(settings(6), ShapeMode::Terrain)
            .expect("field")
            .with_backend(|_| -> Result<FlakyBackend> { Err(GpuError::ComputeUnsupported.into()) });
        assert_eq!(field.backend_kind(), BackendKind::Unavailable);

        let mut reference = DensityField::new(settings(6), ShapeMode::Terrain).expect("field");
        field.generate(1.0, ShapeMode::Terrain);
        reference.generate(1.0, ShapeMode::Terrain);
        assert_eq!(field.values(), reference.values());
    }

    #[test]
    fn evaluation_error_degrades_for_good() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend_calls = calls.clone();
        let mut field = DensityField::new(settings(4), ShapeMode::Terrain)
            .expect("field")
            .with_backend(move |_| {
                Ok(FlakyBackend {
                    budget: 1,
                    calls: backend_calls,
                })
            });
        assert_eq!(field.backend_kind(), BackendKind::Accelerated);

        field.generate(0.0, ShapeMode::Terrain);
        assert!(field.values().iter().all(|&v| v == 7.0));

        // second call fails: the frame is filled by the CPU and the backend is retired
        field.generate(0.0, ShapeMode::Terrain);
        assert_eq!(field.backend_kind(), BackendKind::Unavailable);
        assert!(field.values().iter().any(|&v| v != 7.0));

        field.generate(0.0, ShapeMode::Terrain);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reconfiguring_keeps_the_buffer() {
        let mut field = DensityField::new(settings(6), ShapeMode::Terrain).expect("field");
        field.generate(0.0, ShapeMode::Terrain);
        let ptr = field.values().as_ptr();
        field.settings_mut().octaves = 2;
        field.settings_mut().ridge_sharpness = 1.5;
        field.generate(0.5, ShapeMode::sphere());
        assert_eq!(field.values().as_ptr(), ptr);
        assert_eq!(field.mode(), ShapeMode::sphere());
        assert!(!field.needs_rebuild(field.settings()));
        assert!(field.needs_rebuild(&settings(7)));
    }

    #[test]
    fn release_returns_to_cpu() {
        let mut field = DensityField::new(settings(4), ShapeMode::Terrain)
            .expect("field")
            .with_backend(|_| {
                Ok(FlakyBackend {
                    budget: usize::MAX,
                    calls: Arc::default(),
                })
            });
        field.release_backend();
        assert_eq!(field.backend_kind(), BackendKind::Cpu);
    }
}
