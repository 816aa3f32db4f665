use bevy_density_terrain::{
    DensityField, DensityFieldSettings, ShapeMode,
    error::{GpuError, Result},
    field::{BackendKind, DensityBackend},
};

fn settings() -> DensityFieldSettings {
    DensityFieldSettings::default()
        .with_size(10)
        .with_frequency(3.0)
        .with_seed(7)
}

struct Unavailable;

impl DensityBackend for Unavailable {
    fn evaluate(
        &mut self,
        _settings: &DensityFieldSettings,
        _mode: ShapeMode,
        _time: f32,
        _out: &mut ndarray::Array3<f32>,
    ) -> Result<()> {
        unreachable!("never initialised")
    }
}

#[test]
fn failed_accelerator_matches_plain_cpu_field() {
    let mut degraded = DensityField::new(settings(), ShapeMode::Terrain)
        .expect("field")
        .with_backend(|_| -> Result<Unavailable> { Err(GpuError::NoAdapter("none".into()).into()) });
    let mut plain = DensityField::new(settings(), ShapeMode::Terrain).expect("field");
    assert_eq!(degraded.backend_kind(), BackendKind::Unavailable);

    for (time, mode) in [
        (0.0, ShapeMode::Terrain),
        (1.7, ShapeMode::Terrain),
        (1.7, ShapeMode::sphere()),
    ] {
        degraded.generate(time, mode);
        plain.generate(time, mode);
        assert_eq!(degraded.values(), plain.values());
    }
}

#[test]
fn generation_is_idempotent_for_equal_inputs() {
    let mut field = DensityField::new(settings(), ShapeMode::Terrain).expect("field");
    field.generate(3.0, ShapeMode::Terrain);
    let first = field.values().clone();
    field.generate(4.0, ShapeMode::Terrain);
    assert_ne!(field.values(), &first);
    field.generate(3.0, ShapeMode::Terrain);
    assert_eq!(field.values(), &first);
}

#[test]
fn time_animates_the_terrain() {
    let mut field = DensityField::new(settings(), ShapeMode::Terrain).expect("field");
    field.generate(0.0, ShapeMode::Terrain);
    let before = field.values().clone();
    field.generate(2.0, ShapeMode::Terrain);
    let moved = field
        .values()
        .iter()
        .zip(before.iter())
        .filter(|(a, b)| a != b)
        .count();
    assert!(moved > 0);
}

#[cfg(feature = "gpu")]
#[test]
fn gpu_field_degrades_or_matches_cpu() {
    let mut gpu = DensityField::new(settings(), ShapeMode::Terrain)
        .expect("field")
        .with_gpu();
    let mut cpu = DensityField::new(settings(), ShapeMode::Terrain).expect("field");

    for time in [0.0, 0.5, 5.0] {
        gpu.generate(time, ShapeMode::Terrain);
        cpu.generate(time, ShapeMode::Terrain);
        if gpu.backend_kind() == BackendKind::Accelerated {
            for (g, c) in gpu.values().iter().zip(cpu.values()) {
                assert!((g - c).abs() < 1e-3, "gpu {g} vs cpu {c}");
            }
        } else {
            assert_eq!(gpu.values(), cpu.values());
        }
    }
    gpu.release_backend();
    assert_ne!(gpu.backend_kind(), BackendKind::Accelerated);
}
