use bevy::prelude::Vec3;
use bevy_density_terrain::{
    DensityField, DensityFieldSettings, MarchingCubes, ShapeMode, TerrainMesh,
    mesh::FLOATS_PER_TRIANGLE, types::Value,
};
use ndarray::Array3;
use noiz::prelude::*;

type TestNoise = Noise<
    LayeredNoise<
        Normed<f32>,
        Persistence,
        Octave<MixCellGradients<OrthoGrid, Smoothstep, QuickGradients>>,
    >,
>;

/// Structural checks every extracted mesh must pass, for a grid of `size` samples per axis.
fn assert_well_formed(mesh: &TerrainMesh, size: usize, scale: Value) {
    assert_eq!(mesh.positions().len(), mesh.normals().len());
    assert_eq!(mesh.positions().len() % FLOATS_PER_TRIANGLE, 0);
    assert!(mesh.positions().iter().all(|v| v.is_finite()));
    assert!(mesh.normals().iter().all(|v| v.is_finite()));

    let extent = (size - 1) as Value * scale;
    for vertex in mesh.vertices() {
        assert!(vertex.iter().all(|&c| (0.0..=extent).contains(&c)), "{vertex:?} outside grid");
        // a crossing lies on a cell edge: at least two coordinates are on the lattice
        let on_lattice = vertex.iter().filter(|&&c| (c / scale).fract() == 0.0).count();
        assert!(on_lattice >= 2, "{vertex:?} not on a cell edge");
    }

    for normals in mesh.vertex_normals().chunks_exact(3) {
        assert_eq!(normals[0], normals[1]);
        assert_eq!(normals[1], normals[2]);
        let length = Vec3::from_array(normals[0]).length();
        assert!(length <= 1.0 + 1e-4);
    }

    match mesh.bounds() {
        Some(bounds) => {
            assert!(!mesh.is_empty());
            for vertex in mesh.vertices() {
                let d = nalgebra::distance(&bounds.center, &(*vertex).into());
                assert!(d <= bounds.radius + 1e-4);
            }
        }
        None => assert!(mesh.is_empty()),
    }
}

#[test]
fn constant_fields_produce_no_triangles() {
    let mut mesher = MarchingCubes::new();
    let mut mesh = TerrainMesh::new();
    for size in 2..=6 {
        for value in [-1.0, 1.0, 0.5] {
            let field = Array3::from_elem((size, size, size), value);
            mesher.extract(field.view(), 0.0, &mut mesh);
            assert!(mesh.is_empty(), "size {size}, value {value}");
            assert!(mesh.bounds().is_none());
        }
    }
}

#[test]
fn lone_positive_corner_yields_one_triangle() {
    let mut values = vec![-1.0; 4 * 4 * 4];
    values[0] = 1.0;
    let mut mesh = TerrainMesh::new();
    MarchingCubes::new()
        .extract_slice(&values, 4, 0.0, &mut mesh)
        .expect("4³ buffer");

    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.positions().len(), 9);
    let normals = mesh.vertex_normals();
    assert!(normals.iter().all(|n| *n == normals[0]));
    assert_well_formed(&mesh, 4, 1.0);
}

#[test]
fn sphere_surface_matches_its_radius() {
    const SIZE: usize = 24;
    let settings = DensityFieldSettings::default().with_size(SIZE);
    let mut field = DensityField::new(settings, ShapeMode::sphere()).expect("field");
    field.generate(0.0, ShapeMode::sphere());

    let mut mesh = TerrainMesh::new();
    MarchingCubes::new().extract(field.values().view(), 0.0, &mut mesh);
    assert_well_formed(&mesh, SIZE, 1.0);

    let bounds = mesh.bounds().expect("sphere has a surface");
    let expected = 0.35 * SIZE as Value;
    assert!(
        (bounds.radius - expected).abs() <= 3.0_f32.sqrt(),
        "radius {} vs {expected}",
        bounds.radius
    );
    let centre = SIZE as Value * 0.5;
    for c in bounds.center.iter() {
        assert!((c - centre).abs() <= 1.0);
    }
}

#[test]
fn gradient_noise_meshes_are_well_formed() {
    const SIZE: usize = 20;
    let mut noise = TestNoise::default();
    noise.set_frequency(0.15);

    let field = Array3::from_shape_fn((SIZE, SIZE, SIZE), |(z, y, x)| -> f32 {
        noise.sample_for(Vec3::new(x as f32, y as f32, z as f32))
    });

    let mut mesh = TerrainMesh::new();
    let mut mesher = MarchingCubes::new().with_scale(0.5);
    mesher.extract(field.view(), 0.0, &mut mesh);
    assert!(!mesh.is_empty());
    assert_well_formed(&mesh, SIZE, 0.5);
}

#[test]
fn animated_terrain_stays_well_formed() {
    const SIZE: usize = 16;
    let settings = DensityFieldSettings::default()
        .with_size(SIZE)
        .with_frequency(3.0);
    let mut field = DensityField::new(settings, ShapeMode::Terrain).expect("field");
    let mut mesher = MarchingCubes::new();
    let mut mesh = TerrainMesh::new();

    for frame in 0..12 {
        field.generate(frame as Value / 10.0, ShapeMode::Terrain);
        mesher.extract(field.values().view(), 0.0, &mut mesh);
        assert_well_formed(&mesh, SIZE, 1.0);
    }
}
