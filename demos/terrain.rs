use bevy::prelude::*;
use bevy_density_terrain::{
    DensityFieldSettings, ShapeMode, TerrainParams, TerrainPlugin, TerrainVolume,
    plugin::TerrainState,
};
use bevy_infinite_grid::{InfiniteGridBundle, InfiniteGridPlugin, InfiniteGridSettings};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

const SIZE: usize = 48;
const SCALE: f32 = 1.0;
const MAX_OCTAVES: u32 = 12;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            TerrainPlugin {
                params: TerrainParams {
                    settings: DensityFieldSettings::default()
                        .with_size(SIZE)
                        .with_frequency(3.0),
                    scale: SCALE,
                    ..default()
                },
            },
            PanOrbitCameraPlugin,
            InfiniteGridPlugin,
            #[cfg(not(target_arch = "wasm32"))]
            bevy::pbr::wireframe::WireframePlugin::default(),
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, (controls, report))
        .run();
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    bevy::log::info!(
        "Terrain Example: [W] wireframe  [M] sphere/terrain  [Space] pause  [R] regenerate  \
         [G] gpu/cpu  [Up/Down] frequency  [Left/Right] octaves"
    );

    commands.spawn(InfiniteGridBundle {
        settings: InfiniteGridSettings {
            fadeout_distance: 400.0,
            ..Default::default()
        },
        ..Default::default()
    });

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera {
            button_orbit: MouseButton::Right,
            button_pan: MouseButton::Middle,
            ..default()
        },
        Transform::from_xyz(60., 50., 60.).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::FULL_DAYLIGHT,
            ..Default::default()
        },
        Transform::default().with_rotation(Quat::from_rotation_x(-45.0_f32.to_radians())),
    ));

    // grid (0, 0, 0) sits at the corner of the volume; centre it on the origin
    let half = (SIZE - 1) as f32 * SCALE * 0.5;
    commands.spawn((
        TerrainVolume,
        Transform::from_translation(Vec3::splat(-half)),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.45, 0.6, 0.35),
            perceptual_roughness: 0.9,
            double_sided: true,
            cull_mode: None,
            ..Default::default()
        })),
    ));
}

fn controls(keyboard: Res<ButtonInput<KeyCode>>, mut params: ResMut<TerrainParams>) {
    if keyboard.just_pressed(KeyCode::KeyW) {
        params.wireframe = !params.wireframe;
    }
    if keyboard.just_pressed(KeyCode::KeyM) {
        params.mode = params.mode.toggled();
    }
    if keyboard.just_pressed(KeyCode::Space) {
        params.animate = !params.animate;
    }
    if keyboard.just_pressed(KeyCode::KeyR) {
        params.regenerate = true;
    }
    if keyboard.just_pressed(KeyCode::KeyG) {
        params.use_gpu = !params.use_gpu;
    }
    if keyboard.just_pressed(KeyCode::ArrowUp) {
        params.settings.frequency *= 1.25;
    }
    if keyboard.just_pressed(KeyCode::ArrowDown) {
        params.settings.frequency /= 1.25;
    }
    if keyboard.just_pressed(KeyCode::ArrowRight) {
        params.settings.octaves = (params.settings.octaves + 1).min(MAX_OCTAVES);
    }
    if keyboard.just_pressed(KeyCode::ArrowLeft) {
        params.settings.octaves = params.settings.octaves.saturating_sub(1);
    }
}

fn report(params: Res<TerrainParams>, query: Query<&TerrainState>) {
    if !params.is_changed() {
        return;
    }
    for state in query.iter() {
        let shape = match params.mode {
            ShapeMode::Terrain => "terrain",
            ShapeMode::Sphere { .. } => "sphere",
        };
        bevy::log::info!(
            "{shape}: {} triangles, backend {:?}, frequency {:.3}, octaves {}",
            state.mesh.triangle_count(),
            state.field.backend_kind(),
            params.settings.frequency,
            params.settings.octaves,
        );
    }
}
