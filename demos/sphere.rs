use bevy::{pbr::wireframe::WireframeConfig, prelude::*};
use bevy_density_terrain::{DensityFieldSettings, ShapeMode, TerrainParams, TerrainPlugin, TerrainVolume};

const RESOLUTION: usize = 32;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            #[cfg(not(target_arch = "wasm32"))]
            bevy::pbr::wireframe::WireframePlugin::default(),
            TerrainPlugin {
                params: TerrainParams {
                    settings: DensityFieldSettings::default().with_size(RESOLUTION),
                    mode: ShapeMode::sphere(),
                    animate: false,
                    ..default()
                },
            },
        ))
        .insert_resource(WireframeConfig {
            global: true,
            ..Default::default()
        })
        .add_systems(Startup, setup)
        .run();
}

fn setup(mut commands: Commands) {
    let resolution = RESOLUTION as f32;

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(resolution * -1.2, resolution * 1.4, resolution * -1.2)
            .looking_at(Vec3::splat(resolution * 0.5), Vec3::Y),
    ));

    commands.spawn(TerrainVolume);
}
