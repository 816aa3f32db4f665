use bevy::{
    asset::RenderAssetUsages,
    camera::primitives::Aabb,
    mesh::PrimitiveTopology,
    pbr::wireframe::Wireframe,
    prelude::*,
};
use tracing::{debug, error};

use crate::{
    error::Result,
    field::DensityField,
    marching::MarchingCubes,
    mesh::{BoundingVolume, TerrainMesh},
    settings::{DensityFieldSettings, ShapeMode},
    types::Value,
};

/// System sets of the per-frame terrain pipeline, chained in this order on `Update`.
///
/// ```text
/// TerrainSet::Generate  →  TerrainSet::Extract  →  [your systems]  →  TerrainSet::Upload
/// ```
///
/// Systems that read [`TerrainState::mesh`] (colliders, analytics) fit between
/// `Extract` and `Upload`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TerrainSet {
    /// Creates or rebuilds fields and re-evaluates their density.
    Generate,
    /// Runs marching cubes over every freshly generated field.
    Extract,
    /// Writes triangles, bounds and wireframe state into the Bevy mesh.
    Upload,
}

/// Runtime controls of every [`TerrainVolume`].
///
/// Inserted as a resource by [`TerrainPlugin`]. Any change is picked up on the
/// next frame:
///
/// ```rust,ignore
/// fn toggle(mut params: ResMut<TerrainParams>, keys: Res<ButtonInput<KeyCode>>) {
///     if keys.just_pressed(KeyCode::KeyM) {
///         params.mode = params.mode.toggled();
///     }
/// }
/// ```
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct TerrainParams {
    /// Noise tunables. Changing `size` rebuilds each field from scratch.
    pub settings: DensityFieldSettings,
    pub mode: ShapeMode,
    /// Density threshold of the surface; corners below it are inside.
    pub iso_level: Value,
    /// World-space size of each voxel edge.
    pub scale: Value,
    pub wireframe: bool,
    /// Re-evaluate the field every frame. When `false` the field only changes on
    /// parameter edits or [`regenerate`](TerrainParams::regenerate).
    pub animate: bool,
    /// One-shot regeneration request, cleared after the frame that serves it.
    pub regenerate: bool,
    /// Try the compute backend when a field is (re)built.
    pub use_gpu: bool,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            settings: DensityFieldSettings::default(),
            mode: ShapeMode::default(),
            iso_level: 0.,
            scale: 1.,
            wireframe: false,
            animate: true,
            regenerate: false,
            use_gpu: cfg!(feature = "gpu"),
        }
    }
}

/// Marks an entity whose mesh is driven by the terrain pipeline.
///
/// The plugin attaches [`TerrainState`] and a [`Mesh3d`]; bring your own material.
#[derive(Component, Debug, Default)]
#[require(Transform)]
pub struct TerrainVolume;

/// Field, extractor and triangle buffers owned by one [`TerrainVolume`].
#[derive(Component)]
pub struct TerrainState {
    pub field: DensityField,
    pub mesh: TerrainMesh,
    mesher: MarchingCubes,
    use_gpu: bool,
    /// Field regenerated this frame; mesh not yet extracted or uploaded.
    dirty: bool,
}

impl TerrainState {
    pub fn new(params: &TerrainParams) -> Result<Self> {
        Ok(Self {
            field: build_field(params)?,
            mesh: TerrainMesh::new(),
            mesher: MarchingCubes::new().with_scale(params.scale),
            use_gpu: params.use_gpu,
            dirty: false,
        })
    }
}

fn build_field(params: &TerrainParams) -> Result<DensityField> {
    let field = DensityField::new(params.settings, params.mode)?;
    #[cfg(feature = "gpu")]
    let field = if params.use_gpu { field.with_gpu() } else { field };
    Ok(field)
}

/// Bevy plugin that animates density fields and re-meshes them every frame.
///
/// ```text
/// TerrainVolume added
///   → TerrainState + Mesh3d inserted     (spawn_terrain_state)
///   → field rebuilt on size/backend edit (rebuild_fields)
///   → density re-evaluated               (generate_fields)
///   → marching cubes                     (extract_meshes)
///   → attributes + Aabb + Wireframe      (upload_meshes)
/// ```
#[derive(Default)]
pub struct TerrainPlugin {
    /// Initial value of the [`TerrainParams`] resource.
    pub params: TerrainParams,
}

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.params.clone())
            .configure_sets(
                Update,
                (TerrainSet::Generate, TerrainSet::Extract, TerrainSet::Upload).chain(),
            )
            .add_systems(
                Update,
                (
                    (spawn_terrain_state, rebuild_fields, generate_fields)
                        .chain()
                        .in_set(TerrainSet::Generate),
                    extract_meshes.in_set(TerrainSet::Extract),
                    (upload_meshes, sync_wireframe).in_set(TerrainSet::Upload),
                ),
            );
    }
}

fn spawn_terrain_state(
    mut commands: Commands,
    params: Res<TerrainParams>,
    mut meshes: ResMut<Assets<Mesh>>,
    query: Query<Entity, (Added<TerrainVolume>, Without<TerrainState>)>,
) {
    for entity in query.iter() {
        match TerrainState::new(&params) {
            Ok(mut state) => {
                state.dirty = true;
                let mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
                commands
                    .entity(entity)
                    .insert((state, Mesh3d(meshes.add(mesh))));
            }
            Err(err) => error!("cannot create terrain for {entity}: {err}"),
        }
    }
}

/// Replaces fields whose grid size or backend preference no longer matches [`TerrainParams`].
fn rebuild_fields(params: Res<TerrainParams>, mut query: Query<(Entity, &mut TerrainState)>) {
    if !params.is_changed() {
        return;
    }
    for (entity, mut state) in query.iter_mut() {
        if !state.field.needs_rebuild(&params.settings) && state.use_gpu == params.use_gpu {
            continue;
        }
        debug!(
            "rebuilding terrain field for {entity}: {}³ → {}³",
            state.field.size(),
            params.settings.size
        );
        // drop device resources before asking for new ones
        state.field.release_backend();
        match build_field(&params) {
            Ok(field) => {
                state.field = field;
                state.use_gpu = params.use_gpu;
                state.dirty = true;
            }
            Err(err) => error!("cannot rebuild terrain for {entity}: {err}"),
        }
    }
}

fn generate_fields(time: Res<Time>, params: Res<TerrainParams>, mut query: Query<&mut TerrainState>) {
    let refresh = params.animate || params.regenerate || params.is_changed();
    for mut state in query.iter_mut() {
        if !refresh && !state.dirty {
            continue;
        }
        let state = &mut *state;
        if !state.field.needs_rebuild(&params.settings) {
            *state.field.settings_mut() = params.settings;
        }
        state.field.generate(time.elapsed_secs(), params.mode);
        state.dirty = true;
    }
}

fn extract_meshes(params: Res<TerrainParams>, mut query: Query<&mut TerrainState>) {
    for mut state in query.iter_mut() {
        if !state.dirty {
            continue;
        }
        let TerrainState {
            field,
            mesh,
            mesher,
            ..
        } = &mut *state;
        mesher.scale = params.scale;
        mesher.extract(field.values().view(), params.iso_level, mesh);
    }
}

fn upload_meshes(
    mut commands: Commands,
    mut params: ResMut<TerrainParams>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut query: Query<(Entity, &mut TerrainState, &Mesh3d)>,
) {
    for (entity, mut state, mesh3d) in query.iter_mut() {
        if !state.dirty {
            continue;
        }
        if let Some(mut mesh) = meshes.get_mut(&mesh3d.0) {
            write_mesh(&state.mesh, &mut mesh);
        }
        match state.mesh.bounds() {
            Some(bounds) => {
                commands.entity(entity).insert(aabb(bounds));
            }
            None => {
                commands.entity(entity).remove::<Aabb>();
            }
        }
        state.dirty = false;
    }

    if params.regenerate {
        params.bypass_change_detection().regenerate = false;
    }
}

fn sync_wireframe(
    mut commands: Commands,
    params: Res<TerrainParams>,
    query: Query<(Entity, Has<Wireframe>), With<TerrainState>>,
) {
    for (entity, has_wireframe) in query.iter() {
        match (params.wireframe, has_wireframe) {
            (true, false) => {
                commands.entity(entity).insert(Wireframe);
            }
            (false, true) => {
                commands.entity(entity).remove::<Wireframe>();
            }
            _ => {}
        }
    }
}

/// Replaces the position and normal attributes of `target` with the triangles of `mesh`.
///
/// The mesh is non-indexed: every three vertices form one triangle.
pub fn write_mesh(mesh: &TerrainMesh, target: &mut Mesh) {
    target.insert_attribute(Mesh::ATTRIBUTE_POSITION, mesh.vertices().to_vec());
    target.insert_attribute(Mesh::ATTRIBUTE_NORMAL, mesh.vertex_normals().to_vec());
}

fn aabb(bounds: &BoundingVolume) -> Aabb {
    Aabb::from_min_max(
        Vec3::new(bounds.min.x, bounds.min.y, bounds.min.z),
        Vec3::new(bounds.max.x, bounds.max.y, bounds.max.z),
    )
}
