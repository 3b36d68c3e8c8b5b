use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bevy::{
    asset::embedded_asset,
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, VolumeError},
    lattice::VolumeSpec,
    material::{VolumeMaterial, VolumeUniform},
    texture::{VolumeTexture, build_volume_cancellable},
    types::ScalarField,
    volume::{VolumeParams, preview_image, volume_image},
};

/// System sets for the volume pipeline.
///
/// ```text
/// VolumeSet::Spawn  →  [async compute]  →  VolumeSet::Poll  →  VolumeSet::Upload  →  VolumeSet::Sync
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeSet {
    /// Spawns an async build task for each queued volume.
    Spawn,
    /// Polls async tasks and inserts [`GeneratedVolume`] on completion.
    Poll,
    /// Turns [`GeneratedVolume`] into [`VolumeData`] image assets and a [`VolumeMaterial`].
    Upload,
    /// Refreshes [`VolumeParams::local_camera`] from the [`VolumeCamera`] and writes the
    /// material uniforms.
    Sync,
}

/// The field a volume entity displays and how it is sampled.
///
/// Replacing this component (or mutating it) queues a rebuild and cancels any build still in
/// flight for the entity.
#[derive(Component, Clone)]
#[require(VolumeParams)]
pub struct VolumeSource {
    pub spec: VolumeSpec,
    pub field: Arc<ScalarField>,
}

impl VolumeSource {
    pub fn new(spec: VolumeSpec, field: Arc<ScalarField>) -> Self {
        Self { spec, field }
    }
}

/// Marker component added to [`VolumeSource`] entities that are waiting for a build.
#[derive(Component)]
pub struct QueuedVolume;

/// Holds the in-flight async build for a [`VolumeSource`].
#[derive(Component)]
pub struct BuildTask {
    task: Task<Result<VolumeTexture>>,
    cancel: Arc<AtomicBool>,
}

impl BuildTask {
    /// Asks the build to stop at its next row boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// A finished texture waiting to be uploaded.
#[derive(Component)]
pub struct GeneratedVolume(pub Arc<VolumeTexture>);

/// The encoded dataset of a volume entity and its image assets.
///
/// `image` is the texture bound by the entity's [`VolumeMaterial`].
#[derive(Component, Clone)]
pub struct VolumeData {
    pub texture: Arc<VolumeTexture>,
    pub image: Handle<Image>,
    pub preview: Option<Handle<Image>>,
}

/// Marker for the camera whose position is fed to [`VolumeParams`].
#[derive(Component, Default)]
pub struct VolumeCamera;

/// Runtime configuration for the volume pipeline.
///
/// ```rust,ignore
/// app.add_plugins(VolumePlugin { max_builds_per_frame: 1, ..default() });
/// ```
#[derive(Resource)]
pub struct VolumeConfig {
    /// Maximum number of builds spawned per frame. Default: `2`.
    pub max_builds_per_frame: usize,
    /// Also upload an opaque preview of the encoded texture. Default: `false`.
    pub publish_preview: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            max_builds_per_frame: 2,
            publish_preview: false,
        }
    }
}

/// Bevy plugin that builds volume textures off the main thread and keeps the ray-tracing
/// parameters in sync with the camera.
///
/// ```text
/// VolumeSource added / changed
///   → QueuedVolume inserted         (queue_changed_sources, `auto_queue` feature)
///   → BuildTask spawned             (VolumeSet::Spawn)
///   → [async compute runs]
///   → GeneratedVolume inserted      (VolumeSet::Poll, once the task completes)
///   → VolumeData + cube mesh with VolumeMaterial inserted   (VolumeSet::Upload)
///   → local_camera refreshed, material uniforms written    (VolumeSet::Sync, every frame)
/// ```
pub struct VolumePlugin {
    /// Initial value for [`VolumeConfig::max_builds_per_frame`].
    pub max_builds_per_frame: usize,
    /// Initial value for [`VolumeConfig::publish_preview`].
    pub publish_preview: bool,
}

impl Default for VolumePlugin {
    fn default() -> Self {
        let config = VolumeConfig::default();
        Self {
            max_builds_per_frame: config.max_builds_per_frame,
            publish_preview: config.publish_preview,
        }
    }
}

impl Plugin for VolumePlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "volume.wgsl");

        app.add_plugins(MaterialPlugin::<VolumeMaterial>::default())
            .insert_resource(VolumeConfig {
                max_builds_per_frame: self.max_builds_per_frame,
                publish_preview: self.publish_preview,
            })
            .configure_sets(
                Update,
                (
                    VolumeSet::Spawn,
                    VolumeSet::Poll,
                    VolumeSet::Upload,
                    VolumeSet::Sync,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    spawn_build_tasks.in_set(VolumeSet::Spawn),
                    poll_build_tasks.in_set(VolumeSet::Poll),
                    upload_volumes.in_set(VolumeSet::Upload),
                    (sync_volume_params, write_material_uniforms)
                        .chain()
                        .in_set(VolumeSet::Sync),
                ),
            );

        #[cfg(feature = "auto_queue")]
        app.add_systems(Update, queue_changed_sources.before(VolumeSet::Spawn));
    }
}

/// Queues every added or changed [`VolumeSource`], cancelling a build already running for it.
#[cfg(feature = "auto_queue")]
fn queue_changed_sources(
    mut commands: Commands,
    query: Query<(Entity, Option<&BuildTask>), Changed<VolumeSource>>,
) {
    for (entity, running) in query.iter() {
        let mut entity_commands = commands.entity(entity);
        if let Some(running) = running {
            running.cancel();
            entity_commands.remove::<BuildTask>();
        }
        entity_commands.insert(QueuedVolume);
    }
}

/// Spawns async builds for [`QueuedVolume`]s, up to [`VolumeConfig::max_builds_per_frame`] per frame.
fn spawn_build_tasks(
    mut commands: Commands,
    config: Res<VolumeConfig>,
    query: Query<(Entity, &VolumeSource), (With<QueuedVolume>, Without<BuildTask>)>,
) {
    let task_pool = AsyncComputeTaskPool::get();

    for (entity, source) in query.iter().take(config.max_builds_per_frame) {
        let spec = source.spec;
        let field = Arc::clone(&source.field);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        debug!(?entity, resolution = spec.resolution.size(), "spawning volume build");
        let task =
            task_pool.spawn(async move { build_volume_cancellable(&spec, field.as_ref(), &flag) });

        commands.entity(entity).insert(BuildTask { task, cancel });
    }
}

/// Polls in-flight [`BuildTask`]s each frame and inserts [`GeneratedVolume`] on completion.
///
/// Non-blocking: tasks that haven't finished are skipped and retried next frame.
fn poll_build_tasks(mut commands: Commands, mut query: Query<(Entity, &mut BuildTask)>) {
    for (entity, mut build) in query.iter_mut() {
        let Some(result) = block_on(future::poll_once(&mut build.task)) else {
            continue;
        };

        let mut entity_commands = commands.entity(entity);
        entity_commands.remove::<BuildTask>();
        match result {
            Ok(texture) => {
                entity_commands.insert(GeneratedVolume(Arc::new(texture)));
            }
            Err(VolumeError::Cancelled) => debug!(?entity, "volume build cancelled"),
            Err(err) => {
                warn!(?entity, %err, "volume build failed");
                entity_commands.remove::<QueuedVolume>();
            }
        }
    }
}

/// Uploads each [`GeneratedVolume`] as image assets, records them in [`VolumeData`] and gives
/// the entity a unit cube drawn with a [`VolumeMaterial`] bound to the texture.
fn upload_volumes(
    mut commands: Commands,
    config: Res<VolumeConfig>,
    mut query: Query<
        (Entity, &GeneratedVolume, &GlobalTransform, &mut VolumeParams),
        With<QueuedVolume>,
    >,
    mut images: ResMut<Assets<Image>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<VolumeMaterial>>,
) {
    for (entity, generated, volume, mut params) in query.iter_mut() {
        let texture = &generated.0;
        let image = images.add(volume_image(texture));
        let preview = config
            .publish_preview
            .then(|| images.add(preview_image(texture)));

        params.resolution = texture.resolution();
        let material = materials.add(VolumeMaterial {
            params: VolumeUniform::new(&params, volume),
            data: image.clone(),
        });
        info!(?entity, texture_size = texture.size(), "volume texture uploaded");

        commands
            .entity(entity)
            .insert((
                VolumeData {
                    texture: Arc::clone(texture),
                    image,
                    preview,
                },
                Mesh3d(meshes.add(Cuboid::from_length(1.0))),
                MeshMaterial3d(material),
            ))
            .remove::<(GeneratedVolume, QueuedVolume)>();
    }
}

/// Feeds the [`VolumeCamera`] position into every volume's [`VolumeParams`].
fn sync_volume_params(
    cameras: Query<&GlobalTransform, With<VolumeCamera>>,
    mut volumes: Query<(&GlobalTransform, &mut VolumeParams)>,
) {
    let Ok(camera) = cameras.single() else {
        return;
    };
    for (volume, mut params) in volumes.iter_mut() {
        let mut updated = *params;
        updated.update_uniforms(camera, volume);
        params.set_if_neq(updated);
    }
}

/// Copies changed [`VolumeParams`] (or a moved volume) into the entity's material uniforms.
fn write_material_uniforms(
    volumes: Query<
        (&VolumeParams, &GlobalTransform, &MeshMaterial3d<VolumeMaterial>),
        Or<(Changed<VolumeParams>, Changed<GlobalTransform>)>,
    >,
    mut materials: ResMut<Assets<VolumeMaterial>>,
) {
    for (params, volume, material) in volumes.iter() {
        if let Some(mut material) = materials.get_mut(&material.0) {
            material.params = VolumeUniform::new(params, volume);
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::{ecs::system::RunSystemOnce, tasks::TaskPool};

    use super::*;
    use crate::{resolution::Resolution, types::Point};

    #[test]
    fn camera_moves_reach_the_material() {
        let mut world = World::new();
        let mut materials = Assets::<VolumeMaterial>::default();
        let handle = materials.add(VolumeMaterial {
            params: VolumeUniform::default(),
            data: Handle::default(),
        });
        world.insert_resource(materials);

        world.spawn((
            VolumeCamera,
            GlobalTransform::from(Transform::from_xyz(0.0, 0.0, -8.0)),
        ));
        let volume = GlobalTransform::from(Transform::from_scale(Vec3::splat(4.0)));
        world.spawn((
            VolumeParams {
                resolution: Resolution::R16,
                intensity: 3.0,
                local_camera: Point::origin(),
            },
            volume,
            MeshMaterial3d(handle.clone()),
        ));

        world.run_system_once(sync_volume_params).unwrap();
        world.run_system_once(write_material_uniforms).unwrap();

        let materials = world.resource::<Assets<VolumeMaterial>>();
        let params = materials.get(&handle).unwrap().params;
        assert!((params.local_camera - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-5);
        assert_eq!(params.intensity, 3.0);
        assert_eq!(params.resolution, 16);
        assert_eq!(params.slices_per_row, 4);
    }

    #[test]
    fn cancelling_a_build_raises_its_flag() {
        let cancel = Arc::new(AtomicBool::new(false));
        let task = AsyncComputeTaskPool::get_or_init(TaskPool::new)
            .spawn(async { Err(VolumeError::Cancelled) });
        let build = BuildTask {
            task,
            cancel: Arc::clone(&cancel),
        };
        build.cancel();
        assert!(cancel.load(Ordering::Relaxed));
    }
}
