use bevy::{
    asset::RenderAssetUsages,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};
use bevy_infinite_grid::{InfiniteGridBundle, InfiniteGridPlugin};
use bevy_orbital_volume::{
    VolumePlugin,
    orbital::OrbitalSettings,
    plugin::{VolumeCamera, VolumeData, VolumeSet, VolumeSource},
    render::{ViewCamera, render_view},
    resolution::Resolution,
    types::Point,
    volume::VolumeParams,
};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

const VIEW_SIZE: usize = 256;

/// Orbitals cycled with the number keys.
const ORBITALS: [(u32, u32, i32); 9] = [
    (1, 0, 0),
    (2, 0, 0),
    (2, 1, 0),
    (2, 1, 1),
    (3, 0, 0),
    (3, 1, 1),
    (3, 2, 0),
    (3, 2, 1),
    (3, 2, 2),
];

#[derive(Resource)]
struct RayTracedView(Handle<Image>);

#[derive(Component)]
struct OrbitalVolume;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            VolumePlugin::default(),
            PanOrbitCameraPlugin,
            InfiniteGridPlugin,
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, (select_orbital, adjust_intensity, draw_bounds))
        .add_systems(Update, trace_view.after(VolumeSet::Sync))
        .run();
}

fn setup(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    commands.spawn(InfiniteGridBundle::default());

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera::default(),
        VolumeCamera,
        Transform::from_xyz(0.0, 1.5, -6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let settings = OrbitalSettings::default();
    spawn_orbital(&mut commands, &settings);

    let view = images.add(Image::new_fill(
        Extent3d {
            width: VIEW_SIZE as u32,
            height: VIEW_SIZE as u32,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 0],
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::default(),
    ));
    commands.spawn((
        ImageNode::new(view.clone()),
        Node {
            width: Val::Px(VIEW_SIZE as f32 * 2.0),
            height: Val::Px(VIEW_SIZE as f32 * 2.0),
            ..default()
        },
    ));
    commands.insert_resource(RayTracedView(view));
}

fn spawn_orbital(commands: &mut Commands, settings: &OrbitalSettings) {
    let orbital = settings.orbital();
    let Ok(spec) = orbital.volume_spec(Resolution::R64) else {
        return;
    };
    commands.spawn((
        OrbitalVolume,
        VolumeSource::new(spec, orbital.field()),
        VolumeParams::default().with_intensity(settings.intensity),
        Transform::from_scale(Vec3::splat(4.0)),
    ));
}

fn select_orbital(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    volumes: Query<Entity, With<OrbitalVolume>>,
) {
    const DIGITS: [KeyCode; 9] = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];

    for (key, &(n, l, m)) in DIGITS.iter().zip(ORBITALS.iter()) {
        if !keys.just_pressed(*key) {
            continue;
        }
        match OrbitalSettings::select(n, l, m) {
            Ok(settings) => {
                for entity in volumes.iter() {
                    commands.entity(entity).despawn();
                }
                info!(n, l, m, intensity = settings.intensity, "selected orbital");
                spawn_orbital(&mut commands, &settings);
            }
            Err(err) => warn!("{err}"),
        }
    }
}

/// Intensity is a shading parameter, so changing it never rebuilds the texture.
fn adjust_intensity(keys: Res<ButtonInput<KeyCode>>, mut volumes: Query<&mut VolumeParams>) {
    let factor = if keys.just_pressed(KeyCode::PageUp) {
        1.5
    } else if keys.just_pressed(KeyCode::PageDown) {
        1.0 / 1.5
    } else {
        return;
    };
    for mut params in volumes.iter_mut() {
        params.intensity *= factor;
    }
}

fn draw_bounds(mut gizmos: Gizmos, volumes: Query<&GlobalTransform, With<OrbitalVolume>>) {
    for transform in volumes.iter() {
        gizmos.cube(transform.compute_transform(), Color::WHITE);
    }
}

/// CPU reference render shown beside the GPU-drawn cube, redone whenever the parameters change.
fn trace_view(
    view: Res<RayTracedView>,
    mut images: ResMut<Assets<Image>>,
    volumes: Query<(&VolumeParams, &VolumeData), Changed<VolumeParams>>,
) {
    for (params, data) in volumes.iter() {
        let camera = ViewCamera {
            position: params.local_camera,
            target: Point::origin(),
            ..Default::default()
        };
        let pixels = render_view(&data.texture, &camera, params.intensity, VIEW_SIZE, VIEW_SIZE);
        if let Some(mut image) = images.get_mut(&view.0) {
            image.data = Some(pixels);
        }
    }
}
