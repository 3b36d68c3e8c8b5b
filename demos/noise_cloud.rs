use std::sync::Arc;

use bevy::prelude::*;
use bevy_orbital_volume::{
    VolumePlugin,
    lattice::VolumeSpec,
    plugin::{VolumeData, VolumeSource},
    resolution::Resolution,
    types::Point,
};
use noiz::prelude::*;

type CloudNoise = Noise<
    LayeredNoise<
        Normed<f32>,
        Persistence,
        Octave<MixCellGradients<OrthoGrid, Smoothstep, QuickGradients>>,
    >,
>;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            VolumePlugin {
                publish_preview: true,
                ..Default::default()
            },
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, show_preview)
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);

    let mut noise = CloudNoise::default();
    noise.set_frequency(6.0);

    // Normed noise is in [-1, 1]; densities must be in [0, 1].
    let field = move |p: Point| {
        let v: f32 = noise.sample_for(Vec3::new(p.x as f32, p.y as f32, p.z as f32));
        ((v as f64 + 1.0) * 0.5).clamp(0.0, 1.0)
    };

    commands.spawn(VolumeSource::new(
        VolumeSpec::new(Resolution::R64),
        Arc::new(field),
    ));
}

/// Shows the encoded texture once it has been uploaded.
fn show_preview(mut commands: Commands, volumes: Query<&VolumeData, Added<VolumeData>>) {
    for data in volumes.iter() {
        let Some(preview) = data.preview.clone() else {
            continue;
        };
        info!("showing {0}×{0} data texture", data.texture.size());
        commands.spawn((
            ImageNode::new(preview),
            Node {
                width: Val::Px(512.0),
                height: Val::Px(512.0),
                ..default()
            },
        ));
    }
}
