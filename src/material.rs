use bevy::{
    mesh::MeshVertexBufferLayoutRef,
    pbr::{MaterialPipeline, MaterialPipelineKey},
    prelude::*,
    render::render_resource::{
        AsBindGroup, RenderPipelineDescriptor, ShaderType, SpecializedMeshPipelineError,
    },
    shader::ShaderRef,
};

use crate::volume::VolumeParams;

pub(crate) const SHADER_PATH: &str = "embedded://bevy_orbital_volume/volume.wgsl";

/// Uniform block read by the ray-tracing fragment shader.
#[derive(Debug, Clone, Copy, PartialEq, ShaderType)]
pub struct VolumeUniform {
    /// Maps fragment world positions back onto the unit cube.
    pub local_from_world: Mat4,
    pub local_camera: Vec3,
    pub intensity: f32,
    pub resolution: u32,
    pub slices_per_row: u32,
}

impl Default for VolumeUniform {
    fn default() -> Self {
        Self::new(&VolumeParams::default(), &GlobalTransform::IDENTITY)
    }
}

impl VolumeUniform {
    pub fn new(params: &VolumeParams, volume: &GlobalTransform) -> Self {
        let camera = params.local_camera;
        Self {
            local_from_world: Mat4::from(volume.affine().inverse()),
            local_camera: Vec3::new(camera.x as f32, camera.y as f32, camera.z as f32),
            intensity: params.intensity as f32,
            resolution: params.resolution.size() as u32,
            slices_per_row: params.resolution.slices_per_row() as u32,
        }
    }
}

/// Draws a volume entity's unit cube by ray-tracing its encoded texture.
///
/// Both faces of the cube are rasterised. Seen from outside, back faces integrate a
/// zero-length path and come out transparent; seen from inside, they are the only faces left.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct VolumeMaterial {
    #[uniform(0)]
    pub params: VolumeUniform,

    #[texture(1)]
    #[sampler(2)]
    pub data: Handle<Image>,
}

impl Material for VolumeMaterial {
    fn fragment_shader() -> ShaderRef {
        SHADER_PATH.into()
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Blend
    }

    fn specialize(
        _pipeline: &MaterialPipeline,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolution::Resolution, types::Point};

    #[test]
    fn uniform_carries_params_and_inverse_transform() {
        let volume = GlobalTransform::from(
            Transform::from_xyz(1.0, 2.0, 3.0).with_scale(Vec3::splat(4.0)),
        );
        let params = VolumeParams {
            resolution: Resolution::R256,
            intensity: 700.0,
            local_camera: Point::new(0.25, -1.0, 3.0),
        };
        let uniform = VolumeUniform::new(&params, &volume);

        assert_eq!(uniform.resolution, 256);
        assert_eq!(uniform.slices_per_row, 16);
        assert_eq!(uniform.intensity, 700.0);
        assert_eq!(uniform.local_camera, Vec3::new(0.25, -1.0, 3.0));

        // A cube corner in world space lands on the unit cube corner.
        let corner = uniform
            .local_from_world
            .transform_point3(Vec3::new(3.0, 4.0, 5.0));
        assert!((corner - Vec3::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn material_blends() {
        let material = VolumeMaterial {
            params: VolumeUniform::default(),
            data: Handle::default(),
        };
        assert!(matches!(material.alpha_mode(), AlphaMode::Blend));
        assert_eq!(material.params.resolution, 64);
    }
}
