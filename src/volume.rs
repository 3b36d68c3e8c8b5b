use bevy::{
    asset::RenderAssetUsages,
    image::{Image, ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor},
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

use crate::{
    integrate::{Shaded, shade},
    resolution::Resolution,
    texture::VolumeTexture,
    types::{Point, Value},
};

/// Parameters of the volume ray-tracing material for one volume entity.
///
/// `local_camera` is the camera position in the volume's local frame, where the volume is the
/// unit cube. It must be refreshed with [`update_uniforms`](VolumeParams::update_uniforms)
/// before every draw; the plugin then copies these values into the entity's
/// [`VolumeMaterial`](crate::material::VolumeMaterial).
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[require(Transform)]
pub struct VolumeParams {
    pub resolution: Resolution,
    pub intensity: Value,
    pub local_camera: Point,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            intensity: 1.0,
            local_camera: Point::origin(),
        }
    }
}

impl VolumeParams {
    pub fn with_intensity(mut self, intensity: Value) -> Self {
        self.intensity = intensity;
        self
    }

    /// Moves the camera's world position into the volume's local frame.
    pub fn update_uniforms(&mut self, camera: &GlobalTransform, volume: &GlobalTransform) {
        let local = volume
            .affine()
            .inverse()
            .transform_point3(camera.translation());
        self.local_camera = Point::new(local.x as Value, local.y as Value, local.z as Value);
    }

    /// Shades the cube surface point `surface` (volume-local) with these parameters.
    pub fn shade(&self, texture: &VolumeTexture, surface: &Point) -> Shaded {
        shade(texture, &self.local_camera, surface, self.intensity)
    }
}

/// Wraps an encoded texture as an RGBA8 image ready for upload.
///
/// Linear filtering with clamp-to-edge addressing, row 0 at `v = 0`.
pub fn volume_image(texture: &VolumeTexture) -> Image {
    let mut image = square_image(texture.size() as u32, texture.data().to_vec());
    image.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
        address_mode_u: ImageAddressMode::ClampToEdge,
        address_mode_v: ImageAddressMode::ClampToEdge,
        address_mode_w: ImageAddressMode::ClampToEdge,
        mag_filter: ImageFilterMode::Linear,
        min_filter: ImageFilterMode::Linear,
        ..Default::default()
    });
    image
}

/// The encoded texture with opaque alpha, for inspecting the slice tiling.
pub fn preview_image(texture: &VolumeTexture) -> Image {
    let mut image = square_image(texture.size() as u32, texture.preview_rgba());
    image.sampler = ImageSampler::nearest();
    image
}

fn square_image(size: u32, data: Vec<u8>) -> Image {
    Image::new(
        Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::RENDER_WORLD,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lattice::VolumeSpec, texture::build_volume};

    #[test]
    fn local_camera_undoes_the_volume_transform() {
        let volume = GlobalTransform::from(
            Transform::from_xyz(10.0, 0.0, 0.0).with_scale(Vec3::splat(4.0)),
        );
        let camera = GlobalTransform::from(Transform::from_xyz(10.0, 0.0, -8.0));

        let mut params = VolumeParams::default();
        params.update_uniforms(&camera, &volume);
        assert!((params.local_camera - Point::new(0.0, 0.0, -2.0)).norm() < 1e-6);
    }

    #[test]
    fn params_shade_from_the_local_camera() {
        let texture = build_volume(&VolumeSpec::new(Resolution::R16), &|_: Point| 1.0);
        let params = VolumeParams {
            resolution: Resolution::R16,
            intensity: 0.5,
            local_camera: Point::new(0.0, 0.0, -2.0),
        };
        let shaded = params.shade(&texture, &Point::new(0.0, 0.0, -0.5));
        assert!((shaded.alpha() - 0.5 * shaded.path_integral).abs() < 1e-12);
        assert!((shaded.path_integral - 1.0).abs() < 0.02);
    }

    #[test]
    fn images_keep_the_encoded_bytes() {
        let texture = build_volume(&VolumeSpec::new(Resolution::R16), &|p: Point| p.x + 0.5);
        let image = volume_image(&texture);
        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 64);
        assert_eq!(image.data.as_deref(), Some(texture.data()));

        let preview = preview_image(&texture);
        let bytes = preview.data.unwrap_or_default();
        assert!(bytes.chunks_exact(4).all(|t| t[3] == 255));
    }
}
