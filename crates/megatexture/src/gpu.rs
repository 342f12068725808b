use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::binder::{
    END_OF_CHAIN, ImageBinding, LEVEL_SLOTS, NO_CONTRIBUTION, PARAM_SLOTS, ShadingStage,
};
use crate::cache::{
    CacheImageDesc, CacheImageError, CacheImageFormat, ImageFilter, ImageWrap, LevelImageCache,
    TexelRegion, validate_upload,
};

/// Uniform block consumed by the terrain shader: one `vec4<f32>` per
/// parameter slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MegaLevelUniforms {
    pub levels: [[f32; 4]; PARAM_SLOTS],
}

const_assert_eq!(size_of::<MegaLevelUniforms>(), PARAM_SLOTS * 16);

impl Default for MegaLevelUniforms {
    fn default() -> Self {
        let mut levels = [NO_CONTRIBUTION; PARAM_SLOTS];
        levels[PARAM_SLOTS - 1] = END_OF_CHAIN;
        Self { levels }
    }
}

const UNIFORM_BINDING: u32 = 8;
const LEVEL_SAMPLER_BINDING: u32 = 9;
const BORDER_SAMPLER_BINDING: u32 = 10;
const TEXTURE_BINDINGS: u32 = 1 + LEVEL_SLOTS as u32;

fn cache_format_to_wgpu(format: CacheImageFormat) -> wgpu::TextureFormat {
    match format {
        CacheImageFormat::Bc3RgbaUnorm => wgpu::TextureFormat::Bc3RgbaUnorm,
    }
}

fn wrap_to_wgpu(wrap: ImageWrap) -> wgpu::AddressMode {
    match wrap {
        ImageWrap::Repeat => wgpu::AddressMode::Repeat,
        ImageWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_to_wgpu(filter: ImageFilter) -> wgpu::FilterMode {
    match filter {
        ImageFilter::Nearest => wgpu::FilterMode::Nearest,
        ImageFilter::Linear => wgpu::FilterMode::Linear,
    }
}

#[derive(Debug)]
pub struct WgpuLevelImage {
    desc: CacheImageDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuLevelImage {
    pub fn desc(&self) -> &CacheImageDesc {
        &self.desc
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Level cache backed by persistent BC3 textures.
#[derive(Debug, Clone)]
pub struct WgpuLevelCache {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuLevelCache {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, CacheImageError> {
        if !device
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
        {
            return Err(CacheImageError::UnsupportedFormat);
        }
        Ok(Self { device, queue })
    }
}

impl LevelImageCache for WgpuLevelCache {
    type Image = WgpuLevelImage;

    fn create_image(&mut self, desc: &CacheImageDesc) -> Result<Self::Image, CacheImageError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(CacheImageError::ZeroExtent);
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(CacheImageError::Backend(format!(
                "{} exceeds device texture limit {limit}",
                desc.label
            )));
        }
        let format = cache_format_to_wgpu(desc.format);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label.as_str()),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label.as_str()),
            format: Some(format),
            dimension: Some(wgpu::TextureViewDimension::D2),
            ..Default::default()
        });
        Ok(WgpuLevelImage {
            desc: desc.clone(),
            texture,
            view,
        })
    }

    fn upload(
        &mut self,
        image: &Self::Image,
        region: TexelRegion,
        bytes: &[u8],
    ) -> Result<(), CacheImageError> {
        validate_upload(&image.desc, region, bytes)?;
        let format = image.desc.format;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(format.bytes_per_block_row(region.width)),
                rows_per_image: Some(format.block_rows(region.height)),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

struct FlatImage {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_flat_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &'static str,
    rgba: [u8; 4],
) -> FlatImage {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    FlatImage {
        _texture: texture,
        view,
    }
}

/// Collects one frame of level bindings and turns them into a bind group.
///
/// Bindings 0..=7 are the textures in slot order, 8 is the uniform block,
/// 9 the level sampler and 10 the border clamp sampler.
pub struct WgpuShadingStage {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    level_sampler: wgpu::Sampler,
    border_sampler: wgpu::Sampler,
    border_clamp: FlatImage,
    white: FlatImage,
    black: FlatImage,
    views: Vec<wgpu::TextureView>,
    uniforms: MegaLevelUniforms,
}

impl WgpuShadingStage {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let mut entries = Vec::with_capacity(TEXTURE_BINDINGS as usize + 3);
        for binding in 0..TEXTURE_BINDINGS {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        for binding in [LEVEL_SAMPLER_BINDING, BORDER_SAMPLER_BINDING] {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("megatexture.levels.layout"),
            entries: &entries,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("megatexture.levels.uniforms"),
            size: size_of::<MegaLevelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let level_address = wrap_to_wgpu(ImageWrap::Repeat);
        let level_filter = filter_to_wgpu(ImageFilter::Linear);
        let level_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("megatexture.levels.sampler"),
            address_mode_u: level_address,
            address_mode_v: level_address,
            mag_filter: level_filter,
            min_filter: level_filter,
            ..Default::default()
        });
        let border_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("megatexture.border.sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let border_clamp = create_flat_image(&device, &queue, "megatexture.border_clamp", [0; 4]);
        let white = create_flat_image(&device, &queue, "megatexture.white", [255; 4]);
        let black = create_flat_image(&device, &queue, "megatexture.black", [0, 0, 0, 255]);
        let views = vec![white.view.clone(); TEXTURE_BINDINGS as usize];

        Self {
            device,
            queue,
            layout,
            uniform_buffer,
            level_sampler,
            border_sampler,
            border_clamp,
            white,
            black,
            views,
            uniforms: MegaLevelUniforms::default(),
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn uniforms(&self) -> &MegaLevelUniforms {
        &self.uniforms
    }

    /// Uploads the collected parameters and builds the bind group for draw.
    pub fn finish(&self) -> wgpu::BindGroup {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
        let mut entries = Vec::with_capacity(self.views.len() + 3);
        for (binding, view) in self.views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: UNIFORM_BINDING,
            resource: self.uniform_buffer.as_entire_binding(),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: LEVEL_SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(&self.level_sampler),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: BORDER_SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(&self.border_sampler),
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("megatexture.levels.bind_group"),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

impl ShadingStage for WgpuShadingStage {
    type Image = WgpuLevelImage;

    fn bind_image(&mut self, texture_slot: u32, image: ImageBinding<'_, Self::Image>) {
        let view = match image {
            ImageBinding::BorderClamp => self.border_clamp.view.clone(),
            ImageBinding::White => self.white.view.clone(),
            ImageBinding::Black => self.black.view.clone(),
            ImageBinding::Level(image) => image.view.clone(),
        };
        if let Some(slot) = self.views.get_mut(texture_slot as usize) {
            *slot = view;
        } else {
            log::warn!("[megatexture] texture slot {texture_slot} has no binding");
        }
    }

    fn set_level_params(&mut self, param_slot: u32, params: [f32; 4]) {
        if let Some(slot) = self.uniforms.levels.get_mut(param_slot as usize) {
            *slot = params;
        } else {
            log::warn!("[megatexture] parameter slot {param_slot} has no binding");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::TERMINAL_PARAM_SLOT;

    #[test]
    fn default_uniforms_contribute_nothing_until_bound() {
        let uniforms = MegaLevelUniforms::default();
        for slot in 0..LEVEL_SLOTS {
            assert_eq!(uniforms.levels[slot], NO_CONTRIBUTION);
        }
        assert_eq!(uniforms.levels[TERMINAL_PARAM_SLOT as usize], END_OF_CHAIN);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 128);
    }

    #[test]
    fn block_compressed_rows_cover_four_texel_rows() {
        let format = CacheImageFormat::Bc3RgbaUnorm;
        assert_eq!(format.bytes_per_block_row(128), 512);
        assert_eq!(format.block_rows(128), 32);
        assert_eq!(cache_format_to_wgpu(format), wgpu::TextureFormat::Bc3RgbaUnorm);
    }
}
