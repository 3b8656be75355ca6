//! `wgpu` backend.
//!
//! Textures become retained `wgpu::Texture`s with a view and a sampler each.
//! There is no immediate-mode pipeline behind it: draw calls are turned into
//! [`DrawPacket`]s and [`LinePacket`]s carrying the render state of the moment
//! they were issued, and the owner of the render pass drains them once per
//! frame with [`WgpuBackend::take_frame`].

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use cgmath::{Matrix4, Point3, SquareMatrix};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        mesh::MeshVertex,
        mipmap,
        pixel_format::{self, PixelFormat},
        texture::WrapMode,
    },
    error::TextureError,
    lock,
    render::{
        BackendKind, Capabilities, Color, MatrixSlot, RenderBackend, RenderTarget,
        TextureDescriptor, TextureHandle, TextureLimits,
    },
};

/// One indexed draw, ready to be recorded into a render pass.
#[derive(Debug)]
pub struct DrawPacket {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    /// Bound texture, `None` when texturing was off.
    pub texture: Option<TextureHandle>,
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub color: Color,
    pub depth_test: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePacket {
    pub from: Point3<f32>,
    pub to: Point3<f32>,
    pub model_view: Matrix4<f32>,
    pub color: Color,
    pub depth_test: bool,
}

/// Everything drawn since the last [`WgpuBackend::take_frame`].
#[derive(Debug, Default)]
pub struct Frame {
    pub draws: Vec<DrawPacket>,
    pub lines: Vec<LinePacket>,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    format: PixelFormat,
    width: u32,
    height: u32,
    /// Level 0 as uploaded, kept to build mip levels on the CPU.
    base: Option<Vec<u8>>,
}

struct DrawState {
    model_view: Matrix4<f32>,
    projection: Matrix4<f32>,
    texturing: bool,
    depth_test: bool,
    color: Color,
    bound: Option<TextureHandle>,
    frame: Frame,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: Capabilities,
    next_handle: AtomicU32,
    textures: Mutex<HashMap<TextureHandle, GpuTexture>>,
    state: Mutex<DrawState>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let caps = Capabilities {
            formats: vec![
                PixelFormat::Rgba8888,
                PixelFormat::Rgb565,
                PixelFormat::Rgba4444,
                PixelFormat::A8,
            ],
            limits: device_limits(
                TextureLimits::platform_default(),
                device.limits().max_texture_dimension_2d,
            ),
            loses_content_on_reset: false,
            min_mip_size: 1,
            needs_framebuffer: false,
        };
        Self {
            device,
            queue,
            caps,
            next_handle: AtomicU32::new(1),
            textures: Mutex::new(HashMap::new()),
            state: Mutex::new(DrawState {
                model_view: Matrix4::identity(),
                projection: Matrix4::identity(),
                texturing: true,
                depth_test: true,
                color: Color::WHITE,
                bound: None,
                frame: Frame::default(),
            }),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View and sampler to put into a bind group for `handle`.
    pub fn binding(&self, handle: TextureHandle) -> Option<(wgpu::TextureView, wgpu::Sampler)> {
        lock(&self.textures)
            .get(&handle)
            .map(|texture| (texture.view.clone(), texture.sampler.clone()))
    }

    pub fn texture_count(&self) -> usize {
        lock(&self.textures).len()
    }

    /// Hands out everything queued since the previous call.
    pub fn take_frame(&self) -> Frame {
        std::mem::take(&mut lock(&self.state).frame)
    }

    fn allocate(
        &self,
        desc: &TextureDescriptor<'_>,
        usage: wgpu::TextureUsages,
    ) -> Result<TextureHandle, TextureError> {
        let format = gpu_format(desc.format)?;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_sampler(&self.device, WrapMode::default(), WrapMode::default());
        let handle = TextureHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        lock(&self.textures).insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler,
                format: desc.format,
                width: desc.width,
                height: desc.height,
                base: None,
            },
        );
        debug!(
            "wgpu texture {:?} {}x{} {:?}",
            handle, desc.width, desc.height, format
        );
        Ok(handle)
    }

    fn write_level(
        &self,
        texture: &wgpu::Texture,
        format: PixelFormat,
        level: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), TextureError> {
        let (pixels, bytes_per_texel) = match format {
            PixelFormat::Rgba8888 => (data.to_vec(), 4),
            PixelFormat::A8 => (data.to_vec(), 1),
            PixelFormat::Rgb565 | PixelFormat::Rgba4444 => (
                pixel_format::to_rgba8(format, data).ok_or(TextureError::UnsupportedFormat(format))?,
                4,
            ),
            other => return Err(TextureError::UnsupportedFormat(other)),
        };
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_texel * width),
                rows_per_image: Some(height),
            },
            size,
        );
        Ok(())
    }
}

/// Platform limits, further capped by what the device can allocate.
fn device_limits(platform: TextureLimits, device_max: u32) -> TextureLimits {
    TextureLimits {
        max_width: platform.max_width.min(device_max),
        max_height: platform.max_height.min(device_max),
        ..platform
    }
}

/// Storage format on the GPU. 16-bit formats are expanded to RGBA8 since
/// `wgpu` has no portable packed 16-bit colour formats.
///
/// A8 is stored as `R8Unorm`: the coverage lands in the red channel and
/// sampling `.a` yields 1.0. Shaders for alpha-only materials must read `.r`.
fn gpu_format(format: PixelFormat) -> Result<wgpu::TextureFormat, TextureError> {
    match format {
        PixelFormat::Rgba8888 | PixelFormat::Rgb565 | PixelFormat::Rgba4444 => {
            Ok(wgpu::TextureFormat::Rgba8Unorm)
        }
        PixelFormat::A8 => Ok(wgpu::TextureFormat::R8Unorm),
        PixelFormat::Pvr4 | PixelFormat::Pvr2 => Err(TextureError::UnsupportedPlatform {
            format,
            backend: BackendKind::Wgpu,
        }),
        other => Err(TextureError::UnsupportedFormat(other)),
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::Clamp | WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn create_sampler(device: &wgpu::Device, wrap_s: WrapMode, wrap_t: WrapMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: address_mode(wrap_s),
        address_mode_v: address_mode(wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

impl RenderBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, TextureError> {
        self.allocate(
            desc,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        )
    }

    fn create_render_target(
        &self,
        desc: &TextureDescriptor<'_>,
    ) -> Result<RenderTarget, TextureError> {
        let texture = self.allocate(
            desc,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        )?;
        // the texture view is the attachment, no separate frame buffer object
        Ok(RenderTarget {
            texture,
            framebuffer: None,
        })
    }

    fn upload_level(
        &self,
        handle: TextureHandle,
        level: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), TextureError> {
        let mut textures = lock(&self.textures);
        let entry = textures
            .get_mut(&handle)
            .ok_or_else(|| TextureError::BackendAllocation(format!("unknown texture {handle:?}")))?;
        if level >= entry.texture.mip_level_count() {
            return Err(TextureError::MipLevelOutOfRange {
                level,
                levels: entry.texture.mip_level_count(),
            });
        }
        self.write_level(&entry.texture, entry.format, level, width, height, data)?;
        if level == 0 {
            entry.base = Some(data.to_vec());
        }
        Ok(())
    }

    fn generate_mipmaps(&self, handle: TextureHandle) -> Result<u32, TextureError> {
        let textures = lock(&self.textures);
        let entry = textures
            .get(&handle)
            .ok_or_else(|| TextureError::BackendAllocation(format!("unknown texture {handle:?}")))?;
        let Some(base) = entry.base.as_deref() else {
            warn!("Texture {:?} has no base level to build mip levels from", handle);
            return Ok(1);
        };
        let chain = mipmap::build_chain(
            entry.format,
            entry.width,
            entry.height,
            base,
            self.caps.min_mip_size,
        )
        .ok_or(TextureError::UnsupportedFormat(entry.format))?;
        let allocated = entry.texture.mip_level_count();
        for (index, data) in chain.iter().enumerate() {
            let level = index as u32 + 1;
            if level >= allocated {
                break;
            }
            let (w, h) = mipmap::level_size(entry.width, entry.height, level);
            self.write_level(&entry.texture, entry.format, level, w, h, data)?;
        }
        Ok((chain.len() as u32 + 1).min(allocated))
    }

    fn set_wrap_mode(&self, handle: TextureHandle, wrap_s: WrapMode, wrap_t: WrapMode) {
        if let Some(entry) = lock(&self.textures).get_mut(&handle) {
            entry.sampler = create_sampler(&self.device, wrap_s, wrap_t);
        }
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        if let Some(entry) = lock(&self.textures).remove(&handle) {
            entry.texture.destroy();
        }
        let mut state = lock(&self.state);
        if state.bound == Some(handle) {
            state.bound = None;
        }
    }

    fn bind_texture(&self, handle: Option<TextureHandle>) {
        lock(&self.state).bound = handle;
    }

    fn matrix(&self, slot: MatrixSlot) -> Matrix4<f32> {
        let state = lock(&self.state);
        match slot {
            MatrixSlot::ModelView => state.model_view,
            MatrixSlot::Projection => state.projection,
        }
    }

    fn set_matrix(&self, slot: MatrixSlot, matrix: Matrix4<f32>) {
        let mut state = lock(&self.state);
        match slot {
            MatrixSlot::ModelView => state.model_view = matrix,
            MatrixSlot::Projection => state.projection = matrix,
        }
    }

    fn enable_texturing(&self, enabled: bool) {
        lock(&self.state).texturing = enabled;
    }

    fn enable_depth_test(&self, enabled: bool) {
        lock(&self.state).depth_test = enabled;
    }

    fn set_color(&self, color: Color) {
        lock(&self.state).color = color;
    }

    // packets snapshot the state when queued, nothing is pending
    fn flush_state(&self) {}

    fn draw_indexed(&self, vertices: &[MeshVertex], indices: &[u32]) {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let mut state = lock(&self.state);
        let packet = DrawPacket {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
            texture: if state.texturing { state.bound } else { None },
            model_view: state.model_view,
            projection: state.projection,
            color: state.color,
            depth_test: state.depth_test,
        };
        state.frame.draws.push(packet);
    }

    fn draw_line(&self, from: Point3<f32>, to: Point3<f32>) {
        let mut state = lock(&self.state);
        let packet = LinePacket {
            from,
            to,
            model_view: state.model_view,
            color: state.color,
            depth_test: state.depth_test,
        };
        state.frame.lines.push(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_limits_never_exceed_the_platform() {
        assert_eq!(device_limits(TextureLimits::DESKTOP, 16384), TextureLimits::DESKTOP);
        assert_eq!(device_limits(TextureLimits::MOBILE, 8192).max_width, 1024);
        let small = device_limits(TextureLimits::DESKTOP, 2048);
        assert_eq!((small.max_width, small.max_height), (2048, 2048));
        assert_eq!(small.min_width, 8);
    }
}
