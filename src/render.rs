//! Render backend abstraction.
//!
//! The engine talks to the GPU through [`RenderBackend`], a capability
//! interface with one implementation per native API family:
//!
//! - [`crate::backends::SoftwareBackend`] behaves like an immediate-mode API
//!   with a global state machine (current matrices, colour, toggles). It can
//!   be configured to lose render-target content on device reset the way
//!   Direct3D 9 does.
//! - [`crate::backends::WgpuBackend`] wraps retained `wgpu` objects and queues
//!   draw packets for the caller's render pass.
//!
//! Features that only exist on some APIs (PVRTC, render-target autosave) are
//! expressed through [`Capabilities`] and default trait methods that do
//! nothing, so callers never branch on the backend at compile time.

use std::fmt;

use cgmath::{Matrix4, Point3};

use crate::{
    data_structures::{
        bounding_box::BoundingBox, mesh::MeshVertex, pixel_format::PixelFormat, texture::WrapMode,
    },
    error::TextureError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Software,
    Wgpu,
}

/// Opaque id of a texture object owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Smallest and largest texture extents a platform accepts, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLimits {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

impl TextureLimits {
    pub const MOBILE: TextureLimits = TextureLimits {
        min_width: 8,
        max_width: 1024,
        min_height: 8,
        max_height: 1024,
    };

    pub const DESKTOP: TextureLimits = TextureLimits {
        min_width: 8,
        max_width: 4096,
        min_height: 8,
        max_height: 4096,
    };

    /// Limits of the platform this crate was compiled for.
    pub fn platform_default() -> Self {
        if cfg!(any(target_os = "ios", target_os = "android")) {
            Self::MOBILE
        } else {
            Self::DESKTOP
        }
    }

    pub fn contains(&self, width: u32, height: u32) -> bool {
        (self.min_width..=self.max_width).contains(&width)
            && (self.min_height..=self.max_height).contains(&height)
    }

    pub fn check(&self, width: u32, height: u32) -> Result<(), TextureError> {
        if self.contains(width, height) {
            Ok(())
        } else {
            Err(TextureError::InvalidDimension {
                width,
                height,
                limits: *self,
            })
        }
    }
}

impl Default for TextureLimits {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for TextureLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}]x[{}..{}]",
            self.min_width, self.max_width, self.min_height, self.max_height
        )
    }
}

/// What a backend can do. Queried instead of compiling per platform.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub formats: Vec<PixelFormat>,
    pub limits: TextureLimits,
    /// GPU memory is dropped on device reset and render targets need a host copy.
    pub loses_content_on_reset: bool,
    /// Mip generation stops once both axes are at or below this size.
    pub min_mip_size: u32,
    /// Render targets are backed by a separate frame buffer object.
    pub needs_framebuffer: bool,
}

impl Capabilities {
    /// OpenGL ES class device: PVRTC, frame buffer objects, small textures.
    pub fn gles() -> Self {
        Self {
            formats: PixelFormat::CONCRETE.to_vec(),
            limits: TextureLimits::MOBILE,
            loses_content_on_reset: false,
            min_mip_size: 1,
            needs_framebuffer: true,
        }
    }

    /// Desktop OpenGL: no PVRTC, frame buffer objects.
    pub fn desktop_gl() -> Self {
        Self {
            formats: uncompressed(),
            limits: TextureLimits::DESKTOP,
            loses_content_on_reset: false,
            min_mip_size: 1,
            needs_framebuffer: true,
        }
    }

    /// Direct3D 9 class device: render targets lose content on device reset.
    pub fn direct3d9() -> Self {
        Self {
            formats: uncompressed(),
            limits: TextureLimits::DESKTOP,
            loses_content_on_reset: true,
            min_mip_size: 1,
            needs_framebuffer: false,
        }
    }

    pub fn supports(&self, format: PixelFormat) -> bool {
        self.formats.contains(&format)
    }

    /// First supported entry of `ideal`'s fallback chain.
    pub fn closest(&self, ideal: PixelFormat) -> Option<PixelFormat> {
        ideal
            .fallback_chain()
            .iter()
            .copied()
            .find(|format| self.supports(*format))
    }

    /// Turns a requested format into one this backend stores.
    ///
    /// `Closest` picks the nearest supported relative of `ideal`; a concrete
    /// request must be supported as-is.
    pub fn resolve(&self, requested: PixelFormat, ideal: PixelFormat) -> Option<PixelFormat> {
        match requested {
            PixelFormat::Closest => self.closest(ideal),
            PixelFormat::Invalid => None,
            format => self.supports(format).then_some(format),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        if cfg!(any(target_os = "ios", target_os = "android")) {
            Self::gles()
        } else {
            Self::desktop_gl()
        }
    }
}

fn uncompressed() -> Vec<PixelFormat> {
    PixelFormat::CONCRETE
        .into_iter()
        .filter(|format| !format.is_compressed())
        .collect()
}

/// Matrix slots of the backend's transform state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixSlot {
    ModelView,
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Parameters of a new backend texture object.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Levels the object must be able to hold.
    pub mip_levels: u32,
}

/// Backend objects behind a render target texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub framebuffer: Option<u32>,
}

/// The render backend facade.
///
/// Every method takes `&self`: implementations keep their state behind their
/// own locks so textures can release themselves from any owner, and so the
/// draw protocol can run through a shared reference.
pub trait RenderBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> &Capabilities;

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, TextureError>;

    fn create_render_target(
        &self,
        desc: &TextureDescriptor<'_>,
    ) -> Result<RenderTarget, TextureError>;

    /// Replaces the storage of one level. Sizes are validated by the caller.
    fn upload_level(
        &self,
        handle: TextureHandle,
        level: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), TextureError>;

    /// Rebuilds levels `1..` from level 0 and returns the new level count.
    fn generate_mipmaps(&self, handle: TextureHandle) -> Result<u32, TextureError>;

    fn set_wrap_mode(&self, handle: TextureHandle, wrap_s: WrapMode, wrap_t: WrapMode);

    fn destroy_texture(&self, handle: TextureHandle);

    fn bind_texture(&self, handle: Option<TextureHandle>);

    /// Copies render target content to host memory. No-op unless the backend
    /// loses content on device reset.
    fn save_to_system_memory(&self, _handle: TextureHandle) -> Result<(), TextureError> {
        Ok(())
    }

    /// Marks render target content as stale. No-op unless the backend loses
    /// content on device reset.
    fn invalidate(&self, _handle: TextureHandle) {}

    fn is_content_valid(&self, _handle: TextureHandle) -> bool {
        true
    }

    fn matrix(&self, slot: MatrixSlot) -> Matrix4<f32>;

    fn set_matrix(&self, slot: MatrixSlot, matrix: Matrix4<f32>);

    fn enable_texturing(&self, enabled: bool);

    fn enable_depth_test(&self, enabled: bool);

    fn set_color(&self, color: Color);

    fn flush_state(&self);

    fn draw_indexed(&self, vertices: &[MeshVertex], indices: &[u32]);

    fn draw_line(&self, from: Point3<f32>, to: Point3<f32>);

    /// Outlines `bbox` with its twelve edges.
    fn draw_box(&self, bbox: &BoundingBox) {
        for (from, to) in bbox.edges() {
            self.draw_line(from, to);
        }
    }
}
