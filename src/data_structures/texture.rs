//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a backend texture object together with the
//! metadata the engine needs to bind, resample and audit it. Textures are
//! shared through `Arc<Texture>`: the backend object is released when the last
//! owner drops its handle, and a texture loaded from a file removes itself
//! from the [`TextureCache`](crate::resources::texture::TextureCache) it came
//! from at the same moment.

use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock, Weak},
};

use crate::{
    data_structures::{mipmap, pixel_format::PixelFormat},
    error::TextureError,
    lock,
    render::{RenderBackend, RenderTarget, TextureDescriptor, TextureHandle},
    resources::texture::Registry,
};

/// Sampling behaviour outside of the `[0, 1]` texture coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum WrapMode {
    ClampToEdge = 0,
    Clamp = 1,
    #[default]
    Repeat = 2,
}

#[derive(Debug)]
struct TextureState {
    wrap: (WrapMode, WrapMode),
    mip_levels: u32,
    debug_info: String,
    autosave: bool,
    modified: bool,
}

/// One image living in backend memory.
///
/// Width, height and format are fixed at creation. Everything a texture can
/// change afterwards (mip levels, wrap modes, render target bookkeeping) sits
/// behind an internal lock so a shared `Arc<Texture>` can be mutated by any of
/// its owners.
pub struct Texture {
    handle: TextureHandle,
    width: u32,
    height: u32,
    format: PixelFormat,
    pathname: Option<String>,
    framebuffer: Option<u32>,
    is_render_target: bool,
    allocated_levels: u32,
    state: Mutex<TextureState>,
    backend: Arc<dyn RenderBackend>,
    registry: OnceLock<Weak<Registry>>,
}

impl Texture {
    /// Create a texture from raw pixel data.
    ///
    /// `data` must hold exactly one `width` x `height` image in `format`. The
    /// texture is anonymous: it never enters a path registry.
    ///
    /// # Errors
    ///
    /// * `InvalidDimension` when the size is outside the backend's limits
    /// * `UnsupportedFormat` / `UnsupportedPlatform` when the backend can't store `format`
    /// * `InvalidData` when `data` has the wrong length
    /// * `BackendAllocation` when the backend refuses the object
    pub fn from_pixels(
        backend: &Arc<dyn RenderBackend>,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Arc<Self>, TextureError> {
        Self::from_levels(backend, format, width, height, &[data], None)
    }

    /// Create a texture from a base level plus any number of pre-built mip
    /// levels, as compressed containers ship them.
    pub fn from_levels(
        backend: &Arc<dyn RenderBackend>,
        format: PixelFormat,
        width: u32,
        height: u32,
        levels: &[&[u8]],
        pathname: Option<&str>,
    ) -> Result<Arc<Self>, TextureError> {
        check_format(backend.as_ref(), format)?;
        let caps = backend.capabilities();
        caps.limits.check(width, height)?;
        let chain = mipmap::chain_len(width, height, caps.min_mip_size);
        if levels.len() as u32 > chain {
            return Err(TextureError::MipLevelOutOfRange {
                level: levels.len() as u32 - 1,
                levels: chain,
            });
        }
        let handle = backend.create_texture(&TextureDescriptor {
            label: pathname,
            width,
            height,
            format,
            mip_levels: chain,
        })?;
        let texture = Self::wrap(backend, handle, (width, height, chain), format, pathname, None, false);
        for (level, data) in levels.iter().enumerate() {
            let (w, h) = mipmap::level_size(width, height, level as u32);
            texture.upload_mip_level(level as u32, w, h, data)?;
        }
        log::debug!(
            "Created texture {} {}x{} {} with {} level(s)",
            pathname.unwrap_or("<anonymous>"),
            width,
            height,
            format,
            levels.len()
        );
        Ok(texture)
    }

    /// Create an empty texture that can be drawn into.
    ///
    /// On backends that need one, a frame buffer object is allocated with it.
    pub fn create_render_target(
        backend: &Arc<dyn RenderBackend>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Arc<Self>, TextureError> {
        check_format(backend.as_ref(), format)?;
        if format.is_compressed() {
            return Err(TextureError::UnsupportedFormat(format));
        }
        backend.capabilities().limits.check(width, height)?;
        let RenderTarget {
            texture,
            framebuffer,
        } = backend.create_render_target(&TextureDescriptor {
            label: Some("render target"),
            width,
            height,
            format,
            mip_levels: 1,
        })?;
        log::debug!(
            "Created render target {}x{} {} (framebuffer {:?})",
            width,
            height,
            format,
            framebuffer
        );
        let target = Self::wrap(backend, texture, (width, height, 1), format, None, framebuffer, true);
        lock(&target.state).mip_levels = 1;
        Ok(target)
    }

    fn wrap(
        backend: &Arc<dyn RenderBackend>,
        handle: TextureHandle,
        (width, height, allocated_levels): (u32, u32, u32),
        format: PixelFormat,
        pathname: Option<&str>,
        framebuffer: Option<u32>,
        is_render_target: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle,
            width,
            height,
            format,
            pathname: pathname.map(str::to_string),
            framebuffer,
            is_render_target,
            allocated_levels,
            state: Mutex::new(TextureState {
                wrap: (WrapMode::default(), WrapMode::default()),
                mip_levels: 0,
                debug_info: String::new(),
                autosave: true,
                modified: false,
            }),
            backend: backend.clone(),
            registry: OnceLock::new(),
        })
    }

    /// Ties the texture to the registry that owns its path entry.
    pub(crate) fn link_registry(&self, registry: &Arc<Registry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Normalized path the texture was loaded from, `None` when created in code.
    pub fn pathname(&self) -> Option<&str> {
        self.pathname.as_deref()
    }

    pub fn is_render_target(&self) -> bool {
        self.is_render_target
    }

    /// Frame buffer object backing a render target, if the backend uses one.
    pub fn framebuffer(&self) -> Option<u32> {
        self.framebuffer
    }

    pub fn debug_info(&self) -> String {
        lock(&self.state).debug_info.clone()
    }

    pub fn set_debug_info(&self, info: &str) {
        lock(&self.state).debug_info = info.to_string();
    }

    pub fn wrap_mode(&self) -> (WrapMode, WrapMode) {
        lock(&self.state).wrap
    }

    /// Changes how the texture samples outside of `[0, 1]`. Applies on the
    /// next bind.
    pub fn set_wrap_mode(&self, wrap_s: WrapMode, wrap_t: WrapMode) {
        lock(&self.state).wrap = (wrap_s, wrap_t);
        self.backend.set_wrap_mode(self.handle, wrap_s, wrap_t);
    }

    /// Levels allocated on the backend. A full chain for ordinary textures,
    /// a single level for render targets.
    pub fn mip_chain_len(&self) -> u32 {
        self.allocated_levels
    }

    /// Levels that currently hold data.
    pub fn mip_levels(&self) -> u32 {
        lock(&self.state).mip_levels
    }

    /// Bytes used by the base level.
    pub fn size_in_bytes(&self) -> usize {
        self.format.data_size(self.width, self.height)
    }

    /// Replaces the pixels of one mip level.
    ///
    /// `width` and `height` must be the level's size in a standard chain and
    /// `data` must match them in the texture's format.
    pub fn upload_mip_level(
        &self,
        level: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), TextureError> {
        let levels = self.allocated_levels;
        if level >= levels {
            return Err(TextureError::MipLevelOutOfRange { level, levels });
        }
        let (expected_width, expected_height) = mipmap::level_size(self.width, self.height, level);
        if (width, height) != (expected_width, expected_height) {
            return Err(TextureError::MipLevelSize {
                level,
                width,
                height,
                expected_width,
                expected_height,
            });
        }
        let expected = self.format.data_size(width, height);
        if data.len() != expected {
            return Err(TextureError::InvalidData {
                expected,
                actual: data.len(),
            });
        }
        self.backend
            .upload_level(self.handle, level, width, height, data)?;
        let mut state = lock(&self.state);
        state.mip_levels = state.mip_levels.max(level + 1);
        Ok(())
    }

    /// Rebuilds the whole mip chain from the base level.
    pub fn generate_mipmaps(&self) -> Result<(), TextureError> {
        if self.format.is_compressed() {
            return Err(TextureError::UnsupportedFormat(self.format));
        }
        let levels = self.backend.generate_mipmaps(self.handle)?;
        lock(&self.state).mip_levels = levels;
        Ok(())
    }

    /// Controls whether a render target copies itself to host memory after
    /// every render. Only matters on backends that lose content on device
    /// reset; enabled by default.
    pub fn enable_render_target_autosave(&self, enabled: bool) {
        lock(&self.state).autosave = enabled;
    }

    pub fn is_render_target_autosave_enabled(&self) -> bool {
        lock(&self.state).autosave
    }

    /// Reports that a render into this target finished.
    ///
    /// With autosave on, and a backend that can lose content, the fresh
    /// content is saved right away.
    pub fn mark_rendered(&self) -> Result<(), TextureError> {
        if !self.is_render_target {
            return Err(TextureError::NotARenderTarget);
        }
        let autosave = {
            let mut state = lock(&self.state);
            state.modified = true;
            state.autosave
        };
        if autosave && self.backend.capabilities().loses_content_on_reset {
            self.save_to_system_memory()?;
        }
        Ok(())
    }

    /// True while rendered content has not been saved to host memory.
    pub fn is_modified(&self) -> bool {
        lock(&self.state).modified
    }

    /// Copies render target content to host memory so it survives a device
    /// reset.
    pub fn save_to_system_memory(&self) -> Result<(), TextureError> {
        if !self.is_render_target {
            return Err(TextureError::NotARenderTarget);
        }
        self.backend.save_to_system_memory(self.handle)?;
        lock(&self.state).modified = false;
        Ok(())
    }

    /// Marks render target content as stale; it must be rendered again.
    pub fn invalidate(&self) {
        if self.is_render_target {
            self.backend.invalidate(self.handle);
        }
    }

    pub fn is_content_valid(&self) -> bool {
        self.backend.is_content_valid(self.handle)
    }
}

fn check_format(backend: &dyn RenderBackend, format: PixelFormat) -> Result<(), TextureError> {
    if !format.is_concrete() {
        return Err(TextureError::UnsupportedFormat(format));
    }
    if backend.capabilities().supports(format) {
        Ok(())
    } else if format.is_compressed() {
        Err(TextureError::UnsupportedPlatform {
            format,
            backend: backend.kind(),
        })
    } else {
        Err(TextureError::UnsupportedFormat(format))
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("pathname", &self.pathname)
            .field("framebuffer", &self.framebuffer)
            .finish_non_exhaustive()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::debug!(
            "Releasing texture {:?} ({})",
            self.handle,
            self.pathname.as_deref().unwrap_or("<anonymous>")
        );
        self.backend.destroy_texture(self.handle);
        let registry = self.registry.get().and_then(Weak::upgrade);
        if let (Some(registry), Some(path)) = (registry, self.pathname.as_deref()) {
            registry.forget(path, self as *const Texture);
        }
    }
}
