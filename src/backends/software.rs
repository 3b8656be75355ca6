//! A backend that keeps every texture in host memory and records the calls
//! it receives.
//!
//! It behaves like an immediate-mode API: one global state machine holds the
//! current matrices, colour, bound texture and toggles. With
//! [`Capabilities::direct3d9`] it also emulates losing render target content
//! on a device reset, see [`SoftwareBackend::simulate_device_reset`].

use std::{collections::HashMap, sync::Mutex};

use cgmath::{Matrix4, Point3, SquareMatrix};
use log::{info, trace};

use crate::{
    data_structures::{
        bounding_box::BoundingBox, mesh::MeshVertex, mipmap, pixel_format::PixelFormat,
        texture::WrapMode,
    },
    error::TextureError,
    lock,
    render::{
        BackendKind, Capabilities, Color, MatrixSlot, RenderBackend, RenderTarget,
        TextureDescriptor, TextureHandle,
    },
};

/// A call as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture {
        handle: TextureHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    CreateRenderTarget {
        handle: TextureHandle,
        framebuffer: Option<u32>,
    },
    UploadLevel {
        handle: TextureHandle,
        level: u32,
        width: u32,
        height: u32,
    },
    GenerateMipmaps {
        handle: TextureHandle,
        levels: u32,
    },
    SetWrapMode {
        handle: TextureHandle,
        wrap_s: WrapMode,
        wrap_t: WrapMode,
    },
    DestroyTexture(TextureHandle),
    BindTexture(Option<TextureHandle>),
    SaveToSystemMemory(TextureHandle),
    Invalidate(TextureHandle),
    SetMatrix(MatrixSlot, Matrix4<f32>),
    EnableTexturing(bool),
    EnableDepthTest(bool),
    SetColor(Color),
    FlushState,
    DrawIndexed {
        texture: Option<TextureHandle>,
        vertices: usize,
        indices: usize,
    },
    DrawLine {
        from: Point3<f32>,
        to: Point3<f32>,
    },
    DrawBox(BoundingBox),
}

#[derive(Debug)]
struct RenderTargetState {
    framebuffer: Option<u32>,
    saved: Option<Vec<u8>>,
    valid: bool,
}

#[derive(Debug)]
struct StoredTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
    levels: Vec<Option<Vec<u8>>>,
    wrap: (WrapMode, WrapMode),
    reserved: usize,
    render_target: Option<RenderTargetState>,
}

#[derive(Debug)]
struct SoftwareState {
    next_handle: u32,
    next_framebuffer: u32,
    textures: HashMap<TextureHandle, StoredTexture>,
    bytes_in_use: usize,
    model_view: Matrix4<f32>,
    projection: Matrix4<f32>,
    texturing: bool,
    depth_test: bool,
    color: Color,
    bound: Option<TextureHandle>,
    calls: Vec<BackendCall>,
}

impl Default for SoftwareState {
    fn default() -> Self {
        Self {
            next_handle: 1,
            next_framebuffer: 1,
            textures: HashMap::new(),
            bytes_in_use: 0,
            model_view: Matrix4::identity(),
            projection: Matrix4::identity(),
            texturing: true,
            depth_test: true,
            color: Color::WHITE,
            bound: None,
            calls: Vec::new(),
        }
    }
}

impl SoftwareState {
    fn texture_mut(&mut self, handle: TextureHandle) -> Result<&mut StoredTexture, TextureError> {
        self.textures
            .get_mut(&handle)
            .ok_or_else(|| TextureError::BackendAllocation(format!("unknown texture {handle:?}")))
    }
}

#[derive(Debug)]
pub struct SoftwareBackend {
    caps: Capabilities,
    budget: Option<usize>,
    state: Mutex<SoftwareState>,
}

impl SoftwareBackend {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            budget: None,
            state: Mutex::new(SoftwareState::default()),
        }
    }

    /// Caps the bytes all textures may reserve together. Creating a texture
    /// beyond it fails with `BackendAllocation`.
    pub fn with_budget(mut self, bytes: usize) -> Self {
        self.budget = Some(bytes);
        self
    }

    /// Every call recorded since creation or the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn contains(&self, handle: TextureHandle) -> bool {
        lock(&self.state).textures.contains_key(&handle)
    }

    pub fn texture_count(&self) -> usize {
        lock(&self.state).textures.len()
    }

    pub fn bytes_in_use(&self) -> usize {
        lock(&self.state).bytes_in_use
    }

    /// Stored pixels of one level, `None` if it was never written.
    pub fn level_data(&self, handle: TextureHandle, level: u32) -> Option<Vec<u8>> {
        lock(&self.state)
            .textures
            .get(&handle)
            .and_then(|texture| texture.levels.get(level as usize).cloned().flatten())
    }

    pub fn wrap_mode(&self, handle: TextureHandle) -> Option<(WrapMode, WrapMode)> {
        lock(&self.state).textures.get(&handle).map(|texture| texture.wrap)
    }

    pub fn bound_texture(&self) -> Option<TextureHandle> {
        lock(&self.state).bound
    }

    pub fn is_texturing_enabled(&self) -> bool {
        lock(&self.state).texturing
    }

    pub fn is_depth_test_enabled(&self) -> bool {
        lock(&self.state).depth_test
    }

    pub fn color(&self) -> Color {
        lock(&self.state).color
    }

    /// Emulates a lost device.
    ///
    /// On backends that lose content, every render target drops its pixels.
    /// Targets with a saved copy get it back and stay valid, the others are
    /// marked invalid until rendered again. Other backends keep everything.
    pub fn simulate_device_reset(&self) {
        if !self.caps.loses_content_on_reset {
            return;
        }
        let mut state = lock(&self.state);
        let mut restored = 0;
        let mut lost = 0;
        for texture in state.textures.values_mut() {
            let Some(target) = texture.render_target.as_mut() else {
                continue;
            };
            match target.saved.clone() {
                Some(saved) => {
                    texture.levels[0] = Some(saved);
                    target.valid = true;
                    restored += 1;
                }
                None => {
                    texture.levels[0] = None;
                    target.valid = false;
                    lost += 1;
                }
            }
        }
        info!(
            "Device reset: {} render target(s) restored, {} lost",
            restored, lost
        );
    }

    fn allocate(
        &self,
        state: &mut SoftwareState,
        desc: &TextureDescriptor<'_>,
        render_target: Option<RenderTargetState>,
    ) -> Result<TextureHandle, TextureError> {
        let levels = desc.mip_levels.max(1);
        let reserved: usize = (0..levels)
            .map(|level| {
                let (w, h) = mipmap::level_size(desc.width, desc.height, level);
                desc.format.data_size(w, h)
            })
            .sum();
        if let Some(budget) = self.budget
            && state.bytes_in_use + reserved > budget
        {
            return Err(TextureError::BackendAllocation(format!(
                "{} bytes requested, {} of {} in use",
                reserved, state.bytes_in_use, budget
            )));
        }
        let handle = TextureHandle(state.next_handle);
        state.next_handle += 1;
        state.bytes_in_use += reserved;
        state.textures.insert(
            handle,
            StoredTexture {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                levels: vec![None; levels as usize],
                wrap: (WrapMode::default(), WrapMode::default()),
                reserved,
                render_target,
            },
        );
        Ok(handle)
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new(Capabilities::default())
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn create_texture(&self, desc: &TextureDescriptor<'_>) -> Result<TextureHandle, TextureError> {
        let mut state = lock(&self.state);
        let handle = self.allocate(&mut state, desc, None)?;
        state.calls.push(BackendCall::CreateTexture {
            handle,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(handle)
    }

    fn create_render_target(
        &self,
        desc: &TextureDescriptor<'_>,
    ) -> Result<RenderTarget, TextureError> {
        let mut state = lock(&self.state);
        let framebuffer = self.caps.needs_framebuffer.then_some(state.next_framebuffer);
        let handle = self.allocate(
            &mut state,
            desc,
            Some(RenderTargetState {
                framebuffer,
                saved: None,
                valid: true,
            }),
        )?;
        if framebuffer.is_some() {
            state.next_framebuffer += 1;
        }
        state
            .calls
            .push(BackendCall::CreateRenderTarget { handle, framebuffer });
        Ok(RenderTarget {
            texture: handle,
            framebuffer,
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
        let mut state = lock(&self.state);
        let texture = state.texture_mut(handle)?;
        let levels = texture.levels.len() as u32;
        let slot = texture
            .levels
            .get_mut(level as usize)
            .ok_or(TextureError::MipLevelOutOfRange { level, levels })?;
        *slot = Some(data.to_vec());
        if let (0, Some(target)) = (level, texture.render_target.as_mut()) {
            target.valid = true;
        }
        state.calls.push(BackendCall::UploadLevel {
            handle,
            level,
            width,
            height,
        });
        Ok(())
    }

    fn generate_mipmaps(&self, handle: TextureHandle) -> Result<u32, TextureError> {
        let min_size = self.caps.min_mip_size;
        let mut state = lock(&self.state);
        let texture = state.texture_mut(handle)?;
        let expected = texture.format.data_size(texture.width, texture.height);
        let base = texture
            .levels
            .first()
            .cloned()
            .flatten()
            .ok_or(TextureError::InvalidData {
                expected,
                actual: 0,
            })?;
        let chain = mipmap::build_chain(texture.format, texture.width, texture.height, &base, min_size)
            .ok_or(TextureError::UnsupportedFormat(texture.format))?;
        let allocated = texture.levels.len();
        texture.levels.truncate(1);
        texture
            .levels
            .extend(chain.into_iter().take(allocated.saturating_sub(1)).map(Some));
        let levels = texture.levels.len() as u32;
        state
            .calls
            .push(BackendCall::GenerateMipmaps { handle, levels });
        Ok(levels)
    }

    fn set_wrap_mode(&self, handle: TextureHandle, wrap_s: WrapMode, wrap_t: WrapMode) {
        let mut state = lock(&self.state);
        if let Some(texture) = state.textures.get_mut(&handle) {
            texture.wrap = (wrap_s, wrap_t);
        }
        state.calls.push(BackendCall::SetWrapMode {
            handle,
            wrap_s,
            wrap_t,
        });
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = lock(&self.state);
        if let Some(texture) = state.textures.remove(&handle) {
            state.bytes_in_use -= texture.reserved;
            if let Some(framebuffer) = texture.render_target.and_then(|target| target.framebuffer) {
                trace!("Released framebuffer {}", framebuffer);
            }
        }
        if state.bound == Some(handle) {
            state.bound = None;
        }
        state.calls.push(BackendCall::DestroyTexture(handle));
    }

    fn bind_texture(&self, handle: Option<TextureHandle>) {
        let mut state = lock(&self.state);
        state.bound = handle;
        state.calls.push(BackendCall::BindTexture(handle));
    }

    fn save_to_system_memory(&self, handle: TextureHandle) -> Result<(), TextureError> {
        if !self.caps.loses_content_on_reset {
            return Ok(());
        }
        let mut state = lock(&self.state);
        let texture = state.texture_mut(handle)?;
        let base = texture.levels.first().cloned().flatten();
        if let Some(target) = texture.render_target.as_mut() {
            target.saved = base;
        }
        state.calls.push(BackendCall::SaveToSystemMemory(handle));
        Ok(())
    }

    fn invalidate(&self, handle: TextureHandle) {
        if !self.caps.loses_content_on_reset {
            return;
        }
        let mut state = lock(&self.state);
        if let Some(target) = state
            .textures
            .get_mut(&handle)
            .and_then(|texture| texture.render_target.as_mut())
        {
            target.valid = false;
        }
        state.calls.push(BackendCall::Invalidate(handle));
    }

    fn is_content_valid(&self, handle: TextureHandle) -> bool {
        lock(&self.state)
            .textures
            .get(&handle)
            .is_some_and(|texture| texture.render_target.as_ref().is_none_or(|target| target.valid))
    }

    fn matrix(&self, slot: MatrixSlot) -> Matrix4<f32> {
        let state = lock(&self.state);
        match slot {
            MatrixSlot::ModelView => state.model_view,
            MatrixSlot::Projection => state.projection,
        }
    }

    fn set_matrix(&self, slot: MatrixSlot, matrix: Matrix4<f32>) {
        trace!("set_matrix {:?}", slot);
        let mut state = lock(&self.state);
        match slot {
            MatrixSlot::ModelView => state.model_view = matrix,
            MatrixSlot::Projection => state.projection = matrix,
        }
        state.calls.push(BackendCall::SetMatrix(slot, matrix));
    }

    fn enable_texturing(&self, enabled: bool) {
        trace!("enable_texturing {}", enabled);
        let mut state = lock(&self.state);
        state.texturing = enabled;
        state.calls.push(BackendCall::EnableTexturing(enabled));
    }

    fn enable_depth_test(&self, enabled: bool) {
        trace!("enable_depth_test {}", enabled);
        let mut state = lock(&self.state);
        state.depth_test = enabled;
        state.calls.push(BackendCall::EnableDepthTest(enabled));
    }

    fn set_color(&self, color: Color) {
        let mut state = lock(&self.state);
        state.color = color;
        state.calls.push(BackendCall::SetColor(color));
    }

    fn flush_state(&self) {
        lock(&self.state).calls.push(BackendCall::FlushState);
    }

    fn draw_indexed(&self, vertices: &[MeshVertex], indices: &[u32]) {
        let mut state = lock(&self.state);
        let texture = if state.texturing { state.bound } else { None };
        state.calls.push(BackendCall::DrawIndexed {
            texture,
            vertices: vertices.len(),
            indices: indices.len(),
        });
    }

    fn draw_line(&self, from: Point3<f32>, to: Point3<f32>) {
        lock(&self.state)
            .calls
            .push(BackendCall::DrawLine { from, to });
    }

    fn draw_box(&self, bbox: &BoundingBox) {
        lock(&self.state).calls.push(BackendCall::DrawBox(*bbox));
    }
}
