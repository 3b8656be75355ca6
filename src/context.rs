use std::sync::Arc;

use crate::{
    backends::{SoftwareBackend, WgpuBackend},
    error::TextureError,
    render::{Capabilities, RenderBackend},
    resources::texture::{TextureCache, TextureSettings},
};

/// A render backend together with the texture cache that allocates on it.
///
/// Applications usually create one context and pass `&context.textures`
/// wherever textures are loaded.
pub struct Context {
    pub backend: Arc<dyn RenderBackend>,
    pub textures: TextureCache,
}

impl Context {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        log::info!(
            "Creating context on the {:?} backend, limits {}",
            backend.kind(),
            backend.capabilities().limits
        );
        let textures = TextureCache::new(backend.clone(), settings)?;
        Ok(Self { backend, textures })
    }

    /// Context on a [`SoftwareBackend`] with the given capabilities.
    pub fn software(caps: Capabilities, settings: TextureSettings) -> Result<Self, TextureError> {
        Self::new(Arc::new(SoftwareBackend::new(caps)), settings)
    }

    /// Context on an already created `wgpu` device.
    pub fn wgpu(
        device: wgpu::Device,
        queue: wgpu::Queue,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        Self::new(Arc::new(WgpuBackend::new(device, queue)), settings)
    }
}
