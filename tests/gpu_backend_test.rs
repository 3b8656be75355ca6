#![cfg(feature = "integration-tests")]

use std::sync::Arc;

use tex_ngin::{
    backends::WgpuBackend,
    data_structures::{
        mesh::Material,
        mesh_instance::{DebugFlags, MeshInstanceNode},
        pixel_format::PixelFormat,
        scene_graph::Scene,
    },
    error::TextureError,
    render::{BackendKind, RenderBackend, TextureLimits},
    resources::texture::{TextureCache, TextureSettings},
};

use crate::common::test_utils::{box_mesh, init_logger, rgba};

mod common;

fn gpu_backend() -> anyhow::Result<Arc<WgpuBackend>> {
    init_logger();
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = futures::executor::block_on(
        instance.request_adapter(&wgpu::RequestAdapterOptions::default()),
    )?;
    let (device, queue) =
        futures::executor::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))?;
    Ok(Arc::new(WgpuBackend::new(device, queue)))
}

fn cache(backend: &Arc<WgpuBackend>) -> TextureCache {
    let backend: Arc<dyn RenderBackend> = backend.clone();
    TextureCache::new(backend, TextureSettings::default()).unwrap()
}

#[test]
fn uploads_and_releases_textures() {
    let backend = gpu_backend().unwrap();
    let cache = cache(&backend);
    assert_eq!(backend.kind(), BackendKind::Wgpu);
    assert!(backend.capabilities().limits.max_width <= TextureLimits::platform_default().max_width);

    let texture = cache
        .create_from_pixels(PixelFormat::Rgba4444, &[0xff; 16 * 16 * 2], 16, 16)
        .unwrap();
    assert_eq!(texture.mip_levels(), 5);
    assert!(backend.binding(texture.handle()).is_some());

    let handle = texture.handle();
    drop(texture);
    assert!(backend.binding(handle).is_none());
}

#[test]
fn refuses_pvrtc() {
    let backend = gpu_backend().unwrap();
    let cache = cache(&backend);

    assert!(matches!(
        cache.create_from_pixels(PixelFormat::Pvr2, &[0; 32], 16, 8),
        Err(TextureError::UnsupportedPlatform {
            backend: BackendKind::Wgpu,
            ..
        })
    ));
}

#[test]
fn draws_become_packets() {
    let backend = gpu_backend().unwrap();
    let cache = cache(&backend);
    let texture = cache
        .create_from_pixels(PixelFormat::Rgba8888, &rgba(8, 8, [255; 4]), 8, 8)
        .unwrap();

    let scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(
        box_mesh("cube", &[([0.0; 3], [1.0; 3])]),
        0,
        Arc::new(Material::new("white", Some(texture.clone()))),
    )
    .unwrap();
    node.set_debug_flags(DebugFlags::LOCAL_AXIS);
    node.draw(backend.as_ref());

    let frame = backend.take_frame();
    assert_eq!(frame.draws.len(), 1);
    assert_eq!(frame.draws[0].texture, Some(texture.handle()));
    assert_eq!(frame.draws[0].num_indices, 3);
    assert_eq!(frame.lines.len(), 3);
    assert!(frame.lines.iter().all(|line| !line.depth_test));
    assert!(backend.take_frame().draws.is_empty());
}
