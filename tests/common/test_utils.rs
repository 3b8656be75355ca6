use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use cgmath::Point3;
use tex_ngin::{
    backends::{BackendCall, SoftwareBackend},
    data_structures::{
        mesh::{Mesh, MeshVertex, PolygonGroup},
        pixel_format::PixelFormat,
    },
    render::{Capabilities, RenderBackend},
    resources::{
        pvr,
        texture::{TextureCache, TextureSettings},
    },
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn software(caps: Capabilities) -> Arc<SoftwareBackend> {
    init_logger();
    Arc::new(SoftwareBackend::new(caps))
}

/// A cache on `backend` that resolves relative paths against `asset_root`.
pub fn cache_on(backend: &Arc<SoftwareBackend>, asset_root: &Path) -> TextureCache {
    let backend: Arc<dyn RenderBackend> = backend.clone();
    TextureCache::new(
        backend,
        TextureSettings {
            asset_root: asset_root.to_path_buf(),
            ..Default::default()
        },
    )
    .expect("placeholder fits on every test backend")
}

pub fn rgba(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    pixel
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect()
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32, pixel: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbaImage::from_pixel(width, height, image::Rgba(pixel))
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

/// Writes a `.pvr` with `mipmap_count` levels after the base, each level
/// filled with its own index.
pub fn write_pvr(dir: &Path, name: &str, format: PixelFormat, size: u32, mipmap_count: u32) -> PathBuf {
    let mut payload = Vec::new();
    let mut s = size;
    for level in 0..=mipmap_count {
        payload.extend(std::iter::repeat_n(level as u8, format.data_size(s, s)));
        s = (s / 2).max(1);
    }
    let mut bytes = pvr::encode_header(format, size, size, mipmap_count, payload.len() as u32);
    bytes.extend(payload);
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// A mesh with one group per `(min, max)` pair, each group spanning exactly
/// that box.
pub fn box_mesh(name: &str, boxes: &[([f32; 3], [f32; 3])]) -> Arc<Mesh> {
    let mut mesh = Mesh::new(name);
    for &(min, max) in boxes {
        let vertices = vec![
            MeshVertex::new(min, [0.0, 0.0]),
            MeshVertex::new(max, [1.0, 1.0]),
            MeshVertex::new([min[0], max[1], min[2]], [0.0, 1.0]),
        ];
        mesh.add_polygon_group(PolygonGroup::new(vertices, vec![0, 1, 2]));
    }
    Arc::new(mesh)
}

pub fn point(x: f32, y: f32, z: f32) -> Point3<f32> {
    Point3::new(x, y, z)
}

pub fn created_textures(calls: &[BackendCall]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, BackendCall::CreateTexture { .. }))
        .count()
}
