//! Error types for texture resources and scene nodes.

use std::path::PathBuf;

use thiserror::Error;

use crate::data_structures::pixel_format::PixelFormat;
use crate::render::{BackendKind, TextureLimits};

/// Everything that can go wrong while creating or mutating a texture.
///
/// Factory functions return one of these instead of a half-built resource, and
/// a texture that failed to load never enters the path registry.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture size {width}x{height} is outside of {limits}")]
    InvalidDimension {
        width: u32,
        height: u32,
        limits: TextureLimits,
    },
    #[error("pixel format {0} is not supported here")]
    UnsupportedFormat(PixelFormat),
    #[error("no texture decoder for extension `{0}`")]
    UnsupportedExtension(String),
    #[error("{format} textures are not available on the {backend:?} backend")]
    UnsupportedPlatform {
        format: PixelFormat,
        backend: BackendKind,
    },
    #[error("could not decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("pixel data has {actual} bytes, expected {expected}")]
    InvalidData { expected: usize, actual: usize },
    #[error("mip level {level} is outside of a chain with {levels} levels")]
    MipLevelOutOfRange { level: u32, levels: u32 },
    #[error("mip level {level} must be {expected_width}x{expected_height}, got {width}x{height}")]
    MipLevelSize {
        level: u32,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("backend refused the allocation: {0}")]
    BackendAllocation(String),
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("texture is not a render target")]
    NotARenderTarget,
}

/// Errors raised by scene nodes while they are being assembled.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SceneError {
    #[error("polygon group {index} does not exist, the mesh has {count} groups")]
    PolygonGroupOutOfRange { index: usize, count: usize },
}
