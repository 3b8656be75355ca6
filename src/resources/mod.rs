use std::path::{Path, PathBuf};

use crate::{data_structures::pixel_format::PixelFormat, error::TextureError};

/**
 * This module contains all logic for loading textures from external files.
 */
pub mod png;
pub mod pvr;
pub mod texture;

/// Pixels handed back by a decoder, base level first.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<Vec<u8>>,
}

/// Container formats the loaders understand, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageContainer {
    Png,
    Pvr,
}

impl ImageContainer {
    pub fn from_path(path: &str) -> Result<Self, TextureError> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "png" => Ok(ImageContainer::Png),
            "pvr" => Ok(ImageContainer::Pvr),
            _ => Err(TextureError::UnsupportedExtension(extension)),
        }
    }

    pub fn decode(self, path: &str, bytes: &[u8]) -> Result<DecodedImage, TextureError> {
        let decoded = match self {
            ImageContainer::Png => png::decode(bytes),
            ImageContainer::Pvr => pvr::decode(bytes),
        };
        decoded.map_err(|source| TextureError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Normalizes a texture path into its registry key.
///
/// Backslashes become slashes, empty and `.` segments disappear and `..`
/// eats the segment before it. A leading `/` or a `prefix:` such as
/// `~res:` is kept.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." && !last.ends_with(':') => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Where a (normalized) texture path lives on disk.
pub fn resolve_path(asset_root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        asset_root.join(candidate)
    }
}

pub fn load_binary(asset_root: &Path, file_name: &str) -> Result<Vec<u8>, TextureError> {
    let path = resolve_path(asset_root, file_name);
    std::fs::read(&path).map_err(|source| TextureError::Io { path, source })
}

/// Reads and decodes an image file, choosing the decoder by extension.
pub fn load_image(asset_root: &Path, file_name: &str) -> Result<DecodedImage, TextureError> {
    let container = ImageContainer::from_path(file_name)?;
    let data = load_binary(asset_root, file_name)?;
    container.decode(file_name, &data)
}
