//! PNG decoding through the `image` crate.

use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::{data_structures::pixel_format::PixelFormat, resources::DecodedImage};

/// Decodes a PNG into a single 8-bit RGBA level.
pub fn decode(bytes: &[u8]) -> anyhow::Result<DecodedImage> {
    let img = load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    Ok(DecodedImage {
        format: PixelFormat::Rgba8888,
        width,
        height,
        levels: vec![rgba.into_raw()],
    })
}
