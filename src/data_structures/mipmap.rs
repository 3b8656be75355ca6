//! Mip chain arithmetic and CPU downsampling.

use image::{
    RgbaImage,
    imageops::{self, FilterType},
};

use crate::data_structures::pixel_format::{self, PixelFormat};

/// Number of levels in a full chain for a `width` x `height` base level.
///
/// The chain halves both axes (clamped at one texel) until neither axis is
/// larger than `min_size`.
pub fn chain_len(width: u32, height: u32, min_size: u32) -> u32 {
    let min_size = min_size.max(1);
    let (mut w, mut h) = (width.max(1), height.max(1));
    let mut levels = 1;
    while w > min_size || h > min_size {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        levels += 1;
    }
    levels
}

/// Size of `level` for a `width` x `height` base level.
pub fn level_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    let shift = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
    (shift(width), shift(height))
}

/// Filters one level down to the next.
///
/// Pixels go through 8-bit RGBA and back so every uncompressed format shares
/// the same filter. Returns `None` for compressed formats or when `data` does
/// not hold a `width` x `height` image.
pub fn downsample(format: PixelFormat, width: u32, height: u32, data: &[u8]) -> Option<Vec<u8>> {
    let rgba = pixel_format::to_rgba8(format, data)?;
    let image = RgbaImage::from_raw(width, height, rgba)?;
    let (nw, nh) = ((width / 2).max(1), (height / 2).max(1));
    let resized = imageops::resize(&image, nw, nh, FilterType::Triangle);
    pixel_format::from_rgba8(format, resized.as_raw())
}

/// Builds levels `1..` from `base`, stopping at `min_size`.
pub fn build_chain(
    format: PixelFormat,
    width: u32,
    height: u32,
    base: &[u8],
    min_size: u32,
) -> Option<Vec<Vec<u8>>> {
    let levels = chain_len(width, height, min_size);
    let mut chain = Vec::with_capacity(levels.saturating_sub(1) as usize);
    let (mut w, mut h) = (width, height);
    let mut current = base.to_vec();
    for _ in 1..levels {
        current = downsample(format, w, h, &current)?;
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        chain.push(current.clone());
    }
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_reaches_one_texel() {
        assert_eq!(chain_len(256, 256, 1), 9);
        assert_eq!(chain_len(256, 64, 1), 9);
        assert_eq!(chain_len(8, 8, 1), 4);
    }

    #[test]
    fn chain_stops_at_backend_minimum() {
        assert_eq!(chain_len(256, 256, 4), 7);
        assert_eq!(chain_len(8, 8, 8), 1);
    }

    #[test]
    fn level_sizes_clamp_to_one() {
        assert_eq!(level_size(64, 16, 0), (64, 16));
        assert_eq!(level_size(64, 16, 5), (2, 1));
        assert_eq!(level_size(64, 16, 40), (1, 1));
    }

    #[test]
    fn downsample_blends_neighbours() {
        let data = [
            0, 0, 0, 0, 255, 255, 255, 255, //
            255, 255, 255, 255, 0, 0, 0, 0,
        ];
        let out = downsample(PixelFormat::Rgba8888, 2, 2, &data).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|&c| (96..=160).contains(&c)), "{out:?}");
    }

    #[test]
    fn downsample_keeps_flat_colours() {
        let data = [7u8, 50, 200, 255].repeat(4 * 4);
        let out = downsample(PixelFormat::Rgba8888, 4, 4, &data).unwrap();
        assert_eq!(out, [7u8, 50, 200, 255].repeat(2 * 2));
        assert!(downsample(PixelFormat::Rgba8888, 4, 4, &data[..8]).is_none());
    }

    #[test]
    fn build_chain_keeps_the_format() {
        let base = vec![0u8; 8 * 8 * 2];
        let chain = build_chain(PixelFormat::Rgb565, 8, 8, &base, 1).unwrap();
        let sizes: Vec<usize> = chain.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4 * 4 * 2, 2 * 2 * 2, 2]);
    }
}
