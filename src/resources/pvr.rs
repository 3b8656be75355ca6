//! Legacy PowerVR (`.pvr` v2) container parsing.
//!
//! The container is a 52 byte little-endian header followed by the mip levels,
//! largest first. Only the PVRTC payloads are accepted; the pixel data is
//! passed through untouched since only GPUs that speak PVRTC can use it.

use anyhow::{Context, bail, ensure};

use crate::{
    data_structures::{mipmap, pixel_format::PixelFormat},
    render::TextureLimits,
    resources::DecodedImage,
};

pub const HEADER_LEN: usize = 52;
/// `PVR!` read as a little-endian u32.
pub const PVR_TAG: u32 = 0x2152_5650;

const PIXEL_TYPE_MASK: u32 = 0xff;
const OGL_PVRTC2: u32 = 0x18;
const OGL_PVRTC4: u32 = 0x19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PvrHeader {
    pub header_len: u32,
    pub height: u32,
    pub width: u32,
    /// Mip levels after the base level.
    pub mipmap_count: u32,
    pub flags: u32,
    pub data_len: u32,
    pub bpp: u32,
    pub tag: u32,
    pub surface_count: u32,
}

impl PvrHeader {
    pub fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        ensure!(
            bytes.len() >= HEADER_LEN,
            "pvr header needs {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        );
        let word = |i: usize| u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
        let header = Self {
            header_len: word(0),
            height: word(1),
            width: word(2),
            mipmap_count: word(3),
            flags: word(4),
            data_len: word(5),
            bpp: word(6),
            // words 7..11 are channel bit masks
            tag: word(11),
            surface_count: word(12),
        };
        ensure!(header.tag == PVR_TAG, "missing PVR! tag");
        ensure!(
            header.header_len as usize == HEADER_LEN,
            "unsupported pvr header length {}",
            header.header_len
        );
        let max = TextureLimits::DESKTOP;
        ensure!(
            (1..=max.max_width).contains(&header.width)
                && (1..=max.max_height).contains(&header.height),
            "pvr dimensions {}x{} outside 1x1..{}x{}",
            header.width,
            header.height,
            max.max_width,
            max.max_height
        );
        let chain = mipmap::chain_len(header.width, header.height, 1);
        ensure!(
            header.mipmap_count < chain,
            "pvr announces {} mip levels, a {}x{} chain has {}",
            header.mipmap_count,
            header.width,
            header.height,
            chain - 1
        );
        Ok(header)
    }

    pub fn pixel_format(&self) -> anyhow::Result<PixelFormat> {
        match self.flags & PIXEL_TYPE_MASK {
            OGL_PVRTC4 => Ok(PixelFormat::Pvr4),
            OGL_PVRTC2 => Ok(PixelFormat::Pvr2),
            other => bail!("unsupported pvr pixel type {:#x}", other),
        }
    }
}

/// Splits a `.pvr` file into its PVRTC mip levels.
pub fn decode(bytes: &[u8]) -> anyhow::Result<DecodedImage> {
    let header = PvrHeader::parse(bytes)?;
    let format = header.pixel_format()?;
    let payload = &bytes[HEADER_LEN..];
    ensure!(
        payload.len() >= header.data_len as usize,
        "pvr payload truncated: header announces {} bytes, file has {}",
        header.data_len,
        payload.len()
    );

    let mut levels = Vec::with_capacity(header.mipmap_count as usize + 1);
    let mut offset = 0usize;
    let (mut width, mut height) = (header.width, header.height);
    for level in 0..=header.mipmap_count {
        let size = format.data_size(width, height);
        let data = offset
            .checked_add(size)
            .and_then(|end| payload.get(offset..end))
            .with_context(|| format!("pvr level {level} runs past the end of the file"))?;
        levels.push(data.to_vec());
        offset += size;
        width = (width / 2).max(1);
        height = (height / 2).max(1);
    }

    Ok(DecodedImage {
        format,
        width: header.width,
        height: header.height,
        levels,
    })
}

/// Writes a v2 header for `format`. Used to author test containers.
pub fn encode_header(format: PixelFormat, width: u32, height: u32, mipmap_count: u32, data_len: u32) -> Vec<u8> {
    let pixel_type = match format {
        PixelFormat::Pvr2 => OGL_PVRTC2,
        _ => OGL_PVRTC4,
    };
    let words = [
        HEADER_LEN as u32,
        height,
        width,
        mipmap_count,
        pixel_type,
        data_len,
        format.size_in_bits(),
        0,
        0,
        0,
        0,
        PVR_TAG,
        1,
    ];
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
