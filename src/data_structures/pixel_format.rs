//! Pixel formats, their metadata and conversions between them.
//!
//! [`PixelFormat`] is the engine-facing format enumeration. Every concrete format
//! has a fixed bit size; `Invalid` and `Closest` are markers that only exist
//! for metadata queries and format negotiation. Conversions always go through
//! 8-bit RGBA, which is what the image decoders hand back.

use std::fmt;

/// Label returned for values that don't describe a concrete format.
pub const WRONG_FORMAT: &str = "WRONG FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PixelFormat {
    #[default]
    Invalid = 0,
    Rgba8888 = 1,
    Rgb565 = 2,
    Rgba4444 = 3,
    A8 = 4,
    /// PVRTC, 4 bits per pixel.
    Pvr4 = 5,
    /// PVRTC, 2 bits per pixel.
    Pvr2 = 6,
    /// Ask for the supported format nearest to an ideal one.
    Closest = 256,
}

impl PixelFormat {
    /// All formats that describe actual pixel storage.
    pub const CONCRETE: [PixelFormat; 6] = [
        PixelFormat::Rgba8888,
        PixelFormat::Rgb565,
        PixelFormat::Rgba4444,
        PixelFormat::A8,
        PixelFormat::Pvr4,
        PixelFormat::Pvr2,
    ];

    /// Bits per pixel, or `0` for `Invalid` and `Closest`.
    pub fn size_in_bits(self) -> u32 {
        match self {
            PixelFormat::Rgba8888 => 32,
            PixelFormat::Rgb565 | PixelFormat::Rgba4444 => 16,
            PixelFormat::A8 => 8,
            PixelFormat::Pvr4 => 4,
            PixelFormat::Pvr2 => 2,
            PixelFormat::Invalid | PixelFormat::Closest => 0,
        }
    }

    /// Human readable name, [`WRONG_FORMAT`] for markers.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgba8888 => "RGBA8888",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Rgba4444 => "RGBA4444",
            PixelFormat::A8 => "A8",
            PixelFormat::Pvr4 => "PVR4",
            PixelFormat::Pvr2 => "PVR2",
            PixelFormat::Invalid | PixelFormat::Closest => WRONG_FORMAT,
        }
    }

    pub fn is_concrete(self) -> bool {
        self.size_in_bits() > 0
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, PixelFormat::Pvr4 | PixelFormat::Pvr2)
    }

    /// Number of bytes a `width` x `height` image takes in this format.
    ///
    /// PVRTC stores whole blocks, so tiny levels still occupy a minimum
    /// footprint (8x8 texels for PVR4, 16x8 for PVR2).
    pub fn data_size(self, width: u32, height: u32) -> usize {
        let (w, h) = match self {
            PixelFormat::Pvr4 => (width.max(8), height.max(8)),
            PixelFormat::Pvr2 => (width.max(16), height.max(8)),
            _ => (width, height),
        };
        (w as usize)
            .saturating_mul(h as usize)
            .saturating_mul(self.size_in_bits() as usize)
            / 8
    }

    /// Ranked replacements for `self`, best first, `self` included.
    ///
    /// Used to resolve [`PixelFormat::Closest`] against the set of formats a
    /// backend can actually store. Alpha is preserved before precision, and
    /// compressed formats fall back to their sibling before going
    /// uncompressed.
    pub fn fallback_chain(self) -> &'static [PixelFormat] {
        use PixelFormat::*;
        match self {
            Rgba8888 => &[Rgba8888, Rgba4444, Rgb565],
            Rgba4444 => &[Rgba4444, Rgba8888, Rgb565],
            Rgb565 => &[Rgb565, Rgba8888, Rgba4444],
            A8 => &[A8, Rgba8888, Rgba4444],
            Pvr4 => &[Pvr4, Pvr2, Rgba8888, Rgba4444],
            Pvr2 => &[Pvr2, Pvr4, Rgba4444, Rgba8888],
            Invalid | Closest => &[Rgba8888, Rgba4444, Rgb565],
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PixelFormat::Invalid),
            1 => Ok(PixelFormat::Rgba8888),
            2 => Ok(PixelFormat::Rgb565),
            3 => Ok(PixelFormat::Rgba4444),
            4 => Ok(PixelFormat::A8),
            5 => Ok(PixelFormat::Pvr4),
            6 => Ok(PixelFormat::Pvr2),
            256 => Ok(PixelFormat::Closest),
            other => Err(other),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bits per pixel for a raw format value, `0` when the value is unknown.
pub fn pixel_format_size(value: u32) -> u32 {
    PixelFormat::try_from(value).map_or(0, PixelFormat::size_in_bits)
}

/// Name for a raw format value, [`WRONG_FORMAT`] when the value is unknown.
pub fn pixel_format_name(value: u32) -> &'static str {
    PixelFormat::try_from(value).map_or(WRONG_FORMAT, PixelFormat::name)
}

/// Packs 8-bit RGBA pixels into `format`.
///
/// Returns `None` for compressed formats and markers; there is no encoder for
/// those.
pub fn from_rgba8(format: PixelFormat, rgba: &[u8]) -> Option<Vec<u8>> {
    let pixels = rgba.chunks_exact(4);
    let packed = match format {
        PixelFormat::Rgba8888 => rgba.to_vec(),
        PixelFormat::Rgb565 => pixels
            .flat_map(|p| {
                let v = (u16::from(p[0] >> 3) << 11)
                    | (u16::from(p[1] >> 2) << 5)
                    | u16::from(p[2] >> 3);
                v.to_le_bytes()
            })
            .collect(),
        PixelFormat::Rgba4444 => pixels
            .flat_map(|p| {
                let v = (u16::from(p[0] >> 4) << 12)
                    | (u16::from(p[1] >> 4) << 8)
                    | (u16::from(p[2] >> 4) << 4)
                    | u16::from(p[3] >> 4);
                v.to_le_bytes()
            })
            .collect(),
        PixelFormat::A8 => pixels.map(|p| p[3]).collect(),
        _ => return None,
    };
    Some(packed)
}

/// Expands pixels stored in `format` to 8-bit RGBA.
///
/// A8 expands to black with the stored alpha, which is how an alpha-only
/// texture samples. Returns `None` for compressed formats and markers.
pub fn to_rgba8(format: PixelFormat, data: &[u8]) -> Option<Vec<u8>> {
    let expanded = match format {
        PixelFormat::Rgba8888 => data.to_vec(),
        PixelFormat::Rgb565 => data
            .chunks_exact(2)
            .flat_map(|c| {
                let v = u16::from_le_bytes([c[0], c[1]]);
                let r = ((v >> 11) & 0x1f) as u8;
                let g = ((v >> 5) & 0x3f) as u8;
                let b = (v & 0x1f) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
            })
            .collect(),
        PixelFormat::Rgba4444 => data
            .chunks_exact(2)
            .flat_map(|c| {
                let v = u16::from_le_bytes([c[0], c[1]]);
                [
                    ((v >> 12) & 0xf) as u8 * 17,
                    ((v >> 8) & 0xf) as u8 * 17,
                    ((v >> 4) & 0xf) as u8 * 17,
                    (v & 0xf) as u8 * 17,
                ]
            })
            .collect(),
        PixelFormat::A8 => data.iter().flat_map(|&a| [0, 0, 0, a]).collect(),
        _ => return None,
    };
    Some(expanded)
}
