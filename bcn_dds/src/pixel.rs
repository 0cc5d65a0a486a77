//! Uncompressed pixel layouts and strided pixel buffers.
//!
//! Uncompressed DDS formats are described by a bit count and one mask per channel.
//! A single mask based codec handles every layout the header can describe.
use crate::surface::SurfaceBgra8;
use crate::SurfaceError;

pub(crate) mod convert;

use convert::{snorm_to_unorm8, unorm8_to_snorm, unorm8_to_unorm, unorm_to_unorm8};

const B: usize = 0;
const G: usize = 1;
const R: usize = 2;
const A: usize = 3;

/// How the channels of an uncompressed layout are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelKind {
    /// Two signed channels like V8U8 normal maps.
    SignedRg,
    /// A single luminance channel stored in the red mask.
    Luminance,
    LuminanceAlpha,
    /// Only red and green channels.
    Rg,
    B5G6R5,
    Rgb,
    Argb,
    /// Channels are read from whichever masks are present.
    Unknown,
}

/// Bit masks for each channel within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

/// The layout of an uncompressed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelLayout {
    pub kind: PixelKind,
    pub bit_count: u32,
    pub masks: ChannelMasks,
}

impl PixelLayout {
    /// The canonical layout with bytes in BGRA order.
    pub const B8G8R8A8: Self = Self::new(
        PixelKind::Argb,
        32,
        [0xFF0000, 0xFF00, 0xFF, 0xFF000000],
    );
    pub const R8G8B8A8: Self = Self::new(
        PixelKind::Argb,
        32,
        [0xFF, 0xFF00, 0xFF0000, 0xFF000000],
    );
    pub const B8G8R8X8: Self = Self::new(PixelKind::Rgb, 32, [0xFF0000, 0xFF00, 0xFF, 0]);
    pub const B8G8R8: Self = Self::new(PixelKind::Rgb, 24, [0xFF0000, 0xFF00, 0xFF, 0]);
    pub const B5G6R5: Self = Self::new(PixelKind::B5G6R5, 16, [0xF800, 0x7E0, 0x1F, 0]);
    pub const R8G8: Self = Self::new(PixelKind::Rg, 16, [0xFF, 0xFF00, 0, 0]);
    pub const V8U8: Self = Self::new(PixelKind::SignedRg, 16, [0xFF, 0xFF00, 0, 0]);
    pub const L8: Self = Self::new(PixelKind::Luminance, 8, [0xFF, 0, 0, 0]);
    pub const L8A8: Self = Self::new(PixelKind::LuminanceAlpha, 16, [0xFF, 0, 0, 0xFF00]);

    const fn new(kind: PixelKind, bit_count: u32, masks: [u32; 4]) -> Self {
        Self {
            kind,
            bit_count,
            masks: ChannelMasks {
                r: masks[0],
                g: masks[1],
                b: masks[2],
                a: masks[3],
            },
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bit_count as usize / 8
    }

    pub(crate) fn validate(&self) -> Result<(), SurfaceError> {
        match self.bit_count {
            8 | 16 | 24 | 32 => Ok(()),
            bit_count => Err(SurfaceError::UnsupportedBitDepth { bit_count }),
        }
    }

    /// Convert a pixel value to BGRA.
    pub fn decode_pixel(&self, value: u32) -> [u8; 4] {
        let masks = &self.masks;
        match self.kind {
            PixelKind::SignedRg => [
                128,
                extract_snorm(value, masks.g).unwrap_or(128),
                extract_snorm(value, masks.r).unwrap_or(128),
                255,
            ],
            PixelKind::Luminance | PixelKind::LuminanceAlpha => {
                let l = extract_unorm(value, masks.r).unwrap_or(0);
                [l, l, l, extract_unorm(value, masks.a).unwrap_or(255)]
            }
            _ => [
                extract_unorm(value, masks.b).unwrap_or(0),
                extract_unorm(value, masks.g).unwrap_or(0),
                extract_unorm(value, masks.r).unwrap_or(0),
                extract_unorm(value, masks.a).unwrap_or(255),
            ],
        }
    }

    /// Convert a BGRA pixel to a pixel value.
    pub fn encode_pixel(&self, bgra: [u8; 4]) -> u32 {
        let masks = &self.masks;
        match self.kind {
            PixelKind::SignedRg => insert_snorm(bgra[R], masks.r) | insert_snorm(bgra[G], masks.g),
            PixelKind::Luminance | PixelKind::LuminanceAlpha => {
                // BT.601 weights summing to 256 so gray values are unchanged.
                let l = (bgra[R] as u32 * 77 + bgra[G] as u32 * 150 + bgra[B] as u32 * 29 + 128)
                    >> 8;
                insert_unorm(l as u8, masks.r) | insert_unorm(bgra[A], masks.a)
            }
            _ => {
                insert_unorm(bgra[B], masks.b)
                    | insert_unorm(bgra[G], masks.g)
                    | insert_unorm(bgra[R], masks.r)
                    | insert_unorm(bgra[A], masks.a)
            }
        }
    }
}

fn mask_shift_max(mask: u32) -> (u32, u32) {
    let shift = mask.trailing_zeros();
    (shift, mask >> shift)
}

fn extract_unorm(value: u32, mask: u32) -> Option<u8> {
    (mask != 0).then(|| {
        let (shift, max) = mask_shift_max(mask);
        unorm_to_unorm8((value & mask) >> shift, max)
    })
}

fn extract_snorm(value: u32, mask: u32) -> Option<u8> {
    (mask != 0).then(|| {
        let (shift, max) = mask_shift_max(mask);
        let bits = 32 - max.leading_zeros();
        if bits < 2 {
            unorm_to_unorm8((value & mask) >> shift, max)
        } else {
            snorm_to_unorm8((value & mask) >> shift, bits)
        }
    })
}

fn insert_unorm(channel: u8, mask: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    let (shift, max) = mask_shift_max(mask);
    (unorm8_to_unorm(channel, max) << shift) & mask
}

fn insert_snorm(channel: u8, mask: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    let (shift, max) = mask_shift_max(mask);
    let bits = 32 - max.leading_zeros();
    if bits < 2 {
        insert_unorm(channel, mask)
    } else {
        (unorm8_to_snorm(channel, bits) << shift) & mask
    }
}

/// Decode a row of packed pixels to BGRA.
pub(crate) fn decode_pixels(layout: &PixelLayout, src: &[u8], bgra: &mut [u8]) {
    let size = layout.bytes_per_pixel();
    for (pixel, out) in src.chunks_exact(size).zip(bgra.chunks_exact_mut(4)) {
        let mut value = [0u8; 4];
        value[..size].copy_from_slice(pixel);
        out.copy_from_slice(&layout.decode_pixel(u32::from_le_bytes(value)));
    }
}

/// Encode a row of BGRA pixels to packed pixels.
pub(crate) fn encode_pixels(layout: &PixelLayout, bgra: &[u8], dst: &mut [u8]) {
    let size = layout.bytes_per_pixel();
    let pixels: &[[u8; 4]] = bytemuck::cast_slice(bgra);
    for (pixel, out) in pixels.iter().zip(dst.chunks_exact_mut(size)) {
        let value = layout.encode_pixel(*pixel).to_le_bytes();
        out.copy_from_slice(&value[..size]);
    }
}

/// The order of color channels in a [PixelBuffer].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelOrder {
    #[default]
    Bgra,
    Rgba,
}

/// An owned image with an explicit row stride and channel layout.
///
/// Buffers with 1 channel are gray, 2 channels are gray and alpha,
/// and 3 or 4 channels are color with or without alpha in [ChannelOrder].
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// The number of bytes from the start of one row to the start of the next.
    pub stride: usize,
    pub channels: usize,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer with tightly packed rows.
    pub fn new(width: u32, height: u32, channels: usize, order: ChannelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * channels,
            channels,
            order,
            data,
        }
    }

    /// Copy a single BGRA level into a tightly packed 4 channel buffer.
    pub fn from_bgra8(width: u32, height: u32, bgra: &[u8], order: ChannelOrder) -> Self {
        let mut data = bgra.to_vec();
        if order == ChannelOrder::Rgba {
            swap_red_blue(&mut data);
        }
        Self::new(width, height, 4, order, data)
    }

    /// Convert to a single level BGRA surface.
    pub fn to_surface(&self) -> Result<SurfaceBgra8<Vec<u8>>, SurfaceError> {
        if self.width == 0 || self.height == 0 {
            return Err(SurfaceError::ZeroSizedSurface {
                width: self.width,
                height: self.height,
            });
        }

        if !(1..=4).contains(&self.channels) {
            return Err(SurfaceError::UnsupportedChannelCount {
                channels: self.channels,
            });
        }

        let overflow = SurfaceError::PixelCountWouldOverflow {
            width: self.width,
            height: self.height,
        };
        let row_size = (self.width as usize)
            .checked_mul(self.channels)
            .ok_or(overflow.clone())?;
        if self.stride < row_size {
            return Err(SurfaceError::InvalidStride {
                stride: self.stride,
                row_size,
            });
        }

        let expected = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|s| s.checked_add(row_size))
            .ok_or(overflow)?;
        if self.data.len() < expected {
            return Err(SurfaceError::NotEnoughData {
                expected,
                actual: self.data.len(),
            });
        }

        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in self.data.chunks(self.stride).take(self.height as usize) {
            for pixel in row[..row_size].chunks_exact(self.channels) {
                data.extend_from_slice(&to_bgra(pixel, self.order));
            }
        }

        Ok(SurfaceBgra8 {
            width: self.width,
            height: self.height,
            mipmaps: 1,
            data,
        })
    }
}

fn to_bgra(pixel: &[u8], order: ChannelOrder) -> [u8; 4] {
    match (pixel, order) {
        ([l], _) => [*l, *l, *l, 255],
        ([l, a], _) => [*l, *l, *l, *a],
        ([b, g, r], ChannelOrder::Bgra) => [*b, *g, *r, 255],
        ([r, g, b], ChannelOrder::Rgba) => [*b, *g, *r, 255],
        ([b, g, r, a], ChannelOrder::Bgra) => [*b, *g, *r, *a],
        ([r, g, b, a], ChannelOrder::Rgba) => [*b, *g, *r, *a],
        _ => [0, 0, 0, 255],
    }
}

/// Convert between BGRA and RGBA in place.
pub(crate) fn swap_red_blue(data: &mut [u8]) {
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(data);
    for pixel in pixels {
        pixel.swap(B, R);
    }
}
