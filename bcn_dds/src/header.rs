//! The fixed layout DDS header and the resolution of its pixel format.
//!
//! The header is 128 bytes including the magic number
//! or 148 bytes when the FourCC is `DX10` and the extended header follows.
//! All fields are little-endian.
use std::fmt;
use std::io::Write;

use tracing::debug;

use crate::error::HeaderError;
use crate::pixel::{ChannelMasks, PixelKind, PixelLayout};
use crate::ImageFormat;

/// Size in bytes of the magic number and the header.
pub const HEADER_SIZE: usize = 128;
/// Size in bytes of the magic number, header, and DX10 extended header.
pub const HEADER_DX10_SIZE: usize = HEADER_SIZE + 20;

const MAGIC: u32 = u32::from_le_bytes(*b"DDS ");
const HEADER_STRUCT_SIZE: u32 = 124;
const PIXEL_FORMAT_STRUCT_SIZE: u32 = 32;

pub const DDSD_CAPS: u32 = 0x1;
pub const DDSD_HEIGHT: u32 = 0x2;
pub const DDSD_WIDTH: u32 = 0x4;
pub const DDSD_PITCH: u32 = 0x8;
pub const DDSD_PIXELFORMAT: u32 = 0x1000;
pub const DDSD_MIPMAPCOUNT: u32 = 0x20000;
pub const DDSD_LINEARSIZE: u32 = 0x80000;

pub const DDPF_ALPHAPIXELS: u32 = 0x1;
pub const DDPF_FOURCC: u32 = 0x4;
pub const DDPF_RGB: u32 = 0x40;
pub const DDPF_LUMINANCE: u32 = 0x20000;
pub const DDPF_BUMPDUDV: u32 = 0x80000;

pub const DDSCAPS_COMPLEX: u32 = 0x8;
pub const DDSCAPS_TEXTURE: u32 = 0x1000;
pub const DDSCAPS_MIPMAP: u32 = 0x400000;

const D3D10_RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;

// DXGI_FORMAT values for the formats with a DX10 representation.
const DXGI_FORMAT_R8G8B8A8_UNORM: u32 = 28;
const DXGI_FORMAT_R8G8_UNORM: u32 = 49;
const DXGI_FORMAT_R8G8_SNORM: u32 = 51;
const DXGI_FORMAT_R8_UNORM: u32 = 61;
const DXGI_FORMAT_BC1_UNORM: u32 = 71;
const DXGI_FORMAT_BC1_UNORM_SRGB: u32 = 72;
const DXGI_FORMAT_BC2_UNORM: u32 = 74;
const DXGI_FORMAT_BC2_UNORM_SRGB: u32 = 75;
const DXGI_FORMAT_BC3_UNORM: u32 = 77;
const DXGI_FORMAT_BC3_UNORM_SRGB: u32 = 78;
const DXGI_FORMAT_BC4_UNORM: u32 = 80;
const DXGI_FORMAT_BC4_SNORM: u32 = 81;
const DXGI_FORMAT_BC5_UNORM: u32 = 83;
const DXGI_FORMAT_BC5_SNORM: u32 = 84;
const DXGI_FORMAT_B5G6R5_UNORM: u32 = 85;
const DXGI_FORMAT_B8G8R8A8_UNORM: u32 = 87;
const DXGI_FORMAT_B8G8R8X8_UNORM: u32 = 88;
const DXGI_FORMAT_BC6H_UF16: u32 = 95;
const DXGI_FORMAT_BC6H_SF16: u32 = 96;
const DXGI_FORMAT_BC7_UNORM: u32 = 98;
const DXGI_FORMAT_BC7_UNORM_SRGB: u32 = 99;

/// A four character code identifying a compressed format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const NONE: FourCC = FourCC(0);
    pub const DXT1: FourCC = FourCC(u32::from_le_bytes(*b"DXT1"));
    pub const DXT2: FourCC = FourCC(u32::from_le_bytes(*b"DXT2"));
    pub const DXT3: FourCC = FourCC(u32::from_le_bytes(*b"DXT3"));
    pub const DXT4: FourCC = FourCC(u32::from_le_bytes(*b"DXT4"));
    pub const DXT5: FourCC = FourCC(u32::from_le_bytes(*b"DXT5"));
    pub const ATI1: FourCC = FourCC(u32::from_le_bytes(*b"ATI1"));
    pub const ATI2: FourCC = FourCC(u32::from_le_bytes(*b"ATI2"));
    pub const BC4U: FourCC = FourCC(u32::from_le_bytes(*b"BC4U"));
    pub const BC4S: FourCC = FourCC(u32::from_le_bytes(*b"BC4S"));
    pub const BC5U: FourCC = FourCC(u32::from_le_bytes(*b"BC5U"));
    pub const BC5S: FourCC = FourCC(u32::from_le_bytes(*b"BC5S"));
    pub const DX10: FourCC = FourCC(u32::from_le_bytes(*b"DX10"));
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            bytes.iter().try_for_each(|b| write!(f, "{}", *b as char))
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

/// The pixel format sub-record at offset 76.
///
/// [DDPF_FOURCC] selects the [four_cc](#structfield.four_cc) interpretation.
/// Otherwise the bit count and channel masks describe the pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelFormat {
    pub flags: u32,
    pub four_cc: FourCC,
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl PixelFormat {
    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    fn masks(&self) -> ChannelMasks {
        ChannelMasks {
            r: self.r_bit_mask,
            g: self.g_bit_mask,
            b: self.b_bit_mask,
            a: self.a_bit_mask,
        }
    }

    fn from_four_cc(four_cc: FourCC) -> Self {
        Self {
            flags: DDPF_FOURCC,
            four_cc,
            ..Default::default()
        }
    }

    fn from_layout(layout: &PixelLayout) -> Self {
        let flags = match layout.kind {
            PixelKind::SignedRg => DDPF_BUMPDUDV,
            PixelKind::Luminance => DDPF_LUMINANCE,
            PixelKind::LuminanceAlpha => DDPF_LUMINANCE | DDPF_ALPHAPIXELS,
            PixelKind::Rg | PixelKind::B5G6R5 | PixelKind::Rgb => DDPF_RGB,
            PixelKind::Argb => DDPF_RGB | DDPF_ALPHAPIXELS,
            PixelKind::Unknown if layout.masks.a != 0 => DDPF_RGB | DDPF_ALPHAPIXELS,
            PixelKind::Unknown => DDPF_RGB,
        };
        Self {
            flags,
            four_cc: FourCC::NONE,
            rgb_bit_count: layout.bit_count,
            r_bit_mask: layout.masks.r,
            g_bit_mask: layout.masks.g,
            b_bit_mask: layout.masks.b,
            a_bit_mask: layout.masks.a,
        }
    }
}

/// The extended header present when the FourCC is `DX10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDx10 {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

/// A parsed DDS header.
///
/// The magic number and the two struct size fields are constants
/// and are validated when parsing rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    /// The raw mip count. Use [Header::mipmap_count] for the effective value.
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: PixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
    pub dx10: Option<HeaderDx10>,
}

impl Header {
    /// Parse a header from the start of `bytes`, including the magic number.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::NotEnoughData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        let size = read_u32(bytes, 4);
        if size != HEADER_STRUCT_SIZE {
            return Err(HeaderError::InvalidHeaderSize(size));
        }

        let pixel_format_size = read_u32(bytes, 76);
        if pixel_format_size != PIXEL_FORMAT_STRUCT_SIZE {
            return Err(HeaderError::InvalidPixelFormatSize(pixel_format_size));
        }

        let height = read_u32(bytes, 12);
        let width = read_u32(bytes, 16);
        if width == 0 || height == 0 {
            return Err(HeaderError::ZeroSizedDimensions { width, height });
        }

        let mut reserved1 = [0u32; 11];
        for (i, value) in reserved1.iter_mut().enumerate() {
            *value = read_u32(bytes, 32 + i * 4);
        }

        let pixel_format = PixelFormat {
            flags: read_u32(bytes, 80),
            four_cc: FourCC(read_u32(bytes, 84)),
            rgb_bit_count: read_u32(bytes, 88),
            r_bit_mask: read_u32(bytes, 92),
            g_bit_mask: read_u32(bytes, 96),
            b_bit_mask: read_u32(bytes, 100),
            a_bit_mask: read_u32(bytes, 104),
        };

        let dx10 = if pixel_format.has(DDPF_FOURCC) && pixel_format.four_cc == FourCC::DX10 {
            if bytes.len() < HEADER_DX10_SIZE {
                return Err(HeaderError::NotEnoughData {
                    expected: HEADER_DX10_SIZE,
                    actual: bytes.len(),
                });
            }
            Some(HeaderDx10 {
                dxgi_format: read_u32(bytes, 128),
                resource_dimension: read_u32(bytes, 132),
                misc_flag: read_u32(bytes, 136),
                array_size: read_u32(bytes, 140),
                misc_flags2: read_u32(bytes, 144),
            })
        } else {
            None
        };

        Ok(Self {
            flags: read_u32(bytes, 8),
            height,
            width,
            pitch_or_linear_size: read_u32(bytes, 20),
            depth: read_u32(bytes, 24),
            mipmap_count: read_u32(bytes, 28),
            reserved1,
            pixel_format,
            caps: read_u32(bytes, 108),
            caps2: read_u32(bytes, 112),
            caps3: read_u32(bytes, 116),
            caps4: read_u32(bytes, 120),
            reserved2: read_u32(bytes, 124),
            dx10,
        })
    }

    /// Create a header for a 2D texture in the given format.
    pub fn build(width: u32, height: u32, mipmap_count: u32, image_format: ImageFormat) -> Self {
        let mipmap_count = mipmap_count.max(1);

        let (pixel_format, dx10) = match image_format {
            ImageFormat::BC1 => (PixelFormat::from_four_cc(FourCC::DXT1), None),
            ImageFormat::BC2 {
                premultiplied_alpha,
            } => (
                PixelFormat::from_four_cc(if premultiplied_alpha {
                    FourCC::DXT2
                } else {
                    FourCC::DXT3
                }),
                None,
            ),
            ImageFormat::BC3 {
                premultiplied_alpha,
            } => (
                PixelFormat::from_four_cc(if premultiplied_alpha {
                    FourCC::DXT4
                } else {
                    FourCC::DXT5
                }),
                None,
            ),
            ImageFormat::BC4 { signed } => (
                PixelFormat::from_four_cc(if signed { FourCC::BC4S } else { FourCC::ATI1 }),
                None,
            ),
            ImageFormat::BC5 { signed } => (
                PixelFormat::from_four_cc(if signed { FourCC::BC5S } else { FourCC::ATI2 }),
                None,
            ),
            ImageFormat::BC6H { signed } => (
                PixelFormat::from_four_cc(FourCC::DX10),
                Some(HeaderDx10::texture_2d(if signed {
                    DXGI_FORMAT_BC6H_SF16
                } else {
                    DXGI_FORMAT_BC6H_UF16
                })),
            ),
            ImageFormat::BC7 => (
                PixelFormat::from_four_cc(FourCC::DX10),
                Some(HeaderDx10::texture_2d(DXGI_FORMAT_BC7_UNORM)),
            ),
            ImageFormat::Uncompressed(layout) => (PixelFormat::from_layout(&layout), None),
        };

        let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
        let pitch_or_linear_size = if image_format.is_compressed() {
            flags |= DDSD_LINEARSIZE;
            image_format.level_size(width, height).unwrap_or_default() as u32
        } else {
            flags |= DDSD_PITCH;
            (width as usize * pixel_format.rgb_bit_count as usize).div_ceil(8) as u32
        };

        let mut caps = DDSCAPS_TEXTURE;
        if mipmap_count > 1 {
            flags |= DDSD_MIPMAPCOUNT;
            caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }

        Self {
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth: 0,
            mipmap_count,
            reserved1: [0; 11],
            pixel_format,
            caps,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
            dx10,
        }
    }

    /// The size in bytes of the encoded header including the magic number.
    pub fn size_in_bytes(&self) -> usize {
        if self.dx10.is_some() {
            HEADER_DX10_SIZE
        } else {
            HEADER_SIZE
        }
    }

    /// The size of the header at the start of `bytes` including any extended header.
    ///
    /// Only the first [HEADER_SIZE] bytes are needed to check for a DX10 FourCC.
    pub fn size_from_prefix(bytes: &[u8]) -> usize {
        let is_dx10 = bytes.len() >= HEADER_SIZE
            && read_u32(bytes, 80) & DDPF_FOURCC != 0
            && FourCC(read_u32(bytes, 84)) == FourCC::DX10;
        if is_dx10 {
            HEADER_DX10_SIZE
        } else {
            HEADER_SIZE
        }
    }

    /// The number of mip levels with a stored count of 0 treated as 1.
    pub fn mipmap_count(&self) -> u32 {
        self.mipmap_count.max(1)
    }

    /// Write the magic number, header, and any extended header.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let pf = &self.pixel_format;
        let mut fields = vec![
            MAGIC,
            HEADER_STRUCT_SIZE,
            self.flags,
            self.height,
            self.width,
            self.pitch_or_linear_size,
            self.depth,
            self.mipmap_count,
        ];
        fields.extend_from_slice(&self.reserved1);
        fields.extend_from_slice(&[
            PIXEL_FORMAT_STRUCT_SIZE,
            pf.flags,
            pf.four_cc.0,
            pf.rgb_bit_count,
            pf.r_bit_mask,
            pf.g_bit_mask,
            pf.b_bit_mask,
            pf.a_bit_mask,
            self.caps,
            self.caps2,
            self.caps3,
            self.caps4,
            self.reserved2,
        ]);
        if let Some(dx10) = &self.dx10 {
            fields.extend_from_slice(&[
                dx10.dxgi_format,
                dx10.resource_dimension,
                dx10.misc_flag,
                dx10.array_size,
                dx10.misc_flags2,
            ]);
        }

        for field in fields {
            writer.write_all(&field.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size_in_bytes());
        // Writing to a Vec can't fail.
        let _ = self.write_to(&mut bytes);
        bytes
    }

    /// Resolve the surface format from the DX10 header, FourCC, or channel masks.
    pub fn image_format(&self) -> Result<ImageFormat, HeaderError> {
        if let Some(dx10) = &self.dx10 {
            return image_format_from_dxgi(dx10.dxgi_format);
        }

        let pf = &self.pixel_format;
        if pf.has(DDPF_FOURCC) && pf.four_cc != FourCC::NONE {
            return image_format_from_four_cc(pf.four_cc);
        }

        let layout = resolve_masked_layout(pf)?;
        debug!(kind = ?layout.kind, bit_count = layout.bit_count, "Resolved pixel format from channel masks");
        Ok(ImageFormat::Uncompressed(layout))
    }
}

impl HeaderDx10 {
    fn texture_2d(dxgi_format: u32) -> Self {
        Self {
            dxgi_format,
            resource_dimension: D3D10_RESOURCE_DIMENSION_TEXTURE2D,
            misc_flag: 0,
            array_size: 1,
            misc_flags2: 0,
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(field)
}

fn image_format_from_four_cc(four_cc: FourCC) -> Result<ImageFormat, HeaderError> {
    match four_cc {
        FourCC::DXT1 => Ok(ImageFormat::BC1),
        FourCC::DXT2 => Ok(ImageFormat::BC2 {
            premultiplied_alpha: true,
        }),
        FourCC::DXT3 => Ok(ImageFormat::BC2 {
            premultiplied_alpha: false,
        }),
        FourCC::DXT4 => Ok(ImageFormat::BC3 {
            premultiplied_alpha: true,
        }),
        FourCC::DXT5 => Ok(ImageFormat::BC3 {
            premultiplied_alpha: false,
        }),
        FourCC::ATI1 | FourCC::BC4U => Ok(ImageFormat::BC4 { signed: false }),
        FourCC::BC4S => Ok(ImageFormat::BC4 { signed: true }),
        FourCC::ATI2 | FourCC::BC5U => Ok(ImageFormat::BC5 { signed: false }),
        FourCC::BC5S => Ok(ImageFormat::BC5 { signed: true }),
        _ => Err(HeaderError::UnrecognizedFourCC(four_cc)),
    }
}

fn image_format_from_dxgi(dxgi_format: u32) -> Result<ImageFormat, HeaderError> {
    match dxgi_format {
        DXGI_FORMAT_BC1_UNORM | DXGI_FORMAT_BC1_UNORM_SRGB => Ok(ImageFormat::BC1),
        DXGI_FORMAT_BC2_UNORM | DXGI_FORMAT_BC2_UNORM_SRGB => Ok(ImageFormat::BC2 {
            premultiplied_alpha: false,
        }),
        DXGI_FORMAT_BC3_UNORM | DXGI_FORMAT_BC3_UNORM_SRGB => Ok(ImageFormat::BC3 {
            premultiplied_alpha: false,
        }),
        DXGI_FORMAT_BC4_UNORM => Ok(ImageFormat::BC4 { signed: false }),
        DXGI_FORMAT_BC4_SNORM => Ok(ImageFormat::BC4 { signed: true }),
        DXGI_FORMAT_BC5_UNORM => Ok(ImageFormat::BC5 { signed: false }),
        DXGI_FORMAT_BC5_SNORM => Ok(ImageFormat::BC5 { signed: true }),
        DXGI_FORMAT_BC6H_UF16 => Ok(ImageFormat::BC6H { signed: false }),
        DXGI_FORMAT_BC6H_SF16 => Ok(ImageFormat::BC6H { signed: true }),
        DXGI_FORMAT_BC7_UNORM | DXGI_FORMAT_BC7_UNORM_SRGB => Ok(ImageFormat::BC7),
        DXGI_FORMAT_R8G8B8A8_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::R8G8B8A8)),
        DXGI_FORMAT_B8G8R8A8_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::B8G8R8A8)),
        DXGI_FORMAT_B8G8R8X8_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::B8G8R8X8)),
        DXGI_FORMAT_B5G6R5_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::B5G6R5)),
        DXGI_FORMAT_R8_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::L8)),
        DXGI_FORMAT_R8G8_UNORM => Ok(ImageFormat::Uncompressed(PixelLayout::R8G8)),
        DXGI_FORMAT_R8G8_SNORM => Ok(ImageFormat::Uncompressed(PixelLayout::V8U8)),
        _ => Err(HeaderError::UnrecognizedDxgiFormat(dxgi_format)),
    }
}

type MaskRule = fn(&PixelFormat) -> Option<PixelKind>;

/// Rules for formats without a FourCC in order of precedence.
/// The first matching rule wins, so ambiguous headers depend on this order.
const MASK_RULES: [MaskRule; 6] = [
    signed_two_channel,
    luminance,
    luminance_alpha,
    red_green,
    rgb,
    argb,
];

fn resolve_masked_layout(pf: &PixelFormat) -> Result<PixelLayout, HeaderError> {
    let kind = match MASK_RULES.iter().find_map(|rule| rule(pf)) {
        Some(kind) => kind,
        None if pf.masks() != ChannelMasks::default() => PixelKind::Unknown,
        None => return Err(HeaderError::UnrecognizedFormat),
    };

    Ok(PixelLayout {
        kind,
        bit_count: pf.rgb_bit_count,
        masks: pf.masks(),
    })
}

fn signed_two_channel(pf: &PixelFormat) -> Option<PixelKind> {
    (pf.rgb_bit_count == 16
        && pf.has(DDPF_BUMPDUDV)
        && pf.r_bit_mask != 0
        && pf.g_bit_mask != 0
        && pf.b_bit_mask == 0)
        .then_some(PixelKind::SignedRg)
}

fn luminance(pf: &PixelFormat) -> Option<PixelKind> {
    (pf.rgb_bit_count == 8
        && pf.has(DDPF_LUMINANCE)
        && pf.a_bit_mask == 0
        && pf.g_bit_mask == 0
        && pf.b_bit_mask == 0)
        .then_some(PixelKind::Luminance)
}

fn luminance_alpha(pf: &PixelFormat) -> Option<PixelKind> {
    (pf.rgb_bit_count == 16 && pf.has(DDPF_LUMINANCE) && pf.has(DDPF_ALPHAPIXELS))
        .then_some(PixelKind::LuminanceAlpha)
}

fn red_green(pf: &PixelFormat) -> Option<PixelKind> {
    (pf.has(DDPF_RGB)
        && pf.a_bit_mask == 0
        && pf.b_bit_mask == 0
        && (pf.r_bit_mask | pf.g_bit_mask) != 0)
        .then_some(PixelKind::Rg)
}

fn rgb(pf: &PixelFormat) -> Option<PixelKind> {
    if pf.has(DDPF_RGB)
        && pf.a_bit_mask == 0
        && pf.r_bit_mask != 0
        && pf.g_bit_mask != 0
        && pf.b_bit_mask != 0
    {
        // A blue mask within the lowest 5 bits indicates 5:6:5 packing.
        if pf.b_bit_mask < (1 << 5) {
            Some(PixelKind::B5G6R5)
        } else {
            Some(PixelKind::Rgb)
        }
    } else {
        None
    }
}

fn argb(pf: &PixelFormat) -> Option<PixelKind> {
    (pf.has(DDPF_RGB)
        && pf.has(DDPF_ALPHAPIXELS)
        && pf.r_bit_mask != 0
        && pf.g_bit_mask != 0
        && pf.b_bit_mask != 0
        && pf.a_bit_mask != 0)
        .then_some(PixelKind::Argb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn masked(flags: u32, bit_count: u32, masks: [u32; 4]) -> PixelFormat {
        PixelFormat {
            flags,
            four_cc: FourCC::NONE,
            rgb_bit_count: bit_count,
            r_bit_mask: masks[0],
            g_bit_mask: masks[1],
            b_bit_mask: masks[2],
            a_bit_mask: masks[3],
        }
    }

    fn header_with(pixel_format: PixelFormat) -> Header {
        let mut header = Header::build(4, 4, 1, ImageFormat::BC1);
        header.pixel_format = pixel_format;
        header
    }

    #[test]
    fn build_bc1_field_offsets() {
        let bytes = Header::build(256, 128, 9, ImageFormat::BC1).to_bytes();
        assert_eq!(HEADER_SIZE, bytes.len());
        assert_eq!(b"DDS ", &bytes[0..4]);
        assert_eq!(124, read_u32(&bytes, 4));
        assert_eq!(
            DDSD_CAPS
                | DDSD_HEIGHT
                | DDSD_WIDTH
                | DDSD_PIXELFORMAT
                | DDSD_LINEARSIZE
                | DDSD_MIPMAPCOUNT,
            read_u32(&bytes, 8)
        );
        assert_eq!(128, read_u32(&bytes, 12));
        assert_eq!(256, read_u32(&bytes, 16));
        assert_eq!(64 * 32 * 8, read_u32(&bytes, 20));
        assert_eq!(9, read_u32(&bytes, 28));
        assert_eq!(32, read_u32(&bytes, 76));
        assert_eq!(DDPF_FOURCC, read_u32(&bytes, 80));
        assert_eq!(b"DXT1", &bytes[84..88]);
        assert_eq!(
            DDSCAPS_TEXTURE | DDSCAPS_COMPLEX | DDSCAPS_MIPMAP,
            read_u32(&bytes, 108)
        );
    }

    #[test]
    fn build_single_mipmap_omits_mipmap_flags() {
        let header = Header::build(4, 4, 0, ImageFormat::BC1);
        assert_eq!(1, header.mipmap_count);
        assert_eq!(0, header.flags & DDSD_MIPMAPCOUNT);
        assert_eq!(DDSCAPS_TEXTURE, header.caps);
    }

    #[test]
    fn build_uncompressed_pitch() {
        let header = Header::build(3, 2, 1, ImageFormat::Uncompressed(PixelLayout::B8G8R8));
        assert_eq!(9, header.pitch_or_linear_size);
        assert_eq!(DDSD_PITCH, header.flags & DDSD_PITCH);
        assert_eq!(DDPF_RGB, header.pixel_format.flags);
        assert_eq!(24, header.pixel_format.rgb_bit_count);
    }

    #[rstest]
    #[case(ImageFormat::BC1)]
    #[case(ImageFormat::BC2 { premultiplied_alpha: true })]
    #[case(ImageFormat::BC2 { premultiplied_alpha: false })]
    #[case(ImageFormat::BC3 { premultiplied_alpha: true })]
    #[case(ImageFormat::BC3 { premultiplied_alpha: false })]
    #[case(ImageFormat::BC4 { signed: false })]
    #[case(ImageFormat::BC4 { signed: true })]
    #[case(ImageFormat::BC5 { signed: false })]
    #[case(ImageFormat::BC5 { signed: true })]
    #[case(ImageFormat::BC6H { signed: false })]
    #[case(ImageFormat::BC7)]
    #[case(ImageFormat::Uncompressed(PixelLayout::B8G8R8A8))]
    #[case(ImageFormat::Uncompressed(PixelLayout::B5G6R5))]
    #[case(ImageFormat::Uncompressed(PixelLayout::L8))]
    #[case(ImageFormat::Uncompressed(PixelLayout::L8A8))]
    #[case(ImageFormat::Uncompressed(PixelLayout::V8U8))]
    fn header_round_trip(#[case] image_format: ImageFormat) {
        let header = Header::build(64, 32, 6, image_format);
        let bytes = header.to_bytes();
        assert_eq!(header.size_in_bytes(), bytes.len());

        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(header, parsed);
        assert_eq!(bytes, parsed.to_bytes());
        assert_eq!(image_format, parsed.image_format().unwrap());
    }

    #[test]
    fn parse_preserves_reserved_fields() {
        let mut bytes = Header::build(8, 8, 1, ImageFormat::BC3 { premultiplied_alpha: false }).to_bytes();
        // Tools like GIMP store a signature in the reserved space.
        bytes[44..48].copy_from_slice(b"GIMP");
        bytes[124..128].copy_from_slice(&7u32.to_le_bytes());
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(bytes, header.to_bytes());
    }

    #[test]
    fn build_bc7_writes_dx10_header() {
        let bytes = Header::build(16, 16, 1, ImageFormat::BC7).to_bytes();
        assert_eq!(HEADER_DX10_SIZE, bytes.len());
        assert_eq!(b"DX10", &bytes[84..88]);
        assert_eq!(DXGI_FORMAT_BC7_UNORM, read_u32(&bytes, 128));
        assert_eq!(D3D10_RESOURCE_DIMENSION_TEXTURE2D, read_u32(&bytes, 132));
        assert_eq!(1, read_u32(&bytes, 140));
    }

    #[test]
    fn size_from_prefix_checks_four_cc() {
        let bytes = Header::build(4, 4, 1, ImageFormat::BC7).to_bytes();
        assert_eq!(HEADER_DX10_SIZE, Header::size_from_prefix(&bytes[..HEADER_SIZE]));

        let bytes = Header::build(4, 4, 1, ImageFormat::BC1).to_bytes();
        assert_eq!(HEADER_SIZE, Header::size_from_prefix(&bytes));
        assert_eq!(HEADER_SIZE, Header::size_from_prefix(&bytes[..4]));
    }

    #[test]
    fn parse_not_enough_data() {
        assert_eq!(
            Err(HeaderError::NotEnoughData {
                expected: 128,
                actual: 4
            }),
            Header::parse(b"DDS ")
        );
    }

    #[test]
    fn parse_truncated_dx10() {
        let bytes = Header::build(4, 4, 1, ImageFormat::BC7).to_bytes();
        assert_eq!(
            Err(HeaderError::NotEnoughData {
                expected: 148,
                actual: 140
            }),
            Header::parse(&bytes[..140])
        );
    }

    #[test]
    fn parse_invalid_magic() {
        let mut bytes = Header::build(4, 4, 1, ImageFormat::BC1).to_bytes();
        bytes[0..4].copy_from_slice(b"PNG ");
        assert_eq!(
            Err(HeaderError::InvalidMagic(u32::from_le_bytes(*b"PNG "))),
            Header::parse(&bytes)
        );
    }

    #[test]
    fn parse_invalid_sizes() {
        let mut bytes = Header::build(4, 4, 1, ImageFormat::BC1).to_bytes();
        bytes[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert_eq!(Err(HeaderError::InvalidHeaderSize(100)), Header::parse(&bytes));

        let mut bytes = Header::build(4, 4, 1, ImageFormat::BC1).to_bytes();
        bytes[76..80].copy_from_slice(&24u32.to_le_bytes());
        assert_eq!(
            Err(HeaderError::InvalidPixelFormatSize(24)),
            Header::parse(&bytes)
        );
    }

    #[test]
    fn parse_zero_width() {
        let mut bytes = Header::build(4, 4, 1, ImageFormat::BC1).to_bytes();
        bytes[16..20].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            Err(HeaderError::ZeroSizedDimensions {
                width: 0,
                height: 4
            }),
            Header::parse(&bytes)
        );
    }

    #[test]
    fn mipmap_count_zero_is_one() {
        let mut header = Header::build(4, 4, 1, ImageFormat::BC1);
        header.mipmap_count = 0;
        assert_eq!(1, header.mipmap_count());
    }

    #[test]
    fn unrecognized_four_cc() {
        let header = header_with(PixelFormat::from_four_cc(FourCC(u32::from_le_bytes(*b"ETC2"))));
        assert_eq!(
            Err(HeaderError::UnrecognizedFourCC(FourCC(u32::from_le_bytes(
                *b"ETC2"
            )))),
            header.image_format()
        );
    }

    #[test]
    fn four_cc_display() {
        assert_eq!("DXT5", FourCC::DXT5.to_string());
        assert_eq!("0x00000024", FourCC(36).to_string());
    }

    #[rstest]
    #[case::v8u8(masked(DDPF_BUMPDUDV, 16, [0xFF, 0xFF00, 0, 0]), PixelKind::SignedRg)]
    #[case::l8(masked(DDPF_LUMINANCE, 8, [0xFF, 0, 0, 0]), PixelKind::Luminance)]
    #[case::a8l8(masked(DDPF_LUMINANCE | DDPF_ALPHAPIXELS, 16, [0xFF, 0, 0, 0xFF00]), PixelKind::LuminanceAlpha)]
    #[case::g8r8(masked(DDPF_RGB, 16, [0xFF, 0xFF00, 0, 0]), PixelKind::Rg)]
    #[case::g16r16(masked(DDPF_RGB, 32, [0xFFFF, 0xFFFF0000, 0, 0]), PixelKind::Rg)]
    #[case::r5g6b5(masked(DDPF_RGB, 16, [0xF800, 0x7E0, 0x1F, 0]), PixelKind::B5G6R5)]
    #[case::r8g8b8(masked(DDPF_RGB, 24, [0xFF0000, 0xFF00, 0xFF, 0]), PixelKind::Rgb)]
    #[case::x8b8g8r8(masked(DDPF_RGB, 32, [0xFF, 0xFF00, 0xFF0000, 0]), PixelKind::Rgb)]
    #[case::a8r8g8b8(masked(DDPF_RGB | DDPF_ALPHAPIXELS, 32, [0xFF0000, 0xFF00, 0xFF, 0xFF000000]), PixelKind::Argb)]
    #[case::a4r4g4b4(masked(DDPF_RGB | DDPF_ALPHAPIXELS, 16, [0xF00, 0xF0, 0xF, 0xF000]), PixelKind::Argb)]
    #[case::alpha_only(masked(0x2, 8, [0, 0, 0, 0xFF]), PixelKind::Unknown)]
    fn resolve_mask_rules(#[case] pixel_format: PixelFormat, #[case] kind: PixelKind) {
        let format = header_with(pixel_format).image_format().unwrap();
        assert_eq!(
            ImageFormat::Uncompressed(PixelLayout {
                kind,
                bit_count: pixel_format.rgb_bit_count,
                masks: pixel_format.masks(),
            }),
            format
        );
    }

    #[test]
    fn resolve_signed_before_luminance_alpha() {
        // Matches both the signed and luminance alpha rules.
        let pf = masked(
            DDPF_BUMPDUDV | DDPF_LUMINANCE | DDPF_ALPHAPIXELS,
            16,
            [0xFF, 0xFF00, 0, 0],
        );
        assert_eq!(PixelKind::SignedRg, resolve_masked_layout(&pf).unwrap().kind);
    }

    #[test]
    fn resolve_red_green_before_rgb() {
        // Matches both the red green and unknown rules.
        let pf = masked(DDPF_RGB, 32, [0xFF, 0xFF00, 0, 0]);
        assert_eq!(PixelKind::Rg, resolve_masked_layout(&pf).unwrap().kind);
    }

    #[test]
    fn resolve_no_masks() {
        let header = header_with(masked(DDPF_RGB, 32, [0; 4]));
        assert_eq!(Err(HeaderError::UnrecognizedFormat), header.image_format());
    }

    #[test]
    fn four_cc_flag_is_authoritative() {
        // The FourCC is ignored without the flag.
        let mut pf = masked(DDPF_RGB | DDPF_ALPHAPIXELS, 32, [0xFF0000, 0xFF00, 0xFF, 0xFF000000]);
        pf.four_cc = FourCC::DXT1;
        assert_eq!(
            Ok(ImageFormat::Uncompressed(PixelLayout::B8G8R8A8)),
            header_with(pf).image_format()
        );
    }
}
