//! # bcn_dds
//! bcn_dds is a software codec for the BC1 through BC5 block compressed formats
//! (DXT1-5, ATI1, ATI2/3Dc) and the DDS container they are usually stored in.
//!
//! Every format converts to and from a canonical BGRA8 surface.
//! Compressed data is processed one 4x4 texel at a time, rows of texels are
//! processed in parallel, and mip levels are processed in order.
//!
//! # Getting Started
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("texture.dds")?;
//! let dds = bcn_dds::Dds::from_bytes(&bytes)?;
//!
//! // Truncated files decode as many mipmaps as are present.
//! let surface = bcn_dds::Surface::from_dds(&dds)?;
//! let bgra = surface.decode_bgra8(&bcn_dds::DecodeOptions::default())?;
//!
//! let options = bcn_dds::EncodeOptions {
//!     mipmaps: bcn_dds::Mipmaps::GeneratedAutomatic,
//!     ..Default::default()
//! };
//! let encoded = bgra.encode(bcn_dds::ImageFormat::BC1, &options)?;
//! let mut writer = std::io::BufWriter::new(std::fs::File::create("out.dds")?);
//! encoded.to_dds()?.write(&mut writer)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//! The `image` feature adds conversions to and from [image::RgbaImage].
//! The `serde` feature derives serialization for formats and options.
pub mod bcn;
mod dds;
mod decode;
mod encode;
pub mod error;
pub mod header;
pub mod mipmap;
pub mod pixel;
pub mod stream;
mod surface;

pub use dds::*;
pub use error::{DdsError, HeaderError, SurfaceError};
pub use header::Header;
pub use mipmap::{estimate_level_count, MipChain, MipLevel};
pub use pixel::{ChannelMasks, ChannelOrder, PixelBuffer, PixelKind, PixelLayout};
pub use stream::{CancellationToken, Parallelism, StreamCursor};
pub use surface::{Surface, SurfaceBgra8};

#[cfg(feature = "image")]
pub use image;

/// Supported surface formats.
///
/// Each variant carries only what its format needs.
/// The block compressed variants all use 4x4 texels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageFormat {
    /// DXT1 with opaque and 1-bit alpha blocks.
    BC1,
    /// DXT3, or DXT2 when the color is premultiplied by alpha.
    BC2 { premultiplied_alpha: bool },
    /// DXT5, or DXT4 when the color is premultiplied by alpha.
    BC3 { premultiplied_alpha: bool },
    /// ATI1 single channel blocks.
    BC4 { signed: bool },
    /// ATI2/3Dc two channel blocks storing the X and Y of a normal.
    BC5 { signed: bool },
    /// Recognized in headers but not supported by the codec.
    BC6H { signed: bool },
    /// Recognized in headers but not supported by the codec.
    BC7,
    /// An uncompressed format described by channel masks.
    Uncompressed(PixelLayout),
}

impl ImageFormat {
    /// The dimensions in pixels of the smallest unit of data.
    pub fn block_dimensions(&self) -> (u32, u32) {
        match self {
            ImageFormat::Uncompressed(_) => (1, 1),
            _ => (4, 4),
        }
    }

    /// The size in bytes of a single block or pixel.
    pub fn block_size_in_bytes(&self) -> usize {
        match self {
            ImageFormat::BC1 | ImageFormat::BC4 { .. } => 8,
            ImageFormat::BC2 { .. }
            | ImageFormat::BC3 { .. }
            | ImageFormat::BC5 { .. }
            | ImageFormat::BC6H { .. }
            | ImageFormat::BC7 => 16,
            ImageFormat::Uncompressed(layout) => layout.bytes_per_pixel(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, ImageFormat::Uncompressed(_))
    }

    /// Returns `true` for DXT2 and DXT4.
    pub fn premultiplied_alpha(&self) -> bool {
        matches!(
            self,
            ImageFormat::BC2 {
                premultiplied_alpha: true
            } | ImageFormat::BC3 {
                premultiplied_alpha: true
            }
        )
    }

    /// The size in bytes of a single mip level with the given dimensions
    /// or [None] if the size would overflow.
    pub fn level_size(&self, width: u32, height: u32) -> Option<usize> {
        let (block_width, block_height) = self.block_dimensions();
        mip_size(
            width as usize,
            height as usize,
            block_width as usize,
            block_height as usize,
            self.block_size_in_bytes(),
        )
    }
}

/// Options for how many mipmaps to write when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mipmaps {
    /// Only encode the base mip level.
    #[default]
    Disabled,
    /// Encode all mip levels already present in the surface.
    FromSurface,
    /// Generate mipmaps from the base level up to the given total count.
    GeneratedExact(u32),
    /// Generate the full chain allowed by [estimate_level_count].
    GeneratedAutomatic,
}

/// How color error is weighted when choosing BC1 endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorWeighting {
    /// Scale red and blue error relative to green by their luminance contribution.
    #[default]
    Perceptual,
    /// Treat all color channels equally.
    Uniform,
}

/// Configuration for encoding surfaces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeOptions {
    /// BC1 pixels with alpha below this fraction of full scale are transparent.
    pub alpha_threshold: f32,
    /// Diffuse RGB quantization error within each block before choosing endpoints.
    pub dither: bool,
    pub weighting: ColorWeighting,
    pub mipmaps: Mipmaps,
    pub parallelism: Parallelism,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancellation: Option<CancellationToken>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            alpha_threshold: 0.2,
            dither: false,
            weighting: ColorWeighting::Perceptual,
            mipmaps: Mipmaps::Disabled,
            parallelism: Parallelism::Automatic,
            cancellation: None,
        }
    }
}

/// Configuration for decoding surfaces.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOptions {
    pub parallelism: Parallelism,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancellation: Option<CancellationToken>,
}

/// The dimension of `base_dimension` at the given mipmap level.
pub fn mip_dimension(base_dimension: u32, mipmap: u32) -> u32 {
    base_dimension.checked_shr(mipmap).unwrap_or(0).max(1)
}

fn div_round_up(x: usize, d: usize) -> usize {
    x.div_ceil(d)
}

fn mip_size(
    width: usize,
    height: usize,
    block_width: usize,
    block_height: usize,
    block_size_in_bytes: usize,
) -> Option<usize> {
    div_round_up(width, block_width)
        .checked_mul(div_round_up(height, block_height))
        .and_then(|blocks| blocks.checked_mul(block_size_in_bytes))
}

/// The offset in bytes of `mipmap` from the start of the surface data.
fn calculate_offset(mipmap: u32, dimensions: (u32, u32), image_format: ImageFormat) -> Option<usize> {
    let (width, height) = dimensions;
    (0..mipmap).try_fold(0usize, |offset, level| {
        let size = image_format.level_size(mip_dimension(width, level), mip_dimension(height, level))?;
        offset.checked_add(size)
    })
}
