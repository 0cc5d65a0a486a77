use thiserror::Error;

use crate::header::FourCC;
use crate::ImageFormat;

/// Errors while parsing or resolving the format of a DDS header.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum HeaderError {
    #[error("expected at least {expected} header bytes but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("invalid magic {0:#010x}, expected \"DDS \"")]
    InvalidMagic(u32),

    #[error("invalid header size {0}, expected 124")]
    InvalidHeaderSize(u32),

    #[error("invalid pixel format size {0}, expected 32")]
    InvalidPixelFormatSize(u32),

    #[error("header dimensions {width} x {height} contain no pixels")]
    ZeroSizedDimensions { width: u32, height: u32 },

    #[error("unrecognized FourCC {0}")]
    UnrecognizedFourCC(FourCC),

    #[error("unrecognized DXGI format {0}")]
    UnrecognizedDxgiFormat(u32),

    #[error("the pixel format has no FourCC and no channel masks")]
    UnrecognizedFormat,
}

/// Errors while encoding or decoding surface data.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SurfaceError {
    #[error("surface dimensions {width} x {height} contain no pixels")]
    ZeroSizedSurface { width: u32, height: u32 },

    #[error("surface pixel count {width} x {height} would overflow")]
    PixelCountWouldOverflow { width: u32, height: u32 },

    #[error("expected surface to have at least {expected} bytes but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("{mipmaps} mipmaps exceeds the maximum expected mipmap count of {max_mipmaps}")]
    UnexpectedMipmapCount { mipmaps: u32, max_mipmaps: u32 },

    #[error("failed to get image data for mipmap {mipmap}")]
    MipmapDataOutOfBounds { mipmap: u32 },

    #[error("encoding or decoding format {format:?} is not supported")]
    UnsupportedFormat { format: ImageFormat },

    #[error("{bit_count} bits per pixel is not supported")]
    UnsupportedBitDepth { bit_count: u32 },

    #[error("{channels} channels per pixel is not supported")]
    UnsupportedChannelCount { channels: usize },

    #[error("row stride {stride} is smaller than the {row_size} bytes in each row")]
    InvalidStride { stride: usize, row_size: usize },

    #[error("the operation was cancelled")]
    Cancelled,

    #[error("failed to create thread pool: {reason}")]
    ThreadPool { reason: String },
}

/// Errors while reading, writing, or converting DDS files.
#[derive(Debug, Error)]
pub enum DdsError {
    #[error("error reading DDS header: {0}")]
    Header(#[from] HeaderError),

    #[error("error processing surface: {0}")]
    Surface(#[from] SurfaceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data length {data_length} is not valid for a {width}x{height} image")]
    InvalidSurfaceDimensions {
        width: u32,
        height: u32,
        data_length: usize,
    },
}
