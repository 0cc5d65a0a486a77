//! Encoding and decoding of single 4x4 texels for BC1 through BC5.
//!
//! Each format is a marker type implementing [BcnEncode] and [BcnDecode].
//! Texels are rows of BGRA pixels, so pixel `(x, y)` is `texel[y][x]`.
mod decode;
mod encode;
pub mod palette;

pub use decode::{decode_bcn, BcnDecode, ReadBlock};
pub use encode::{encode_bcn, BcnEncode};

pub(crate) use decode::decompress_level;
pub(crate) use encode::compress_level;

pub const BLOCK_WIDTH: usize = 4;
pub const BLOCK_HEIGHT: usize = 4;
pub const CHANNELS: usize = 4;

// Channel offsets within a BGRA pixel.
pub(crate) const B: usize = 0;
pub(crate) const G: usize = 1;
pub(crate) const R: usize = 2;
pub(crate) const A: usize = 3;

/// A 4x4 block of BGRA pixels in row-major order.
pub type Texel = [[[u8; CHANNELS]; BLOCK_WIDTH]; BLOCK_HEIGHT];

/// DXT1
pub struct Bc1;
/// DXT2 and DXT3
pub struct Bc2;
/// DXT4 and DXT5
pub struct Bc3;
/// ATI1
pub struct Bc4;
pub struct Bc4S;
/// ATI2
pub struct Bc5;
pub struct Bc5S;

fn pixels(texel: &Texel) -> [[u8; CHANNELS]; 16] {
    bytemuck::cast(*texel)
}

fn texel(pixels: [[u8; CHANNELS]; 16]) -> Texel {
    bytemuck::cast(pixels)
}
