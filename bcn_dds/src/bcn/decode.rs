use crate::pixel::convert::{unorm4_to_unorm8, Channel};
use crate::stream::{for_each_row, WorkerPool};
use crate::{div_round_up, mip_size, DecodeOptions, SurfaceError};

use super::palette::{channel_palette, color_palette};
use super::{texel, Bc1, Bc2, Bc3, Bc4, Bc4S, Bc5, Bc5S, Texel, A, BLOCK_HEIGHT, BLOCK_WIDTH, CHANNELS};

pub trait BcnDecode {
    type CompressedBlock: ReadBlock;

    // The decoded 4x4 pixel blocks are in row-major ordering.
    fn decompress_block(block: &Self::CompressedBlock) -> Texel;
}

// Allows block types to read and copy buffer data to enforce alignment.
pub trait ReadBlock: Sized {
    const SIZE_IN_BYTES: usize;

    /// Read a block from the start of `data` or [None] if `data` is too short.
    fn read_block(data: &[u8]) -> Option<Self>;
}

impl ReadBlock for [u8; 8] {
    const SIZE_IN_BYTES: usize = 8;

    fn read_block(data: &[u8]) -> Option<Self> {
        data.get(..8)?.try_into().ok()
    }
}

impl ReadBlock for [u8; 16] {
    const SIZE_IN_BYTES: usize = 16;

    fn read_block(data: &[u8]) -> Option<Self> {
        data.get(..16)?.try_into().ok()
    }
}

impl BcnDecode for Bc1 {
    type CompressedBlock = [u8; 8];

    fn decompress_block(block: &[u8; 8]) -> Texel {
        texel(decode_color_block(block, false))
    }
}

impl BcnDecode for Bc2 {
    type CompressedBlock = [u8; 16];

    fn decompress_block(block: &[u8; 16]) -> Texel {
        let [alpha, color] = halves(block);
        let mut pixels = decode_color_block(&color, true);
        for (pixel, alpha) in pixels.iter_mut().zip(decode_explicit_alpha(&alpha)) {
            pixel[A] = alpha;
        }
        texel(pixels)
    }
}

impl BcnDecode for Bc3 {
    type CompressedBlock = [u8; 16];

    fn decompress_block(block: &[u8; 16]) -> Texel {
        let [alpha, color] = halves(block);
        let mut pixels = decode_color_block(&color, true);
        for (pixel, alpha) in pixels.iter_mut().zip(decode_channel_block::<u8>(&alpha)) {
            pixel[A] = alpha;
        }
        texel(pixels)
    }
}

impl BcnDecode for Bc4 {
    type CompressedBlock = [u8; 8];

    fn decompress_block(block: &[u8; 8]) -> Texel {
        texel(decode_channel_block::<u8>(block).map(|v| [v, v, v, 255]))
    }
}

impl BcnDecode for Bc4S {
    type CompressedBlock = [u8; 8];

    fn decompress_block(block: &[u8; 8]) -> Texel {
        texel(decode_channel_block::<i8>(block).map(|v| [v, v, v, 255]))
    }
}

impl BcnDecode for Bc5 {
    type CompressedBlock = [u8; 16];

    fn decompress_block(block: &[u8; 16]) -> Texel {
        // It's convention to zero the blue channel when decompressing BC5.
        decode_two_channel_block::<u8>(block, 0)
    }
}

impl BcnDecode for Bc5S {
    type CompressedBlock = [u8; 16];

    fn decompress_block(block: &[u8; 16]) -> Texel {
        // Signed zero maps to the middle of the unsigned range.
        decode_two_channel_block::<i8>(block, 128)
    }
}

fn halves(block: &[u8; 16]) -> [[u8; 8]; 2] {
    bytemuck::cast(*block)
}

fn decode_two_channel_block<C: Channel>(block: &[u8; 16], blue: u8) -> Texel {
    let [x, y] = halves(block);
    let x = decode_channel_block::<C>(&x);
    let y = decode_channel_block::<C>(&y);
    texel(std::array::from_fn(|i| [blue, y[i], x[i], 255]))
}

/// Decode a BC1 style color block to 16 BGRA pixels.
pub(crate) fn decode_color_block(block: &[u8; 8], opaque_only: bool) -> [[u8; 4]; 16] {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let palette = color_palette(color0, color1, opaque_only);
    std::array::from_fn(|i| palette[((indices >> (2 * i)) & 0x3) as usize])
}

/// Decode a single channel block to 16 unsigned values.
pub(crate) fn decode_channel_block<C: Channel>(block: &[u8; 8]) -> [u8; 16] {
    let e0 = C::from_byte(block[0]).to_i32();
    let e1 = C::from_byte(block[1]).to_i32();
    let palette = channel_palette(e0, e1, C::ANCHOR_MIN, C::ANCHOR_MAX);

    // 48 bits of 3-bit indices.
    let mut bits = [0u8; 8];
    bits[..6].copy_from_slice(&block[2..]);
    let indices = u64::from_le_bytes(bits);

    std::array::from_fn(|i| {
        let value = palette[((indices >> (3 * i)) & 0x7) as usize];
        C::from_i32(value).to_unorm8()
    })
}

/// Decode 4 bit alpha values stored with the low nibble first.
pub(crate) fn decode_explicit_alpha(block: &[u8; 8]) -> [u8; 16] {
    std::array::from_fn(|i| unorm4_to_unorm8((block[i / 2] >> (4 * (i % 2))) & 0xF))
}

/// Decompress the blocks in `data` to a BGRA8 level with the given dimensions.
pub fn decode_bcn<F: BcnDecode>(
    width: u32,
    height: u32,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    WorkerPool::new(options.parallelism)?
        .install(|| decompress_level::<F>(width, height, data, options))
}

pub(crate) fn decompress_level<F: BcnDecode>(
    width: u32,
    height: u32,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    let block_size = F::CompressedBlock::SIZE_IN_BYTES;
    let overflow = SurfaceError::PixelCountWouldOverflow { width, height };

    // Mipmap dimensions do not need to be multiples of the block dimensions.
    // A mipmap of size 1x1 pixels can still be decoded.
    let expected_size = mip_size(
        width as usize,
        height as usize,
        BLOCK_WIDTH,
        BLOCK_HEIGHT,
        block_size,
    )
    .ok_or(overflow.clone())?;
    if data.len() < expected_size {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_size,
            actual: data.len(),
        });
    }

    let width = width as usize;
    let height = height as usize;
    let row_size = width.checked_mul(CHANNELS).ok_or(overflow.clone())?;
    let size = row_size.checked_mul(height).ok_or(overflow)?;
    let mut bgra = vec![0u8; size];

    // Each row of blocks covers up to 4 rows of pixels.
    let blocks_per_row = div_round_up(width, BLOCK_WIDTH);
    for_each_row(
        &mut bgra,
        row_size * BLOCK_HEIGHT,
        options.parallelism,
        options.cancellation.as_ref(),
        |block_y, rows| {
            let rows_height = rows.len() / row_size;
            for block_x in 0..blocks_per_row {
                let offset = (block_y * blocks_per_row + block_x) * block_size;
                let block = data
                    .get(offset..)
                    .and_then(F::CompressedBlock::read_block)
                    .ok_or(SurfaceError::NotEnoughData {
                        expected: offset + block_size,
                        actual: data.len(),
                    })?;

                put_rgba_block(
                    rows,
                    F::decompress_block(&block),
                    block_x * BLOCK_WIDTH,
                    0,
                    width,
                    rows_height,
                );
            }
            Ok(())
        },
    )?;

    Ok(bgra)
}

fn put_rgba_block(
    surface: &mut [u8],
    pixels: Texel,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) {
    // The edges won't always have full blocks.
    let elements_per_row = CHANNELS * BLOCK_WIDTH.min(width - x);

    for (row, row_pixels) in pixels.iter().enumerate().take(BLOCK_HEIGHT.min(height - y)) {
        let surface_index = ((y + row) * width + x) * CHANNELS;
        surface[surface_index..surface_index + elements_per_row]
            .copy_from_slice(&bytemuck::cast_slice(row_pixels)[..elements_per_row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcn::pixels;
    use crate::{CancellationToken, Parallelism};
    use rstest::rstest;

    fn color_block(color0: u16, color1: u16, indices: u32) -> [u8; 8] {
        let mut block = [0u8; 8];
        block[..2].copy_from_slice(&color0.to_le_bytes());
        block[2..4].copy_from_slice(&color1.to_le_bytes());
        block[4..].copy_from_slice(&indices.to_le_bytes());
        block
    }

    fn channel_block(e0: u8, e1: u8, indices: [u8; 16]) -> [u8; 8] {
        let mut bits = 0u64;
        for (i, index) in indices.iter().enumerate() {
            bits |= (*index as u64) << (3 * i);
        }
        let mut block = (bits << 16).to_le_bytes();
        block[0] = e0;
        block[1] = e1;
        block
    }

    #[test]
    fn bc1_four_colors() {
        // Index 2 is 2/3 of the way to color0.
        let block = color_block(0xFFFF, 0x0000, 0xAAAAAAAA);
        assert_eq!([[[170, 170, 170, 255]; 4]; 4], Bc1::decompress_block(&block));
    }

    #[test]
    fn bc1_transparent_index() {
        let block = color_block(0x0000, 0xFFFF, 0xFFFFFFFE);
        let pixels = pixels(&Bc1::decompress_block(&block));
        assert_eq!([128, 128, 128, 255], pixels[0]);
        for pixel in &pixels[1..] {
            assert_eq!([0, 0, 0, 0], *pixel);
        }
    }

    #[test]
    fn bc1_index_order() {
        // The first pixel uses the lowest bits.
        let block = color_block(0xF800, 0x001F, 0b01);
        let pixels = pixels(&Bc1::decompress_block(&block));
        assert_eq!([255, 0, 0, 255], pixels[0]);
        assert_eq!([0, 0, 255, 255], pixels[1]);
    }

    #[test]
    fn bc2_ignores_endpoint_order() {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&[0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE]);
        block[8..].copy_from_slice(&color_block(0x0000, 0xFFFF, 0xFFFFFFFF));

        let pixels = pixels(&Bc2::decompress_block(&block));
        for (i, pixel) in pixels.iter().enumerate() {
            // Index 3 is a color instead of transparent black.
            assert_eq!([170, 170, 170, (i * 17) as u8], *pixel);
        }
    }

    #[test]
    fn bc3_alpha_six_steps() {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&channel_block(
            255,
            0,
            [0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7],
        ));
        block[8..].copy_from_slice(&color_block(0xFFFF, 0xFFFF, 0));

        let alpha = pixels(&Bc3::decompress_block(&block)).map(|p| p[A]);
        assert_eq!([255, 0, 218, 182, 145, 109, 73, 36], alpha[..8]);
        assert_eq!(alpha[..8], alpha[8..]);
    }

    #[test]
    fn bc3_alpha_four_steps() {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&channel_block(
            0,
            255,
            [0, 1, 2, 3, 4, 5, 6, 7, 0, 0, 0, 0, 0, 0, 0, 0],
        ));
        let alpha = pixels(&Bc3::decompress_block(&block)).map(|p| p[A]);
        assert_eq!([0, 255, 51, 102, 153, 204, 0, 255], alpha[..8]);
    }

    #[test]
    fn bc4_replicates_gray() {
        let block = channel_block(200, 100, [1; 16]);
        assert_eq!([[[100, 100, 100, 255]; 4]; 4], Bc4::decompress_block(&block));
    }

    #[rstest]
    #[case(0x7F, 255)]
    #[case(0x00, 128)]
    #[case(0x81, 0)]
    // -128 clamps to -1.0.
    #[case(0x80, 0)]
    fn bc4_signed_endpoints(#[case] endpoint: u8, #[case] expected: u8) {
        let block = channel_block(endpoint, endpoint, [0; 16]);
        assert_eq!(
            [[[expected, expected, expected, 255]; 4]; 4],
            Bc4S::decompress_block(&block)
        );
    }

    #[test]
    fn bc5_zero_blue() {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&channel_block(10, 10, [0; 16]));
        block[8..].copy_from_slice(&channel_block(20, 20, [0; 16]));
        assert_eq!([[[0, 20, 10, 255]; 4]; 4], Bc5::decompress_block(&block));
    }

    #[test]
    fn bc5_signed_middle_blue() {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&channel_block(0x7F, 0x7F, [0; 16]));
        block[8..].copy_from_slice(&channel_block(0x81, 0x81, [0; 16]));
        assert_eq!([[[128, 0, 255, 255]; 4]; 4], Bc5S::decompress_block(&block));
    }

    #[test]
    fn read_block_too_short() {
        assert_eq!(None, <[u8; 8]>::read_block(&[0u8; 7]));
        assert_eq!(Some([1u8; 8]), <[u8; 8]>::read_block(&[1u8; 9]));
        assert_eq!(None, <[u8; 16]>::read_block(&[0u8; 8]));
    }

    #[rstest]
    #[case(Parallelism::Sequential)]
    #[case(Parallelism::Automatic)]
    fn decode_bcn_partial_blocks(#[case] parallelism: Parallelism) {
        // 5x5 pixels uses 2x2 blocks.
        let mut data = Vec::new();
        for color in [0xFFFFu16, 0xF800, 0x07E0, 0x001F] {
            data.extend_from_slice(&color_block(color, color, 0));
        }
        let options = DecodeOptions {
            parallelism,
            cancellation: None,
        };
        let bgra = decode_bcn::<Bc1>(5, 5, &data, &options).unwrap();
        assert_eq!(5 * 5 * 4, bgra.len());

        let pixel = |x: usize, y: usize| &bgra[(y * 5 + x) * 4..(y * 5 + x) * 4 + 4];
        assert_eq!([255, 255, 255, 255], pixel(3, 3));
        assert_eq!([0, 0, 255, 255], pixel(4, 0));
        assert_eq!([0, 255, 0, 255], pixel(0, 4));
        assert_eq!([255, 0, 0, 255], pixel(4, 4));
    }

    #[test]
    fn decode_bcn_not_enough_data() {
        let result = decode_bcn::<Bc3>(8, 4, &[0u8; 31], &DecodeOptions::default());
        assert_eq!(
            Err(SurfaceError::NotEnoughData {
                expected: 32,
                actual: 31
            }),
            result
        );
    }

    #[test]
    fn decode_bcn_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let options = DecodeOptions {
            parallelism: Parallelism::Sequential,
            cancellation: Some(token),
        };
        assert_eq!(
            Err(SurfaceError::Cancelled),
            decode_bcn::<Bc4>(4, 4, &[0u8; 8], &options)
        );
    }

    #[test]
    fn put_rgba_block_4x4() {
        // Write an entire block.
        let mut surface = vec![0u8; 4 * 4 * 4];
        put_rgba_block(&mut surface, [[[1u8; 4]; BLOCK_WIDTH]; BLOCK_HEIGHT], 0, 0, 4, 4);
        assert_eq!(vec![1u8; 4 * 4 * 4], surface);
    }

    #[test]
    fn put_rgba_block_5x5() {
        // Test that block xy offsets work properly.
        let mut surface = vec![0u8; 5 * 5 * 4];

        put_rgba_block(&mut surface, [[[1u8; 4]; BLOCK_WIDTH]; BLOCK_HEIGHT], 0, 0, 5, 5);
        put_rgba_block(&mut surface, [[[2u8; 4]; BLOCK_WIDTH]; BLOCK_HEIGHT], 1, 1, 5, 5);

        assert_eq!(
            [
                [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0],
                [1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
                [1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
                [1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
                [0, 0, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>(),
            surface
        );
    }
}
