use crate::pixel::convert::{unorm8_to_unorm4, Channel};
use crate::stream::{for_each_row, WorkerPool};
use crate::{div_round_up, ColorWeighting, EncodeOptions, SurfaceError};

use super::palette::{
    channel_palette, color_palette, encode_565, nearest_channel_index, nearest_color_index,
    optimize_endpoints, quantize_block, Rgb, LUMINANCE, UNIFORM,
};
use super::{
    pixels, Bc1, Bc2, Bc3, Bc4, Bc4S, Bc5, Bc5S, Texel, A, BLOCK_HEIGHT, BLOCK_WIDTH, CHANNELS, G, R,
};

/// Endpoints of white with every index selecting the transparent entry.
const TRANSPARENT_BLOCK: [u8; 8] = [0xFF; 8];

pub trait BcnEncode {
    type CompressedBlock: AsRef<[u8]>;

    fn compress_block(texel: &Texel, options: &EncodeOptions) -> Self::CompressedBlock;
}

impl BcnEncode for Bc1 {
    type CompressedBlock = [u8; 8];

    fn compress_block(texel: &Texel, options: &EncodeOptions) -> [u8; 8] {
        encode_color_block(texel, options, true)
    }
}

impl BcnEncode for Bc2 {
    type CompressedBlock = [u8; 16];

    fn compress_block(texel: &Texel, options: &EncodeOptions) -> [u8; 16] {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&encode_explicit_alpha(texel));
        block[8..].copy_from_slice(&encode_color_block(texel, options, false));
        block
    }
}

impl BcnEncode for Bc3 {
    type CompressedBlock = [u8; 16];

    fn compress_block(texel: &Texel, options: &EncodeOptions) -> [u8; 16] {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&encode_channel_block::<u8>(channel(texel, A)));
        block[8..].copy_from_slice(&encode_color_block(texel, options, false));
        block
    }
}

impl BcnEncode for Bc4 {
    type CompressedBlock = [u8; 8];

    fn compress_block(texel: &Texel, _: &EncodeOptions) -> [u8; 8] {
        encode_channel_block::<u8>(channel(texel, R))
    }
}

impl BcnEncode for Bc4S {
    type CompressedBlock = [u8; 8];

    fn compress_block(texel: &Texel, _: &EncodeOptions) -> [u8; 8] {
        encode_channel_block::<i8>(channel(texel, R))
    }
}

impl BcnEncode for Bc5 {
    type CompressedBlock = [u8; 16];

    fn compress_block(texel: &Texel, _: &EncodeOptions) -> [u8; 16] {
        encode_two_channel_block::<u8>(texel)
    }
}

impl BcnEncode for Bc5S {
    type CompressedBlock = [u8; 16];

    fn compress_block(texel: &Texel, _: &EncodeOptions) -> [u8; 16] {
        encode_two_channel_block::<i8>(texel)
    }
}

/// Compress a BGRA8 level padded to whole blocks.
///
/// `width` and `height` are the dimensions before padding.
pub fn encode_bcn<F: BcnEncode>(
    width: u32,
    height: u32,
    bgra: &[u8],
    options: &EncodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    WorkerPool::new(options.parallelism)?
        .install(|| compress_level::<F>(width, height, bgra, options))
}

/// [encode_bcn] on the current pool.
pub(crate) fn compress_level<F: BcnEncode>(
    width: u32,
    height: u32,
    bgra: &[u8],
    options: &EncodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    let overflow = SurfaceError::PixelCountWouldOverflow { width, height };
    let blocks_x = div_round_up(width as usize, BLOCK_WIDTH);
    let blocks_y = div_round_up(height as usize, BLOCK_HEIGHT);
    let block_size = std::mem::size_of::<F::CompressedBlock>();

    let row_size = blocks_x
        .checked_mul(BLOCK_WIDTH * CHANNELS)
        .ok_or(overflow.clone())?;
    let expected = row_size
        .checked_mul(blocks_y * BLOCK_HEIGHT)
        .ok_or(overflow.clone())?;
    if bgra.len() < expected {
        return Err(SurfaceError::NotEnoughData {
            expected,
            actual: bgra.len(),
        });
    }

    let block_row_size = blocks_x.checked_mul(block_size).ok_or(overflow.clone())?;
    let size = block_row_size.checked_mul(blocks_y).ok_or(overflow)?;
    let mut encoded = vec![0u8; size];

    for_each_row(
        &mut encoded,
        block_row_size,
        options.parallelism,
        options.cancellation.as_ref(),
        |block_y, blocks| {
            for (block_x, block) in blocks.chunks_exact_mut(block_size).enumerate() {
                let mut texel = Texel::default();
                for (y, texel_row) in texel.iter_mut().enumerate() {
                    let start = (block_y * BLOCK_HEIGHT + y) * row_size
                        + block_x * BLOCK_WIDTH * CHANNELS;
                    let row: &[[u8; 4]] =
                        bytemuck::cast_slice(&bgra[start..start + BLOCK_WIDTH * CHANNELS]);
                    texel_row.copy_from_slice(row);
                }
                block.copy_from_slice(F::compress_block(&texel, options).as_ref());
            }
            Ok(())
        },
    )?;

    Ok(encoded)
}

fn channel(texel: &Texel, c: usize) -> [u8; 16] {
    pixels(texel).map(|p| p[c])
}

fn encode_two_channel_block<C: Channel>(texel: &Texel) -> [u8; 16] {
    // X and Y of the normal are stored in red and green.
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(&encode_channel_block::<C>(channel(texel, R)));
    block[8..].copy_from_slice(&encode_channel_block::<C>(channel(texel, G)));
    block
}

/// Encode 16 values to a single channel block.
///
/// Both palette modes are tried and the one with the lower squared error is kept.
pub(crate) fn encode_channel_block<C: Channel>(values: [u8; 16]) -> [u8; 8] {
    let values = values.map(|v| {
        C::from_unorm8(v)
            .to_i32()
            .clamp(C::ANCHOR_MIN, C::ANCHOR_MAX)
    });
    let min = values.iter().copied().min().unwrap_or(C::ANCHOR_MIN);
    let max = values.iter().copied().max().unwrap_or(C::ANCHOR_MAX);

    // The larger endpoint first interpolates 6 values over the whole range.
    let (interpolated, interpolated_error) = channel_block::<C>(&values, max, min);

    // The smaller endpoint first interpolates 4 values and adds both anchors,
    // so the endpoints only need to cover the values between the anchors.
    let is_inner = |v: &i32| *v != C::ANCHOR_MIN && *v != C::ANCHOR_MAX;
    let inner_min = values.iter().copied().filter(is_inner).min();
    let inner_max = values.iter().copied().filter(is_inner).max();
    let (anchored, anchored_error) = channel_block::<C>(
        &values,
        inner_min.unwrap_or(C::ANCHOR_MIN),
        inner_max.unwrap_or(C::ANCHOR_MIN),
    );

    if anchored_error < interpolated_error {
        anchored
    } else {
        interpolated
    }
}

fn channel_block<C: Channel>(values: &[i32; 16], e0: i32, e1: i32) -> ([u8; 8], i64) {
    let palette = channel_palette(e0, e1, C::ANCHOR_MIN, C::ANCHOR_MAX);

    let mut indices = 0u64;
    let mut error = 0i64;
    for (i, value) in values.iter().enumerate() {
        let index = nearest_channel_index(&palette, *value);
        let diff = (palette[index] - value) as i64;
        error += diff * diff;
        indices |= (index as u64) << (3 * i);
    }

    let mut block = (indices << 16).to_le_bytes();
    block[0] = C::from_i32(e0).to_byte();
    block[1] = C::from_i32(e1).to_byte();
    (block, error)
}

/// Encode alpha as 4 bits per pixel with the low nibble first.
pub(crate) fn encode_explicit_alpha(texel: &Texel) -> [u8; 8] {
    let mut block = [0u8; 8];
    for (i, alpha) in channel(texel, A).iter().enumerate() {
        block[i / 2] |= unorm8_to_unorm4(*alpha) << (4 * (i % 2));
    }
    block
}

/// Encode the RGB of a texel to a BC1 style color block.
///
/// `color_key` enables pixels with alpha below the threshold to select
/// the transparent palette entry. The color blocks of BC2 and BC3 always use 4 colors.
pub(crate) fn encode_color_block(texel: &Texel, options: &EncodeOptions, color_key: bool) -> [u8; 8] {
    let pixels = pixels(texel);
    let is_transparent =
        |p: &[u8; 4]| color_key && (p[A] as f32 / 255.0) < options.alpha_threshold;

    let transparent_count = pixels.iter().filter(|p| is_transparent(p)).count();
    if transparent_count == pixels.len() {
        return TRANSPARENT_BLOCK;
    }
    let steps = if transparent_count > 0 { 3 } else { 4 };

    let weights = match options.weighting {
        ColorWeighting::Perceptual => LUMINANCE,
        ColorWeighting::Uniform => UNIFORM,
    };

    let colors = pixels.map(Rgb::from_bgra);
    let quantized = quantize_block(&colors, options.dither);

    // Transparent pixels don't contribute to the endpoints.
    let mut points = [Rgb::default(); 16];
    let mut point_count = 0;
    for (pixel, color) in pixels.iter().zip(quantized) {
        if !is_transparent(pixel) {
            points[point_count] = color * weights;
            point_count += 1;
        }
    }

    let (a, b) = optimize_endpoints(&points[..point_count], steps, weights);
    let color_a = encode_565(a / weights);
    let color_b = encode_565(b / weights);

    if steps == 4 && color_a == color_b {
        return pack_color_block(color_a, color_b, 0);
    }

    // The endpoint order selects between 3 and 4 colors.
    let (color0, color1) = if (steps == 3) == (color_a <= color_b) {
        (color_a, color_b)
    } else {
        (color_b, color_a)
    };

    let palette = color_palette(color0, color1, !color_key).map(|c| Rgb::from_bgra(c) * weights);
    let candidates: &[usize] = if steps == 3 { &[0, 1, 2] } else { &[0, 1, 2, 3] };

    let mut indices = 0u32;
    for (i, (pixel, color)) in pixels.iter().zip(colors).enumerate() {
        let index = if is_transparent(pixel) {
            3
        } else {
            nearest_color_index(&palette, candidates, color * weights)
        };
        indices |= (index as u32) << (2 * i);
    }

    pack_color_block(color0, color1, indices)
}

fn pack_color_block(color0: u16, color1: u16, indices: u32) -> [u8; 8] {
    let mut block = [0u8; 8];
    block[0..2].copy_from_slice(&color0.to_le_bytes());
    block[2..4].copy_from_slice(&color1.to_le_bytes());
    block[4..8].copy_from_slice(&indices.to_le_bytes());
    block
}
