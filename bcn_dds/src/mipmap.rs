//! Mip chains of progressively halved levels.
//!
//! Levels are either read from existing surface data, where a short stream
//! truncates the chain, or generated from the base level with an area filter.
//! Generation resamples alpha as its own plane so color is never weighted by alpha.
use tracing::warn;

use crate::{div_round_up, mip_dimension, ImageFormat, SurfaceError};

/// The number of levels after the base level that fit the smaller dimension,
/// computed as `floor(log2(min(width, height)))`.
///
/// A full chain has `estimate_level_count(width, height) + 1` levels.
pub fn estimate_level_count(width: u32, height: u32) -> u32 {
    width.min(height).max(1).ilog2()
}

/// A single level of a [MipChain].
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// BGRA8 pixels or encoded blocks depending on the chain.
    pub data: Vec<u8>,
}

/// Mip levels ordered from the base level to the smallest level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MipChain {
    pub levels: Vec<MipLevel>,
}

impl MipChain {
    /// Generate BGRA8 levels by repeatedly downsampling `base`.
    ///
    /// The chain has `count` levels including the base level,
    /// limited to what [estimate_level_count] allows.
    pub fn generate(base: MipLevel, count: u32) -> Result<Self, SurfaceError> {
        let (width, height) = (base.width, base.height);
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroSizedSurface { width, height });
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(4))
            .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
        if base.data.len() < expected {
            return Err(SurfaceError::NotEnoughData {
                expected,
                actual: base.data.len(),
            });
        }

        let count = count.clamp(1, estimate_level_count(width, height) + 1) as usize;

        let mut levels = Vec::with_capacity(count);
        levels.push(base);
        while levels.len() < count {
            if let Some(previous) = levels.last() {
                let next = downsample(previous);
                levels.push(next);
            }
        }

        Ok(Self { levels })
    }

    /// Split the data of a surface with `claimed` levels in `format` into levels.
    ///
    /// Levels that are not completely contained in `data` are dropped.
    /// A base level without enough data is an error.
    pub fn read(
        width: u32,
        height: u32,
        format: ImageFormat,
        claimed: u32,
        data: &[u8],
    ) -> Result<Self, SurfaceError> {
        let count = clamp_level_count(width, height, claimed);

        let mut levels = Vec::new();
        let mut offset = 0usize;
        for mipmap in 0..count {
            let level_width = mip_dimension(width, mipmap);
            let level_height = mip_dimension(height, mipmap);
            let size = format.level_size(level_width, level_height).ok_or(
                SurfaceError::PixelCountWouldOverflow {
                    width: level_width,
                    height: level_height,
                },
            )?;

            let end = offset.saturating_add(size);
            match data.get(offset..end) {
                Some(level) => levels.push(MipLevel {
                    width: level_width,
                    height: level_height,
                    data: level.to_vec(),
                }),
                None if mipmap == 0 => {
                    return Err(SurfaceError::NotEnoughData {
                        expected: size,
                        actual: data.len(),
                    })
                }
                None => {
                    warn!(
                        mipmap,
                        expected = end,
                        actual = data.len(),
                        "Truncated mipmap chain to available data"
                    );
                    break;
                }
            }
            offset = end;
        }

        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The combined data of all levels ordered by mipmap.
    pub fn into_data(self) -> Vec<u8> {
        self.levels.into_iter().flat_map(|l| l.data).collect()
    }
}

/// Limit the level count claimed by a header to the levels the dimensions allow.
pub(crate) fn clamp_level_count(width: u32, height: u32, claimed: u32) -> u32 {
    let max_levels = estimate_level_count(width, height) + 1;
    if claimed > max_levels {
        warn!(
            claimed,
            max_levels, "Ignoring mipmaps beyond the smallest dimension"
        );
    }
    claimed.clamp(1, max_levels)
}

/// Dimensions rounded up to whole blocks of `format`.
///
/// A 1x1 level of a block compressed format still requires 4x4 pixels of data.
pub fn physical_dimensions(width: u32, height: u32, format: ImageFormat) -> (u32, u32) {
    let (block_width, block_height) = format.block_dimensions();
    let round_up = |x: u32, n: u32| div_round_up(x as usize, n as usize) as u32 * n;
    (round_up(width, block_width), round_up(height, block_height))
}

/// Pad a BGRA8 level to whole blocks of `format` by repeating the last column and row.
pub(crate) fn pad_to_blocks(level: &MipLevel, format: ImageFormat) -> MipLevel {
    let (width, height) = physical_dimensions(level.width, level.height, format);
    if (width, height) == (level.width, level.height) {
        return level.clone();
    }

    let source_width = level.width as usize;
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        let row_start = y.min(level.height as usize - 1) * source_width * 4;
        let row = &level.data[row_start..row_start + source_width * 4];
        data.extend_from_slice(row);
        if let Some(edge) = row.get(row.len() - 4..) {
            for _ in source_width..width as usize {
                data.extend_from_slice(edge);
            }
        }
    }

    MipLevel {
        width,
        height,
        data,
    }
}

/// Halve the dimensions of a BGRA8 level with an area filter.
fn downsample(level: &MipLevel) -> MipLevel {
    let source = (level.width as usize, level.height as usize);
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let target = (width as usize, height as usize);

    let pixels: &[[u8; 4]] = bytemuck::cast_slice(&level.data[..source.0 * source.1 * 4]);
    let color: Vec<u8> = pixels.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();
    let alpha: Vec<u8> = pixels.iter().map(|p| p[3]).collect();

    let color = resample_area(&color, 3, source, target);
    let alpha = resample_area(&alpha, 1, source, target);

    let data = color
        .chunks_exact(3)
        .zip(alpha)
        .flat_map(|(c, a)| [c[0], c[1], c[2], a])
        .collect();

    MipLevel {
        width,
        height,
        data,
    }
}

// The source pixels overlapping each target pixel and the covered fraction of each.
fn coverage(source: usize, target: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = source as f32 / target as f32;
    (0..target)
        .map(|t| {
            let start = t as f32 * scale;
            let end = start + scale;
            (start.floor() as usize..(end.ceil() as usize).min(source))
                .filter_map(|s| {
                    let weight = end.min(s as f32 + 1.0) - start.max(s as f32);
                    (weight > 0.0).then_some((s, weight))
                })
                .collect()
        })
        .collect()
}

fn resample_area(
    data: &[u8],
    channels: usize,
    source: (usize, usize),
    target: (usize, usize),
) -> Vec<u8> {
    let columns = coverage(source.0, target.0);
    let rows = coverage(source.1, target.1);

    let mut resampled = Vec::with_capacity(target.0 * target.1 * channels);
    for row in &rows {
        for column in &columns {
            let mut sum = [0.0f32; 4];
            let mut total = 0.0;
            for &(y, wy) in row {
                for &(x, wx) in column {
                    let weight = wx * wy;
                    let i = (y * source.0 + x) * channels;
                    for (s, value) in sum.iter_mut().zip(&data[i..i + channels]) {
                        *s += *value as f32 * weight;
                    }
                    total += weight;
                }
            }
            resampled.extend(sum[..channels].iter().map(|s| (s / total).round() as u8));
        }
    }
    resampled
}
