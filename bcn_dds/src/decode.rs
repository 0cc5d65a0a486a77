use tracing::trace;

use crate::bcn::{decompress_level, Bc1, Bc2, Bc3, Bc4, Bc4S, Bc5, Bc5S};
use crate::mipmap::{MipChain, MipLevel};
use crate::pixel::{decode_pixels, PixelLayout};
use crate::stream::{for_each_row, WorkerPool};
use crate::{DecodeOptions, ImageFormat, Surface, SurfaceBgra8, SurfaceError};

impl<T: AsRef<[u8]>> Surface<T> {
    /// Decode all mipmaps from `surface` to a chain of BGRA8 levels.
    ///
    /// Mipmaps missing from the end of the data are left out of the chain.
    pub fn decode_chain(&self, options: &DecodeOptions) -> Result<MipChain, SurfaceError> {
        self.validate()?;

        let encoded = MipChain::read(
            self.width,
            self.height,
            self.image_format,
            self.mipmaps,
            self.data.as_ref(),
        )?;

        let image_format = self.image_format;
        let levels = WorkerPool::new(options.parallelism)?.install(|| {
            encoded
                .levels
                .iter()
                .enumerate()
                .map(|(mipmap, level)| {
                    trace!(mipmap, width = level.width, height = level.height, "Decoding mipmap");
                    Ok(MipLevel {
                        width: level.width,
                        height: level.height,
                        data: decode_level(
                            image_format,
                            level.width,
                            level.height,
                            &level.data,
                            options,
                        )?,
                    })
                })
                .collect::<Result<Vec<_>, SurfaceError>>()
        })?;

        Ok(MipChain { levels })
    }

    /// Decode all mipmaps from `surface` to BGRA8.
    pub fn decode_bgra8(&self, options: &DecodeOptions) -> Result<SurfaceBgra8<Vec<u8>>, SurfaceError> {
        let chain = self.decode_chain(options)?;
        Ok(SurfaceBgra8 {
            width: self.width,
            height: self.height,
            mipmaps: chain.len() as u32,
            data: chain.into_data(),
        })
    }
}

/// Decode a single level with the given dimensions to BGRA8 on the current pool.
pub(crate) fn decode_level(
    image_format: ImageFormat,
    width: u32,
    height: u32,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    use ImageFormat as F;
    match image_format {
        F::BC1 => decompress_level::<Bc1>(width, height, data, options),
        F::BC2 { .. } => decompress_level::<Bc2>(width, height, data, options),
        F::BC3 { .. } => decompress_level::<Bc3>(width, height, data, options),
        F::BC4 { signed: false } => decompress_level::<Bc4>(width, height, data, options),
        F::BC4 { signed: true } => decompress_level::<Bc4S>(width, height, data, options),
        F::BC5 { signed: false } => decompress_level::<Bc5>(width, height, data, options),
        F::BC5 { signed: true } => decompress_level::<Bc5S>(width, height, data, options),
        F::BC6H { .. } | F::BC7 => Err(SurfaceError::UnsupportedFormat {
            format: image_format,
        }),
        F::Uncompressed(layout) => decode_uncompressed(&layout, width, height, data, options),
    }
}

fn decode_uncompressed(
    layout: &PixelLayout,
    width: u32,
    height: u32,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    layout.validate()?;

    let overflow = SurfaceError::PixelCountWouldOverflow { width, height };
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or(overflow.clone())?;
    let expected = pixels
        .checked_mul(layout.bytes_per_pixel())
        .ok_or(overflow.clone())?;
    if data.len() < expected {
        return Err(SurfaceError::NotEnoughData {
            expected,
            actual: data.len(),
        });
    }

    let src_row_size = width as usize * layout.bytes_per_pixel();
    let mut bgra = vec![0u8; pixels.checked_mul(4).ok_or(overflow)?];
    for_each_row(
        &mut bgra,
        width as usize * 4,
        options.parallelism,
        options.cancellation.as_ref(),
        |y, row| {
            let start = y * src_row_size;
            decode_pixels(layout, &data[start..start + src_row_size], row);
            Ok(())
        },
    )?;

    Ok(bgra)
}
