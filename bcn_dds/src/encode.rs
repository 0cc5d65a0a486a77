use tracing::trace;

use crate::bcn::{compress_level, Bc1, Bc2, Bc3, Bc4, Bc4S, Bc5, Bc5S, BcnEncode};
use crate::mipmap::{estimate_level_count, pad_to_blocks, MipChain, MipLevel};
use crate::pixel::{encode_pixels, PixelLayout};
use crate::stream::{for_each_row, WorkerPool};
use crate::{EncodeOptions, ImageFormat, Mipmaps, Surface, SurfaceBgra8, SurfaceError};

impl<T: AsRef<[u8]>> SurfaceBgra8<T> {
    /// Encode a BGRA8 surface to the given `format`.
    ///
    /// The number of mipmaps depends on [EncodeOptions::mipmaps].
    /// Data for DXT2 and DXT4 should already be premultiplied by alpha.
    pub fn encode(
        &self,
        format: ImageFormat,
        options: &EncodeOptions,
    ) -> Result<Surface<Vec<u8>>, SurfaceError> {
        self.validate()?;

        // Check the format before doing any work.
        match format {
            ImageFormat::BC6H { .. } | ImageFormat::BC7 => {
                return Err(SurfaceError::UnsupportedFormat { format })
            }
            ImageFormat::Uncompressed(layout) => layout.validate()?,
            _ => (),
        }

        let chain = self.mip_chain(options.mipmaps)?;

        let data = WorkerPool::new(options.parallelism)?.install(|| {
            let mut data = Vec::new();
            for (mipmap, level) in chain.levels.iter().enumerate() {
                trace!(mipmap, width = level.width, height = level.height, "Encoding mipmap");
                data.extend_from_slice(&encode_level(format, level, options)?);
            }
            Ok::<_, SurfaceError>(data)
        })?;

        Ok(Surface {
            width: self.width,
            height: self.height,
            mipmaps: chain.len() as u32,
            image_format: format,
            data,
        })
    }

    fn mip_chain(&self, mipmaps: Mipmaps) -> Result<MipChain, SurfaceError> {
        let level = |mipmap: u32| -> Result<MipLevel, SurfaceError> {
            let data = self
                .get(mipmap)
                .ok_or(SurfaceError::MipmapDataOutOfBounds { mipmap })?;
            Ok(MipLevel {
                width: crate::mip_dimension(self.width, mipmap),
                height: crate::mip_dimension(self.height, mipmap),
                data: data.to_vec(),
            })
        };

        let max_mipmaps = estimate_level_count(self.width, self.height) + 1;
        match mipmaps {
            Mipmaps::Disabled => Ok(MipChain {
                levels: vec![level(0)?],
            }),
            Mipmaps::FromSurface => Ok(MipChain {
                levels: (0..self.mipmaps.max(1))
                    .map(level)
                    .collect::<Result<_, SurfaceError>>()?,
            }),
            Mipmaps::GeneratedExact(count) if count > max_mipmaps => {
                Err(SurfaceError::UnexpectedMipmapCount {
                    mipmaps: count,
                    max_mipmaps,
                })
            }
            Mipmaps::GeneratedExact(count) => MipChain::generate(level(0)?, count),
            Mipmaps::GeneratedAutomatic => MipChain::generate(level(0)?, max_mipmaps),
        }
    }
}

fn encode_level(
    format: ImageFormat,
    level: &MipLevel,
    options: &EncodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    use ImageFormat as F;
    match format {
        F::BC1 => encode_padded::<Bc1>(format, level, options),
        F::BC2 { .. } => encode_padded::<Bc2>(format, level, options),
        F::BC3 { .. } => encode_padded::<Bc3>(format, level, options),
        F::BC4 { signed: false } => encode_padded::<Bc4>(format, level, options),
        F::BC4 { signed: true } => encode_padded::<Bc4S>(format, level, options),
        F::BC5 { signed: false } => encode_padded::<Bc5>(format, level, options),
        F::BC5 { signed: true } => encode_padded::<Bc5S>(format, level, options),
        F::BC6H { .. } | F::BC7 => Err(SurfaceError::UnsupportedFormat { format }),
        F::Uncompressed(layout) => encode_uncompressed(&layout, level, options),
    }
}

fn encode_padded<E: BcnEncode>(
    format: ImageFormat,
    level: &MipLevel,
    options: &EncodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    // The physical size must have integral dimensions in blocks.
    let padded = pad_to_blocks(level, format);
    compress_level::<E>(level.width, level.height, &padded.data, options)
}

fn encode_uncompressed(
    layout: &PixelLayout,
    level: &MipLevel,
    options: &EncodeOptions,
) -> Result<Vec<u8>, SurfaceError> {
    let width = level.width as usize;
    let height = level.height as usize;
    let row_size = width * layout.bytes_per_pixel();

    let mut encoded = vec![0u8; row_size * height];
    for_each_row(
        &mut encoded,
        row_size,
        options.parallelism,
        options.cancellation.as_ref(),
        |y, row| {
            let start = y * width * 4;
            encode_pixels(layout, &level.data[start..start + width * 4], row);
            Ok(())
        },
    )?;

    Ok(encoded)
}
