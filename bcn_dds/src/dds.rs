use std::io::{Read, Write};

use tracing::{trace, warn};

use crate::decode::decode_level;
use crate::header::{Header, HEADER_SIZE};
use crate::mipmap::clamp_level_count;
use crate::stream::{StreamCursor, WorkerPool};
use crate::{
    calculate_offset, mip_dimension, DdsError, DecodeOptions, Surface, SurfaceBgra8, SurfaceError,
};

/// A DDS file with a parsed header and the surface data following it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dds {
    pub header: Header,
    /// Image data for all mipmaps ordered from largest to smallest.
    pub data: Vec<u8>,
}

impl Dds {
    /// Read an entire DDS file from `reader`.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, DdsError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DdsError> {
        let header = Header::parse(bytes)?;
        let data = bytes
            .get(header.size_in_bytes()..)
            .unwrap_or_default()
            .to_vec();
        Ok(Self { header, data })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), DdsError> {
        self.header.write_to(writer)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

impl<T: AsRef<[u8]>> Surface<T> {
    /// Create a DDS file with a header matching the format and dimensions of the surface.
    pub fn to_dds(&self) -> Result<Dds, DdsError> {
        self.validate()?;

        let mipmaps = self.mipmaps.max(1);
        let size = calculate_offset(mipmaps, (self.width, self.height), self.image_format)
            .ok_or(SurfaceError::PixelCountWouldOverflow {
                width: self.width,
                height: self.height,
            })?;
        let data = self
            .data
            .as_ref()
            .get(..size)
            .ok_or(SurfaceError::NotEnoughData {
                expected: size,
                actual: self.data.as_ref().len(),
            })?;

        Ok(Dds {
            header: Header::build(self.width, self.height, mipmaps, self.image_format),
            data: data.to_vec(),
        })
    }
}

impl<'a> Surface<&'a [u8]> {
    /// Create a view over the data of `dds` using the format from its header.
    ///
    /// Mipmaps claimed by the header but missing from the data are
    /// dropped when decoding.
    pub fn from_dds(dds: &'a Dds) -> Result<Self, DdsError> {
        Ok(Surface {
            width: dds.header.width,
            height: dds.header.height,
            mipmaps: dds.header.mipmap_count(),
            image_format: dds.header.image_format()?,
            data: &dds.data,
        })
    }
}

/// Read a DDS file from `reader` one mipmap at a time and decode it to BGRA8.
///
/// Each level is read in order and then decoded in parallel rows.
/// Reading stops at the first incomplete mipmap after the base level.
pub fn decode_dds_stream<R: Read>(
    reader: R,
    options: &DecodeOptions,
) -> Result<(Header, SurfaceBgra8<Vec<u8>>), DdsError> {
    let cursor = StreamCursor::new(reader);

    let mut header_bytes = cursor.read_next(HEADER_SIZE)?;
    let header_size = Header::size_from_prefix(&header_bytes);
    if header_size > header_bytes.len() {
        header_bytes.extend(cursor.read_next(header_size - header_bytes.len())?);
    }
    let header = Header::parse(&header_bytes)?;
    let image_format = header.image_format()?;

    let (width, height) = (header.width, header.height);
    let count = clamp_level_count(width, height, header.mipmap_count());
    let pool = WorkerPool::new(options.parallelism)?;

    let mut data = Vec::new();
    let mut mipmaps = 0;
    for mipmap in 0..count {
        let level_width = mip_dimension(width, mipmap);
        let level_height = mip_dimension(height, mipmap);
        let size = image_format.level_size(level_width, level_height).ok_or(
            SurfaceError::PixelCountWouldOverflow {
                width: level_width,
                height: level_height,
            },
        )?;

        let level = cursor.read_next(size)?;
        if level.len() < size {
            if mipmap == 0 {
                return Err(SurfaceError::NotEnoughData {
                    expected: size,
                    actual: level.len(),
                }
                .into());
            }
            warn!(mipmap, expected = size, actual = level.len(), "Truncated mipmap chain to available data");
            break;
        }

        trace!(mipmap, width = level_width, height = level_height, "Decoding mipmap");
        data.extend(pool.install(|| {
            decode_level(image_format, level_width, level_height, &level, options)
        })?);
        mipmaps += 1;
    }

    Ok((
        header,
        SurfaceBgra8 {
            width,
            height,
            mipmaps,
            data,
        },
    ))
}

#[cfg(feature = "image")]
impl SurfaceBgra8<Vec<u8>> {
    /// Create a single mipmap surface from an RGBA8 image.
    pub fn from_image(image: &image::RgbaImage) -> Self {
        let mut data = image.as_raw().clone();
        crate::pixel::swap_red_blue(&mut data);
        Self {
            width: image.width(),
            height: image.height(),
            mipmaps: 1,
            data,
        }
    }
}

#[cfg(feature = "image")]
impl<T: AsRef<[u8]>> SurfaceBgra8<T> {
    /// Create an RGBA8 image from the given `mipmap`.
    pub fn to_image(&self, mipmap: u32) -> Result<image::RgbaImage, DdsError> {
        let width = mip_dimension(self.width, mipmap);
        let height = mip_dimension(self.height, mipmap);

        let mut data = self
            .get(mipmap)
            .ok_or(SurfaceError::MipmapDataOutOfBounds { mipmap })?
            .to_vec();
        crate::pixel::swap_red_blue(&mut data);

        let data_length = data.len();
        image::RgbaImage::from_raw(width, height, data).ok_or(DdsError::InvalidSurfaceDimensions {
            width,
            height,
            data_length,
        })
    }
}

/// Encode `image` to a DDS file with the given `format`.
///
/// Mipmaps are generated according to [crate::EncodeOptions::mipmaps].
#[cfg(feature = "image")]
pub fn dds_from_image(
    image: &image::RgbaImage,
    format: crate::ImageFormat,
    options: &crate::EncodeOptions,
) -> Result<Dds, DdsError> {
    SurfaceBgra8::from_image(image).encode(format, options)?.to_dds()
}

/// Decode the given `mipmap` from `dds` to an RGBA8 image.
#[cfg(feature = "image")]
pub fn image_from_dds(dds: &Dds, mipmap: u32) -> Result<image::RgbaImage, DdsError> {
    Surface::from_dds(dds)?
        .decode_bgra8(&DecodeOptions::default())?
        .to_image(mipmap)
}
