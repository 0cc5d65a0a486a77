use crate::mipmap::estimate_level_count;
use crate::pixel::PixelLayout;
use crate::{calculate_offset, mip_dimension, ImageFormat, SurfaceError};

/// A 2D surface with an image format known at runtime.
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Surface<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The number of mipmaps in the surface.
    /// This should be `1` if the surface has only the base mip level.
    pub mipmaps: u32,
    /// The format of the bytes in [data](#structfield.data).
    pub image_format: ImageFormat,
    /// The combined image data ordered by mipmap without additional padding.
    pub data: T,
}

impl<T: AsRef<[u8]>> Surface<T> {
    /// Get the range of image data corresponding to the specified `mipmap`.
    ///
    /// The dimensions of the returned data should be calculated using [mip_dimension].
    /// Returns [None] if the expected range is not fully contained within the buffer.
    pub fn get(&self, mipmap: u32) -> Option<&[u8]> {
        get_mipmap(
            self.data.as_ref(),
            (self.width, self.height),
            self.image_format,
            mipmap,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), SurfaceError> {
        validate_dimensions(self.width, self.height)?;

        if let ImageFormat::Uncompressed(layout) = &self.image_format {
            layout.validate()?;
        }

        let base_size = self
            .image_format
            .level_size(self.width, self.height)
            .ok_or(SurfaceError::PixelCountWouldOverflow {
                width: self.width,
                height: self.height,
            })?;

        // Missing mipmaps are recoverable, but the base level is required.
        if base_size > self.data.as_ref().len() {
            return Err(SurfaceError::NotEnoughData {
                expected: base_size,
                actual: self.data.as_ref().len(),
            });
        }

        Ok(())
    }
}

/// An uncompressed BGRA8 surface with 4 bytes per pixel.
///
/// This is the intermediate format for encoding and decoding every [ImageFormat].
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceBgra8<T> {
    /// The width of the surface in pixels.
    pub width: u32,
    /// The height of the surface in pixels.
    pub height: u32,
    /// The number of mipmaps in the surface.
    /// This should be `1` if the surface has only the base mip level.
    pub mipmaps: u32,
    /// The combined image data ordered by mipmap without additional padding.
    pub data: T,
}

impl<T: AsRef<[u8]>> SurfaceBgra8<T> {
    /// Get the range of image data corresponding to the specified `mipmap`.
    ///
    /// The dimensions of the returned data should be calculated using [mip_dimension].
    /// Returns [None] if the expected range is not fully contained within the buffer.
    pub fn get(&self, mipmap: u32) -> Option<&[u8]> {
        get_mipmap(
            self.data.as_ref(),
            (self.width, self.height),
            ImageFormat::Uncompressed(PixelLayout::B8G8R8A8),
            mipmap,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), SurfaceError> {
        validate_dimensions(self.width, self.height)?;

        let max_mipmaps = estimate_level_count(self.width, self.height) + 1;
        if self.mipmaps > max_mipmaps {
            return Err(SurfaceError::UnexpectedMipmapCount {
                mipmaps: self.mipmaps,
                max_mipmaps,
            });
        }

        let format = ImageFormat::Uncompressed(PixelLayout::B8G8R8A8);
        let expected = calculate_offset(self.mipmaps.max(1), (self.width, self.height), format)
            .ok_or(SurfaceError::PixelCountWouldOverflow {
                width: self.width,
                height: self.height,
            })?;
        if expected > self.data.as_ref().len() {
            return Err(SurfaceError::NotEnoughData {
                expected,
                actual: self.data.as_ref().len(),
            });
        }

        Ok(())
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        Err(SurfaceError::ZeroSizedSurface { width, height })
    } else {
        Ok(())
    }
}

fn get_mipmap(
    data: &[u8],
    dimensions: (u32, u32),
    format: ImageFormat,
    mipmap: u32,
) -> Option<&[u8]> {
    let (width, height) = dimensions;
    let offset = calculate_offset(mipmap, dimensions, format)?;
    let size = format.level_size(mip_dimension(width, mipmap), mip_dimension(height, mipmap))?;
    data.get(offset..offset.checked_add(size)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_bc1_mipmaps() {
        let surface = Surface {
            width: 8,
            height: 8,
            mipmaps: 4,
            image_format: ImageFormat::BC1,
            data: (0..48u8).collect::<Vec<_>>(),
        };
        assert_eq!(Some(&surface.data[0..32]), surface.get(0));
        assert_eq!(Some(&surface.data[32..40]), surface.get(1));
        assert_eq!(Some(&surface.data[40..48]), surface.get(2));
        // 1x1 still occupies a whole block.
        assert_eq!(None, surface.get(3));
    }

    #[test]
    fn get_bgra8_mipmaps() {
        let surface = SurfaceBgra8 {
            width: 2,
            height: 2,
            mipmaps: 2,
            data: vec![0u8; 20],
        };
        assert_eq!(16, surface.get(0).unwrap().len());
        assert_eq!(4, surface.get(1).unwrap().len());
        assert_eq!(None, surface.get(2));
    }

    #[test]
    fn validate_zero_sized() {
        let surface = Surface {
            width: 0,
            height: 4,
            mipmaps: 1,
            image_format: ImageFormat::BC1,
            data: Vec::new(),
        };
        assert_eq!(
            Err(SurfaceError::ZeroSizedSurface {
                width: 0,
                height: 4
            }),
            surface.validate()
        );
    }

    #[test]
    fn validate_missing_base_level() {
        let surface = Surface {
            width: 8,
            height: 8,
            mipmaps: 1,
            image_format: ImageFormat::BC3 {
                premultiplied_alpha: false,
            },
            data: vec![0u8; 63],
        };
        assert_eq!(
            Err(SurfaceError::NotEnoughData {
                expected: 64,
                actual: 63
            }),
            surface.validate()
        );
    }

    #[test]
    fn validate_unsupported_bit_depth() {
        let surface = Surface {
            width: 1,
            height: 1,
            mipmaps: 1,
            image_format: ImageFormat::Uncompressed(PixelLayout {
                bit_count: 4,
                ..PixelLayout::L8
            }),
            data: vec![0u8; 4],
        };
        assert_eq!(
            Err(SurfaceError::UnsupportedBitDepth { bit_count: 4 }),
            surface.validate()
        );
    }

    #[test]
    fn validate_bgra8_too_many_mipmaps() {
        let surface = SurfaceBgra8 {
            width: 4,
            height: 2,
            mipmaps: 3,
            data: vec![0u8; 64],
        };
        assert_eq!(
            Err(SurfaceError::UnexpectedMipmapCount {
                mipmaps: 3,
                max_mipmaps: 2
            }),
            surface.validate()
        );
    }

    #[test]
    fn validate_bgra8_mipmap_data() {
        let surface = SurfaceBgra8 {
            width: 4,
            height: 4,
            mipmaps: 2,
            data: vec![0u8; 64],
        };
        assert_eq!(
            Err(SurfaceError::NotEnoughData {
                expected: 80,
                actual: 64
            }),
            surface.validate()
        );
    }
}
