use std::io::BufWriter;

use bcn_dds::{ImageFormat, Surface};

// Block decoding can be tested exhaustively by sweeping every endpoint pair.
// Each block uses every index value so a single file covers the full palette.
// Test data is based on the following blogpost:
// https://fgiesen.wordpress.com/2021/10/04/gpu-bcn-decoding/
fn main() {
    let surfaces = [
        ("bc1_r.dds", bc1_r()),
        ("bc1_g.dds", bc1_g()),
        ("bc1_b.dds", bc1_b()),
        ("bc2_r.dds", bc2_r()),
        ("bc2_g.dds", bc2_g()),
        ("bc2_b.dds", bc2_b()),
        ("bc3_r.dds", bc3_r()),
        ("bc3_g.dds", bc3_g()),
        ("bc3_b.dds", bc3_b()),
        ("bc4_r.dds", bc4_r()),
        ("bc4_r_signed.dds", bc4_r_signed()),
        ("bc5_r.dds", bc5_r()),
        ("bc5_g.dds", bc5_g()),
        ("bc5_r_signed.dds", bc5_r_signed()),
        ("bc5_g_signed.dds", bc5_g_signed()),
    ];

    for (path, surface) in surfaces {
        let dds = surface.to_dds().unwrap();
        let mut writer = BufWriter::new(std::fs::File::create(path).unwrap());
        dds.write(&mut writer).unwrap();
        println!("Wrote {path}");
    }
}

fn bc1_r() -> Surface<Vec<u8>> {
    // 5-bit independent R channel for BC1 end points.
    bcn(5, ImageFormat::BC1, |i, j| bc1_block(i, 0, 0, j, 0, 0).to_le_bytes())
}

fn bc1_g() -> Surface<Vec<u8>> {
    // 6-bit independent G channel for BC1 end points.
    bcn(6, ImageFormat::BC1, |i, j| bc1_block(0, i, 0, 0, j, 0).to_le_bytes())
}

fn bc1_b() -> Surface<Vec<u8>> {
    // 5-bit independent B channel for BC1 end points.
    bcn(5, ImageFormat::BC1, |i, j| bc1_block(0, 0, i, 0, 0, j).to_le_bytes())
}

fn bc1_block(r0: u64, g0: u64, b0: u64, r1: u64, g1: u64, b1: u64) -> u64 {
    let c0 = (r0 << 11) | (g0 << 5) | b0;
    let c1 = (r1 << 11) | (g1 << 5) | b1;

    // Use each unique 2-bit value for the 4x4 indices.
    let indices = bit_indices(4 * 4, 2);

    (indices << 32) | (c1 << 16) | c0
}

const BC2: ImageFormat = ImageFormat::BC2 {
    premultiplied_alpha: false,
};

fn bc2_r() -> Surface<Vec<u8>> {
    bcn(5, BC2, |i, j| bc2_block(i, 0, 0, j, 0, 0).to_le_bytes())
}

fn bc2_g() -> Surface<Vec<u8>> {
    bcn(6, BC2, |i, j| bc2_block(0, i, 0, 0, j, 0).to_le_bytes())
}

fn bc2_b() -> Surface<Vec<u8>> {
    bcn(5, BC2, |i, j| bc2_block(0, 0, i, 0, 0, j).to_le_bytes())
}

fn bc2_block(r0: u64, g0: u64, b0: u64, r1: u64, g1: u64, b1: u64) -> u128 {
    // Every 4-bit alpha value fits in a single block.
    let alpha_block = bit_indices(4 * 4, 4);

    ((bc1_block(r0, g0, b0, r1, g1, b1) as u128) << 64) | alpha_block as u128
}

const BC3: ImageFormat = ImageFormat::BC3 {
    premultiplied_alpha: false,
};

fn bc3_r() -> Surface<Vec<u8>> {
    // 8-bit alpha end points require more blocks than the color end points.
    bcn(8, BC3, |i, j| {
        bc3_block((i % 32, 0, 0, i), (j % 32, 0, 0, j)).to_le_bytes()
    })
}

fn bc3_g() -> Surface<Vec<u8>> {
    bcn(8, BC3, |i, j| {
        bc3_block((0, i % 64, 0, i), (0, j % 64, 0, j)).to_le_bytes()
    })
}

fn bc3_b() -> Surface<Vec<u8>> {
    bcn(8, BC3, |i, j| {
        bc3_block((0, 0, i % 32, i), (0, 0, j % 32, j)).to_le_bytes()
    })
}

fn bc3_block(rgba0: (u64, u64, u64, u64), rgba1: (u64, u64, u64, u64)) -> u128 {
    let (r0, g0, b0, a0) = rgba0;
    let (r1, g1, b1, a1) = rgba1;

    let alpha_block = channel_block(a0, a1);
    ((bc1_block(r0, g0, b0, r1, g1, b1) as u128) << 64) | alpha_block as u128
}

fn channel_block(e0: u64, e1: u64) -> u64 {
    // Use each unique 3-bit value for the 4x4 indices.
    let indices = bit_indices(4 * 4, 3);

    (indices << 16) | (e1 << 8) | e0
}

fn bc4_r() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC4 { signed: false }, |i, j| {
        channel_block(i, j).to_le_bytes()
    })
}

fn bc4_r_signed() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC4 { signed: true }, |i, j| {
        channel_block(i, j).to_le_bytes()
    })
}

fn bc5_r() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC5 { signed: false }, |i, j| {
        (channel_block(i, j) as u128).to_le_bytes()
    })
}

fn bc5_g() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC5 { signed: false }, |i, j| {
        ((channel_block(i, j) as u128) << 64).to_le_bytes()
    })
}

fn bc5_r_signed() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC5 { signed: true }, |i, j| {
        (channel_block(i, j) as u128).to_le_bytes()
    })
}

fn bc5_g_signed() -> Surface<Vec<u8>> {
    bcn(8, ImageFormat::BC5 { signed: true }, |i, j| {
        ((channel_block(i, j) as u128) << 64).to_le_bytes()
    })
}

fn bcn<const N: usize, F>(bits: u64, image_format: ImageFormat, block: F) -> Surface<Vec<u8>>
where
    F: Fn(u64, u64) -> [u8; N],
{
    let blocks = 1 << bits;

    let mut data = Vec::new();
    for i in 0..blocks {
        for j in 0..blocks {
            data.extend_from_slice(&block(i, j));
        }
    }

    // Lay out the sweep as a square grid of blocks.
    Surface {
        width: blocks as u32 * 4,
        height: blocks as u32 * 4,
        mipmaps: 1,
        image_format,
        data,
    }
}

fn bit_indices(count: u64, bits: u64) -> u64 {
    // Repeat unique bit patterns for count.
    let mut indices = 0;
    for i in 0..count {
        indices |= (i % (1 << bits)) << (i * bits);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcn_dds::{DecodeOptions, Dds, SurfaceBgra8};

    fn decode(surface: Surface<Vec<u8>>) -> SurfaceBgra8<Vec<u8>> {
        // Test the entire surface -> dds -> bytes -> decode pipeline.
        let bytes = surface.to_dds().unwrap().to_bytes();
        let dds = Dds::from_bytes(&bytes).unwrap();
        Surface::from_dds(&dds)
            .unwrap()
            .decode_bgra8(&DecodeOptions::default())
            .unwrap()
    }

    fn block_pixels(decoded: &SurfaceBgra8<Vec<u8>>, block: usize) -> Vec<[u8; 4]> {
        let blocks_per_row = decoded.width as usize / 4;
        let (bx, by) = (block % blocks_per_row, block / blocks_per_row);
        (0..16)
            .map(|i| {
                let x = bx * 4 + i % 4;
                let y = by * 4 + i / 4;
                let start = (y * decoded.width as usize + x) * 4;
                decoded.data[start..start + 4].try_into().unwrap()
            })
            .collect()
    }

    #[test]
    fn bc1_four_color_block() {
        // i = 31, j = 0 has color0 > color1.
        let decoded = decode(bc1_r());
        let pixels = block_pixels(&decoded, 31 * 32);
        assert_eq!([0, 0, 255, 255], pixels[0]);
        assert_eq!([0, 0, 0, 255], pixels[1]);
        assert_eq!([0, 0, 170, 255], pixels[2]);
        assert_eq!([0, 0, 85, 255], pixels[3]);
    }

    #[test]
    fn bc1_three_color_block() {
        // i = 0, j = 31 has color0 <= color1.
        let decoded = decode(bc1_r());
        let pixels = block_pixels(&decoded, 31);
        assert_eq!([0, 0, 0, 255], pixels[0]);
        assert_eq!([0, 0, 255, 255], pixels[1]);
        assert_eq!([0, 0, 128, 255], pixels[2]);
        assert_eq!([0, 0, 0, 0], pixels[3]);
    }

    #[test]
    fn bc2_color_is_always_four_color() {
        let decoded = decode(bc2_r());
        let pixels = block_pixels(&decoded, 31);
        assert_eq!([0, 0, 170, 0x33], pixels[3]);
        // Explicit alpha repeats the 4-bit value in both nibbles.
        let alpha: Vec<_> = pixels.iter().map(|p| p[3]).collect();
        assert_eq!((0..16).map(|i| i * 17).collect::<Vec<u8>>(), alpha);
    }

    #[test]
    fn bc4_sweep_endpoints() {
        let decoded = decode(bc4_r());
        // e0 = 255, e1 = 0 uses 8 steps.
        let pixels = block_pixels(&decoded, 255 * 256);
        let values: Vec<_> = pixels.iter().take(8).map(|p| p[0]).collect();
        assert_eq!(vec![255, 0, 218, 182, 145, 109, 73, 36], values);

        // e0 = 0, e1 = 255 uses 6 steps with fixed extremes.
        let pixels = block_pixels(&decoded, 255);
        let values: Vec<_> = pixels.iter().take(8).map(|p| p[0]).collect();
        assert_eq!(vec![0, 255, 51, 102, 153, 204, 0, 255], values);
    }

    #[test]
    fn bc5_signed_blue_is_midpoint() {
        let decoded = decode(bc5_r_signed());
        assert!(decoded.data.chunks_exact(4).all(|p| p[0] == 128 && p[3] == 255));
    }

    #[test]
    fn bc5_green_sweep_leaves_red_zero() {
        let decoded = decode(bc5_g());
        assert!(decoded.data.chunks_exact(4).all(|p| p[2] == 0));
    }
}
