/// A single channel value as stored in a compressed single channel block.
pub trait Channel: Copy {
    /// The anchor for the lowest palette entry in 4 step blocks.
    const ANCHOR_MIN: i32;
    /// The anchor for the highest palette entry in 4 step blocks.
    const ANCHOR_MAX: i32;

    fn to_unorm8(self) -> u8;
    fn from_unorm8(u: u8) -> Self;
    fn to_i32(self) -> i32;
    /// Convert a palette value back to the channel, clamping to its range.
    fn from_i32(i: i32) -> Self;
    fn from_byte(b: u8) -> Self;
    fn to_byte(self) -> u8;
}

impl Channel for u8 {
    const ANCHOR_MIN: i32 = 0;
    const ANCHOR_MAX: i32 = 255;

    fn to_unorm8(self) -> u8 {
        self
    }

    fn from_unorm8(u: u8) -> Self {
        u
    }

    fn to_i32(self) -> i32 {
        self as i32
    }

    fn from_i32(i: i32) -> Self {
        i.clamp(Self::ANCHOR_MIN, Self::ANCHOR_MAX) as u8
    }

    fn from_byte(b: u8) -> Self {
        b
    }

    fn to_byte(self) -> u8 {
        self
    }
}

impl Channel for i8 {
    // -128 and -127 both represent -1.0.
    const ANCHOR_MIN: i32 = -127;
    const ANCHOR_MAX: i32 = 127;

    fn to_unorm8(self) -> u8 {
        snorm8_to_unorm8(self as u8)
    }

    fn from_unorm8(u: u8) -> Self {
        unorm8_to_snorm8(u) as i8
    }

    fn to_i32(self) -> i32 {
        self as i32
    }

    fn from_i32(i: i32) -> Self {
        i.clamp(Self::ANCHOR_MIN, Self::ANCHOR_MAX) as i8
    }

    fn from_byte(b: u8) -> Self {
        b as i8
    }

    fn to_byte(self) -> u8 {
        self as u8
    }
}

pub fn snorm8_to_unorm8(x: u8) -> u8 {
    // Validated against decoding R8Snorm DDS with GPU and paint.net (DirectXTex).
    if x < 128 {
        x + 128
    } else if x == 128 {
        0
    } else {
        x - 129
    }
}

pub fn unorm8_to_snorm8(x: u8) -> u8 {
    // Inverse of snorm_to_unorm.
    if x >= 128 {
        x - 128
    } else if x == 127 {
        0
    } else {
        x + 129
    }
}

pub fn unorm4_to_unorm8(x: u8) -> u8 {
    x * 17
}

pub fn unorm8_to_unorm4(x: u8) -> u8 {
    ((x as u16 * 15 + 135) >> 8) as u8
}

/// Scale an unsigned value with `max` as full scale to 8 bits.
pub fn unorm_to_unorm8(x: u32, max: u32) -> u8 {
    ((x as u64 * 255 + max as u64 / 2) / max as u64) as u8
}

/// Scale an 8 bit value to an unsigned value with `max` as full scale.
pub fn unorm8_to_unorm(x: u8, max: u32) -> u32 {
    ((x as u64 * max as u64 + 127) / 255) as u32
}

/// Remap a two's complement value with `bits` bits to an unsigned byte.
pub fn snorm_to_unorm8(x: u32, bits: u32) -> u8 {
    if bits == 8 {
        return snorm8_to_unorm8(x as u8);
    }
    let signed = ((x << (32 - bits)) as i32) >> (32 - bits);
    let max = (1i64 << (bits - 1)) - 1;
    let f = (signed as i64).max(-max) as f32 / max as f32;
    ((f * 0.5 + 0.5) * 255.0).round() as u8
}

/// Remap an unsigned byte to a two's complement value with `bits` bits.
pub fn unorm8_to_snorm(x: u8, bits: u32) -> u32 {
    if bits == 8 {
        return unorm8_to_snorm8(x) as u32;
    }
    let max = ((1i64 << (bits - 1)) - 1) as f32;
    let signed = (((x as f32 / 255.0) * 2.0 - 1.0) * max).round() as i32;
    let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
    signed as u32 & mask
}
