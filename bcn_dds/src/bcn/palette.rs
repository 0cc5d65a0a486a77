//! Endpoint selection and palette expansion shared by the block codecs.
//!
//! Color math is done in floating point with channels in `0.0..=1.0`.
//! Encoders scale colors by per channel weights before searching for
//! endpoints so that error in green counts more than error in red or blue.
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use super::{B, G, R};

/// Relative luminance contribution of each channel normalized to green.
pub const LUMINANCE: Rgb = Rgb::new(0.2125 / 0.7154, 1.0, 0.0721 / 0.7154);
pub const UNIFORM: Rgb = Rgb::new(1.0, 1.0, 1.0);

// Newton iterations stop once every endpoint update is below this.
const EPSILON: f32 = (0.25 / 64.0) * (0.25 / 64.0);
const MAX_ITERATIONS: usize = 8;

// Interpolation weights for the first and second endpoint of each palette step
// ordered from the first endpoint to the second.
const STEPS3_C: [f32; 3] = [1.0, 0.5, 0.0];
const STEPS3_D: [f32; 3] = [0.0, 0.5, 1.0];
const STEPS4_C: [f32; 4] = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
const STEPS4_D: [f32; 4] = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_bgra(pixel: [u8; 4]) -> Self {
        Self::new(
            pixel[R] as f32 / 255.0,
            pixel[G] as f32 / 255.0,
            pixel[B] as f32 / 255.0,
        )
    }

    pub fn dot(self, other: Self) -> f32 {
        self.r * other.r + self.g * other.g + self.b * other.b
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    fn saturate(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }

    fn min(self, other: Self) -> Self {
        Self::new(
            self.r.min(other.r),
            self.g.min(other.g),
            self.b.min(other.b),
        )
    }

    fn max(self, other: Self) -> Self {
        Self::new(
            self.r.max(other.r),
            self.g.max(other.g),
            self.b.max(other.b),
        )
    }
}

impl Add for Rgb {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for Rgb {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Rgb {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b)
    }
}

impl Mul for Rgb {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl Mul<f32> for Rgb {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl Div for Rgb {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::new(self.r / rhs.r, self.g / rhs.g, self.b / rhs.b)
    }
}

/// Quantize a color to the nearest 5:6:5 value.
pub fn encode_565(color: Rgb) -> u16 {
    let color = color.saturate();
    let r = (color.r * 31.0 + 0.5) as u16;
    let g = (color.g * 63.0 + 0.5) as u16;
    let b = (color.b * 31.0 + 0.5) as u16;
    (r << 11) | (g << 5) | b
}

/// Expand a 5:6:5 color to 8 bits per channel as BGRA.
pub fn expand_565(color: u16) -> [u8; 4] {
    let r = (((color >> 11) & 0x1F) as u32 * 527 + 23) >> 6;
    let g = (((color >> 5) & 0x3F) as u32 * 259 + 33) >> 6;
    let b = ((color & 0x1F) as u32 * 527 + 23) >> 6;
    [b as u8, g as u8, r as u8, 255]
}

/// The four BGRA colors selected by BC1 indices.
///
/// `color0 <= color1` selects three colors and a transparent black entry
/// unless `opaque_only` is set as for the color blocks of BC2 and BC3.
pub fn color_palette(color0: u16, color1: u16, opaque_only: bool) -> [[u8; 4]; 4] {
    let c0 = expand_565(color0);
    let c1 = expand_565(color1);
    let blend = |w0: u32, w1: u32, d: u32| {
        let mut color = [0u8, 0, 0, 255];
        for c in [B, G, R] {
            color[c] = ((w0 * c0[c] as u32 + w1 * c1[c] as u32 + d / 2) / d) as u8;
        }
        color
    };

    if color0 > color1 || opaque_only {
        [c0, c1, blend(2, 1, 3), blend(1, 2, 3)]
    } else {
        [c0, c1, blend(1, 1, 2), [0u8; 4]]
    }
}

/// The eight values selected by single channel indices.
///
/// `e0 > e1` interpolates six values. Otherwise four values are interpolated
/// and the last two entries are the `min` and `max` anchors of the channel.
pub fn channel_palette(e0: i32, e1: i32, min: i32, max: i32) -> [i32; 8] {
    let blend = |w0: i32, w1: i32, d: i32| (w0 * e0 + w1 * e1 + 1).div_euclid(d);
    if e0 > e1 {
        [
            e0,
            e1,
            blend(6, 1, 7),
            blend(5, 2, 7),
            blend(4, 3, 7),
            blend(3, 4, 7),
            blend(2, 5, 7),
            blend(1, 6, 7),
        ]
    } else {
        [
            e0,
            e1,
            blend(4, 1, 5),
            blend(3, 2, 5),
            blend(2, 3, 5),
            blend(1, 4, 5),
            min,
            max,
        ]
    }
}

/// The index of the palette value closest to `value`.
/// Ties resolve to the lower index.
pub fn nearest_channel_index(palette: &[i32; 8], value: i32) -> usize {
    let mut best = 0;
    for (i, p) in palette.iter().enumerate().skip(1) {
        if (p - value).abs() < (palette[best] - value).abs() {
            best = i;
        }
    }
    best
}

/// The index in `candidates` of the color closest to `color`.
/// Ties resolve to the earlier candidate.
pub fn nearest_color_index(palette: &[Rgb], candidates: &[usize], color: Rgb) -> usize {
    let mut best = candidates[0];
    let mut best_distance = f32::MAX;
    for &i in candidates {
        let distance = (palette[i] - color).length_squared();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Quantize each color to the 5:6:5 grid.
///
/// With `dither`, the quantization error of each pixel in raster order is
/// diffused to its unvisited neighbors within the block using Floyd-Steinberg weights.
pub fn quantize_block(colors: &[Rgb; 16], dither: bool) -> [Rgb; 16] {
    let mut quantized = [Rgb::default(); 16];
    let mut error = [Rgb::default(); 16];

    for i in 0..16 {
        let color = if dither { colors[i] + error[i] } else { colors[i] };
        quantized[i] = Rgb::new(
            (color.r * 31.0 + 0.5).floor() / 31.0,
            (color.g * 63.0 + 0.5).floor() / 63.0,
            (color.b * 31.0 + 0.5).floor() / 31.0,
        );

        if dither {
            let diff = color - quantized[i];
            let x = i % 4;
            if x != 3 {
                error[i + 1] += diff * (7.0 / 16.0);
            }
            if i < 12 {
                if x != 0 {
                    error[i + 3] += diff * (3.0 / 16.0);
                }
                error[i + 4] += diff * (5.0 / 16.0);
                if x != 3 {
                    error[i + 5] += diff * (1.0 / 16.0);
                }
            }
        }
    }

    quantized
}

/// Find two endpoints for a ramp of `steps` colors that fit `points`.
///
/// The points and `weights` should already be in weighted space.
/// The returned endpoints are ordered along the axis of greatest variance
/// and are not quantized.
pub fn optimize_endpoints(points: &[Rgb], steps: usize, weights: Rgb) -> (Rgb, Rgb) {
    let (pc, pd): (&[f32], &[f32]) = if steps == 3 {
        (&STEPS3_C, &STEPS3_D)
    } else {
        (&STEPS4_C, &STEPS4_D)
    };

    // Start from the bounding box diagonal.
    let mut x = weights;
    let mut y = Rgb::default();
    for p in points {
        x = x.min(*p);
        y = y.max(*p);
    }

    let ab = y - x;
    let ab_length = ab.length_squared();
    if ab_length < f32::MIN_POSITIVE {
        return (x, y);
    }

    // Pick the diagonal of the box that best fits the points.
    let dir = ab * (1.0 / ab_length);
    let mid = (x + y) * 0.5;
    let mut fit = [0.0f32; 4];
    for p in points {
        let pt = (*p - mid) * dir;
        for (i, f) in [
            pt.r + pt.g + pt.b,
            pt.r + pt.g - pt.b,
            pt.r - pt.g + pt.b,
            pt.r - pt.g - pt.b,
        ]
        .into_iter()
        .enumerate()
        {
            fit[i] += f * f;
        }
    }

    let mut best_dir = 0;
    for i in 1..4 {
        if fit[i] > fit[best_dir] {
            best_dir = i;
        }
    }
    if best_dir & 2 != 0 {
        std::mem::swap(&mut x.g, &mut y.g);
    }
    if best_dir & 1 != 0 {
        std::mem::swap(&mut x.b, &mut y.b);
    }

    if ab_length < 1.0 / 4096.0 {
        return (x, y);
    }

    // Newton's method on the sum of squared error for the current assignments.
    let steps_f = (steps - 1) as f32;
    for _ in 0..MAX_ITERATIONS {
        let mut ramp = [Rgb::default(); 4];
        for i in 0..steps {
            ramp[i] = x * pc[i] + y * pd[i];
        }

        let dir = y - x;
        let length = dir.length_squared();
        if length < 1.0 / 4096.0 {
            break;
        }
        let dir = dir * (steps_f / length);

        let mut d2x = 0.0;
        let mut d2y = 0.0;
        let mut dx = Rgb::default();
        let mut dy = Rgb::default();

        for p in points {
            let dot = (*p - x).dot(dir);
            let step = if dot <= 0.0 {
                0
            } else if dot >= steps_f {
                steps - 1
            } else {
                (dot + 0.5) as usize
            };

            let diff = ramp[step] - *p;
            let c = pc[step] / 8.0;
            let d = pd[step] / 8.0;

            d2x += c * pc[step];
            dx += diff * c;
            d2y += d * pd[step];
            dy += diff * d;
        }

        let step_x = newton_step(dx, d2x);
        let step_y = newton_step(dy, d2y);
        x += step_x;
        y += step_y;

        if is_converged(step_x) && is_converged(step_y) {
            break;
        }
    }

    (x, y)
}

fn newton_step(gradient: Rgb, curvature: f32) -> Rgb {
    if curvature > 0.0 {
        gradient * (-1.0 / curvature)
    } else {
        Rgb::default()
    }
}

// Each channel moved by less than a quarter of a 6 bit step.
fn is_converged(step: Rgb) -> bool {
    step.r * step.r < EPSILON && step.g * step.g < EPSILON && step.b * step.b < EPSILON
}
