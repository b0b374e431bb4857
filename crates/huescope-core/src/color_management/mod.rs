//! Color management: sRGB transfer curve and CIE LAB conversion.

pub mod lab;
pub mod transfer;

/// BT.601 luma weights in thousandths, used for histogram luminance.
pub const LUMA_WEIGHTS: [u32; 3] = [299, 587, 114];

/// Perceptual luma of an encoded RGB triplet.
///
/// Weighted in integer thousandths with f64 accumulation, so a gray input
/// `r == g == b == v` yields exactly `v` and quantizes into the same bin as
/// its channels.
#[inline]
pub fn luma(rgb: [f32; 3]) -> f32 {
    let sum: f64 = LUMA_WEIGHTS
        .iter()
        .zip(rgb)
        .map(|(&w, c)| w as f64 * c as f64)
        .sum();
    (sum / 1000.0) as f32
}
