//! sRGB ↔ CIE L*a*b* conversion (D65 reference white).
//!
//! ```text
//! rgb_to_lab: sRGB decode → linear RGB → XYZ (D65 matrix) → XYZ / white → f(t) → L*a*b*
//!
//! f(t) = t^(1/3)                 t >  0.008856
//!      = 7.787 × t + 16 / 116    t <= 0.008856
//! ```
//!
//! `lab_to_rgb` runs the same chain backwards and clamps the encoded result
//! to `[0, 1]`.

use glam::{Mat3, Vec3};

use super::transfer::{SrgbTransfer, TransferFunction};

/// Linear sRGB → CIE XYZ, D65.
const RGB_TO_XYZ: Mat3 = Mat3::from_cols(
    Vec3::new(0.412_456_4, 0.212_672_9, 0.019_333_9),
    Vec3::new(0.357_576_1, 0.715_152_2, 0.119_192_0),
    Vec3::new(0.180_437_5, 0.072_175_0, 0.950_304_1),
);

/// CIE XYZ → linear sRGB, D65.
const XYZ_TO_RGB: Mat3 = Mat3::from_cols(
    Vec3::new(3.240_454_2, -0.969_266_0, 0.055_643_4),
    Vec3::new(-1.537_138_5, 1.876_010_8, -0.204_025_9),
    Vec3::new(-0.498_531_4, 0.041_556_0, 1.057_225_2),
);

/// D65 reference white in XYZ (Y normalized to 1).
const D65_WHITE: Vec3 = Vec3::new(0.950_47, 1.0, 1.088_83);

const EPSILON: f32 = 0.008_856;
const KAPPA_SLOPE: f32 = 7.787;
const OFFSET: f32 = 16.0 / 116.0;

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        KAPPA_SLOPE * t + OFFSET
    }
}

#[inline]
fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > EPSILON {
        cube
    } else {
        (f - OFFSET) / KAPPA_SLOPE
    }
}

/// Convert an sRGB-encoded triplet (`[0, 1]`) to `[L, a, b]`.
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let linear = Vec3::from_array(SrgbTransfer.rgb_to_linear(rgb));
    let xyz = RGB_TO_XYZ * linear / D65_WHITE;

    let fx = lab_f(xyz.x);
    let fy = lab_f(xyz.y);
    let fz = lab_f(xyz.z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Convert `[L, a, b]` back to an sRGB-encoded triplet clamped to `[0, 1]`.
pub fn lab_to_rgb(lab: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = lab;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let xyz = Vec3::new(lab_f_inv(fx), lab_f_inv(fy), lab_f_inv(fz)) * D65_WHITE;
    let linear = (XYZ_TO_RGB * xyz).to_array();

    SrgbTransfer
        .rgb_to_encoded(linear.map(|c| c.max(0.0)))
        .map(|c| c.clamp(0.0, 1.0))
}

/// [`rgb_to_lab`] returning a vector, for distance math.
#[inline]
pub fn rgb_to_lab_vec(rgb: [f32; 3]) -> Vec3 {
    Vec3::from_array(rgb_to_lab(rgb))
}
