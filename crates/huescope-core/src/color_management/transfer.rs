//! Transfer function (OETF/EOTF) for the sRGB encoding.
//!
//! Transfer functions convert between non-linear (encoded) and linear light values.

/// A transfer function that converts between linear and non-linear encodings.
pub trait TransferFunction: Send + Sync {
    /// Convert from non-linear (encoded) to linear light.
    fn to_linear(&self, encoded: f32) -> f32;

    /// Convert from linear light to non-linear (encoded).
    fn to_encoded(&self, linear: f32) -> f32;

    /// Decode an RGB triplet.
    fn rgb_to_linear(&self, rgb: [f32; 3]) -> [f32; 3] {
        rgb.map(|c| self.to_linear(c))
    }

    /// Encode an RGB triplet.
    fn rgb_to_encoded(&self, rgb: [f32; 3]) -> [f32; 3] {
        rgb.map(|c| self.to_encoded(c))
    }
}

/// sRGB transfer function per IEC 61966-2-1.
///
/// ```text
/// to_linear:   V <= 0.04045 → V / 12.92
///              V >  0.04045 → ((V + 0.055) / 1.055) ^ 2.4
///
/// from_linear: L <= 0.0031308 → L × 12.92
///              L >  0.0031308 → 1.055 × L^(1/2.4) − 0.055
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SrgbTransfer;

impl SrgbTransfer {
    const DECODE_CUT: f32 = 0.04045;
    const ENCODE_CUT: f32 = 0.003_130_8;
}

impl TransferFunction for SrgbTransfer {
    fn to_linear(&self, encoded: f32) -> f32 {
        if encoded <= Self::DECODE_CUT {
            encoded / 12.92
        } else {
            ((encoded + 0.055) / 1.055).powf(2.4)
        }
    }

    fn to_encoded(&self, linear: f32) -> f32 {
        if linear <= Self::ENCODE_CUT {
            linear * 12.92
        } else {
            1.055 * linear.powf(1.0 / 2.4) - 0.055
        }
    }
}
