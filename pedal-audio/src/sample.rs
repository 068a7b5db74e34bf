//! 24-bit-in-32 sample conversion
//!
//! Converter frames carry a signed 24-bit value right-justified in each
//! 32-bit word. The top byte is ignored on input.

use crate::dsp::soft_clip;

/// 2^-23
const S24_TO_F32: f32 = 1.192_092_9e-7;
/// 2^23
const F32_TO_S24: f32 = 8_388_608.0;

const S24_MAX: i32 = 0x7F_FFFF;
const S24_MIN: i32 = -0x80_0000;

/// Sign-extend the low 24 bits and scale to [-1, 1)
#[inline]
pub fn s24_to_f32(x: i32) -> f32 {
    let v = ((x & 0xFF_FFFF) ^ 0x80_0000) - 0x80_0000;
    v as f32 * S24_TO_F32
}

/// Soft clip, scale and clamp to the signed 24-bit range
#[inline]
pub fn f32_to_s24(x: f32) -> i32 {
    ((soft_clip(x) * F32_TO_S24) as i32).clamp(S24_MIN, S24_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extension() {
        assert_eq!(s24_to_f32(0), 0.0);
        assert_eq!(s24_to_f32(0x80_0000), -1.0);
        assert!((s24_to_f32(0x7F_FFFF) - 1.0).abs() < 1e-6);
        // Top byte is not part of the sample
        assert_eq!(s24_to_f32(0x7F40_0000), s24_to_f32(0x40_0000));
        assert_eq!(s24_to_f32(-1), -S24_TO_F32);
    }

    #[test]
    fn test_output_clamped() {
        assert!(f32_to_s24(10.0) <= S24_MAX);
        assert!(f32_to_s24(-10.0) >= S24_MIN);
        assert_eq!(f32_to_s24(0.0), 0);
    }
}
