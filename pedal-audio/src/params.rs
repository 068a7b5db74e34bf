//! Parameter metadata and slider conversion
//!
//! The control surface works in integer slider positions (0 - 100). The
//! chain stores natural units (ms, Hz, dB, ratios). This module owns the
//! static description of every slot and both directions of the mapping.

use crate::effects::{EffectType, MAX_PARAMS};

/// Highest slider position
pub const SLIDER_MAX: u8 = 100;

/// Static description of one parameter slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub min: f32,
    pub max: f32,
    pub unit: &'static str,
    pub name: &'static str,
}

impl ParamInfo {
    const fn new(min: f32, max: f32, unit: &'static str, name: &'static str) -> Self {
        Self { min, max, unit, name }
    }

    /// Slot the effect does not consume
    pub const UNUSED: ParamInfo = ParamInfo::new(0.0, 0.0, "", "");

    pub fn is_used(&self) -> bool {
        !self.name.is_empty()
    }
}

const fn pct(name: &'static str) -> ParamInfo {
    ParamInfo::new(0.0, 1.0, "%", name)
}

const U: ParamInfo = ParamInfo::UNUSED;

static PARAM_TABLE: [[ParamInfo; MAX_PARAMS]; EffectType::COUNT] = [
    // Delay
    [
        ParamInfo::new(0.0, 800.0, "ms", "Time"),
        pct("Feedback"),
        pct("Tone"),
        pct("Mix"),
    ],
    // Overdrive
    [ParamInfo::new(1.0, 10.0, "", "Drive"), pct("Level"), pct("Tone"), U],
    // Chorus
    [ParamInfo::new(0.05, 5.0, "Hz", "Rate"), pct("Depth"), pct("Mix"), U],
    // Tremolo
    [ParamInfo::new(0.1, 20.0, "Hz", "Rate"), pct("Depth"), pct("Mix"), U],
    // Flanger
    [
        ParamInfo::new(0.05, 5.0, "Hz", "Rate"),
        pct("Depth"),
        pct("Feedback"),
        ParamInfo::new(0.1, 7.0, "ms", "Delay"),
    ],
    // Phaser
    [
        ParamInfo::new(0.05, 5.0, "Hz", "Rate"),
        pct("Depth"),
        pct("Feedback"),
        ParamInfo::new(200.0, 4000.0, "Hz", "Freq"),
    ],
    // Distortion
    [ParamInfo::new(1.0, 20.0, "", "Gain"), pct("Level"), pct("Tone"), U],
    // AutoWah
    [
        pct("Wah"),
        pct("Level"),
        pct("Mix"),
        ParamInfo::new(0.5, 3.0, "", "Output"),
    ],
    // Compressor
    [
        ParamInfo::new(-60.0, 0.0, "dB", "Amount"),
        ParamInfo::new(1.0, 20.0, ":1", "Ratio"),
        ParamInfo::new(0.1, 100.0, "ms", "Attack"),
        ParamInfo::new(10.0, 1000.0, "ms", "Release"),
    ],
    // Hall
    [
        ParamInfo::new(0.01, 10.0, "s", "Time"),
        pct("Damping"),
        ParamInfo::new(0.0, 100.0, "ms", "PreDelay"),
        pct("Mix"),
    ],
    // Plate
    [
        ParamInfo::new(0.01, 10.0, "s", "Time"),
        pct("Damping"),
        pct("Tone"),
        pct("Mix"),
    ],
    // Spring
    [
        pct("Tension"),
        ParamInfo::new(0.01, 5.0, "s", "Decay"),
        pct("Tone"),
        pct("Mix"),
    ],
    // Shimmer
    [
        ParamInfo::new(0.01, 10.0, "s", "Time"),
        ParamInfo::new(0.0, 0.05, "s", "Depth"),
        ParamInfo::new(0.01, 5.0, "Hz", "Rate"),
        pct("Mix"),
    ],
];

/// Metadata for slot `index` of `ty`; out-of-range slots read as unused
pub fn param_info(ty: EffectType, index: usize) -> &'static ParamInfo {
    PARAM_TABLE[ty.index()]
        .get(index)
        .unwrap_or(&ParamInfo::UNUSED)
}

/// Convert a slider position (0 - 100) to the natural unit for a slot
pub fn slider_to_param(ty: EffectType, index: usize, slider: u8) -> f32 {
    let n = slider.min(SLIDER_MAX) as f32 / SLIDER_MAX as f32;

    match (ty, index) {
        (EffectType::Delay, 0) => 800.0 * n,
        (EffectType::Overdrive, 0) => 1.0 + 9.0 * n,
        (EffectType::Chorus, 0) | (EffectType::Flanger, 0) | (EffectType::Phaser, 0) => {
            0.05 + 4.95 * n
        }
        (EffectType::Tremolo, 0) => 0.1 + 19.9 * n,
        (EffectType::Flanger, 3) => 0.1 + 6.9 * n,
        (EffectType::Phaser, 3) => 200.0 + 3800.0 * n,
        (EffectType::Distortion, 0) => 1.0 + 19.0 * n,
        (EffectType::AutoWah, 3) => 0.5 + 2.5 * n,
        // Amount: further right means a lower threshold
        (EffectType::Compressor, 0) => -60.0 * n,
        (EffectType::Compressor, 1) => 1.0 + 19.0 * n,
        (EffectType::Compressor, 2) => 0.1 + 99.9 * n * n,
        (EffectType::Compressor, 3) => 10.0 + 990.0 * n * n,
        (EffectType::HallReverb, 0)
        | (EffectType::PlateReverb, 0)
        | (EffectType::ShimmerReverb, 0) => 0.01 + 9.99 * n,
        (EffectType::HallReverb, 2) => 100.0 * n,
        (EffectType::SpringReverb, 1) => 0.01 + 4.99 * n,
        (EffectType::ShimmerReverb, 1) => 0.05 * n,
        (EffectType::ShimmerReverb, 2) => 0.01 + 4.99 * n,
        _ if param_info(ty, index).is_used() => n,
        _ => 0.0,
    }
}

/// Best-fit slider position for a natural-unit value.
///
/// Linear search over all 101 positions; only called on focus changes.
pub fn param_to_slider(ty: EffectType, index: usize, value: f32) -> u8 {
    let mut best = 0;
    let mut best_diff = f32::MAX;

    for slider in 0..=SLIDER_MAX {
        let diff = (slider_to_param(ty, index, slider) - value).abs();
        if diff < best_diff {
            best_diff = diff;
            best = slider;
        }
    }
    best
}

/// Display string for a natural-unit value, e.g. `"1.2kHz"`, `"35%"`, `"4.0:1"`
pub fn format_param_value(ty: EffectType, index: usize, value: f32) -> String {
    let info = param_info(ty, index);
    if !info.is_used() {
        return "--".to_string();
    }

    match info.unit {
        "Hz" if value >= 1000.0 => format!("{:.1}kHz", value / 1000.0),
        "Hz" if value < 10.0 => format!("{:.2}Hz", value),
        "Hz" => format!("{:.0}Hz", value),
        "%" => format!("{:.0}%", value * 100.0),
        "ms" if value >= 1000.0 => format!("{:.2}s", value / 1000.0),
        "ms" if value < 10.0 => format!("{:.1}ms", value),
        "ms" => format!("{:.0}ms", value),
        "s" if value < 0.1 => format!("{:.0}ms", value * 1000.0),
        "s" => format!("{:.2}s", value),
        ":1" => format!("{:.1}:1", value),
        "dB" => format!("{:.1}dB", value),
        _ if value < 10.0 => format!("{:.2}", value),
        _ => format!("{:.1}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slider_endpoints_match_table() {
        for ty in EffectType::ALL {
            for idx in 0..MAX_PARAMS {
                let info = param_info(ty, idx);
                if !info.is_used() {
                    assert_eq!(slider_to_param(ty, idx, 50), 0.0);
                    continue;
                }
                let lo = slider_to_param(ty, idx, 0);
                let hi = slider_to_param(ty, idx, SLIDER_MAX);
                // Compressor amount runs from max down to min
                let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
                assert!((lo - info.min).abs() < 1e-4, "{} slot {} min {}", ty, idx, lo);
                assert!((hi - info.max).abs() < 1e-3, "{} slot {} max {}", ty, idx, hi);
            }
        }
    }

    #[test]
    fn test_slider_roundtrip() {
        for ty in EffectType::ALL {
            for idx in 0..MAX_PARAMS {
                for slider in 0..=SLIDER_MAX {
                    let v = slider_to_param(ty, idx, slider);
                    let back = slider_to_param(ty, idx, param_to_slider(ty, idx, v));
                    assert!(
                        (back - v).abs() < 1e-6,
                        "{} slot {} slider {}: {} -> {}",
                        ty,
                        idx,
                        slider,
                        v,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn test_slider_clamped_above_100() {
        assert_eq!(
            slider_to_param(EffectType::Delay, 0, 250),
            slider_to_param(EffectType::Delay, 0, 100)
        );
    }

    #[test]
    fn test_compressor_curves() {
        assert_eq!(slider_to_param(EffectType::Compressor, 0, 0), 0.0);
        assert_eq!(slider_to_param(EffectType::Compressor, 0, 100), -60.0);
        // Squared curve: half travel is a quarter of the range
        let half = slider_to_param(EffectType::Compressor, 2, 50);
        assert!((half - (0.1 + 99.9 * 0.25)).abs() < 1e-4);
    }

    #[test]
    fn test_format_param_value() {
        assert_eq!(format_param_value(EffectType::Phaser, 3, 2000.0), "2.0kHz");
        assert_eq!(format_param_value(EffectType::Chorus, 0, 1.5), "1.50Hz");
        assert_eq!(format_param_value(EffectType::Delay, 3, 0.3), "30%");
        assert_eq!(format_param_value(EffectType::Delay, 0, 350.0), "350ms");
        assert_eq!(format_param_value(EffectType::Compressor, 3, 1000.0), "1.00s");
        assert_eq!(format_param_value(EffectType::Compressor, 1, 4.0), "4.0:1");
        assert_eq!(format_param_value(EffectType::Overdrive, 0, 5.0), "5.00");
        assert_eq!(format_param_value(EffectType::Distortion, 0, 15.0), "15.0");
        assert_eq!(format_param_value(EffectType::Overdrive, 3, 0.0), "--");
        assert_eq!(format_param_value(EffectType::HallReverb, 0, 3.0), "3.00s");
    }
}
