//! Feed-forward compressor
//!
//! Features:
//! - Peak detection in the dB domain with separate attack/release
//! - Gain computed from threshold/ratio and smoothed before it is applied
//! - Optional automatic makeup gain
//! - Soft-clip safety stage on the output

use super::Effect;
use crate::dsp::{db_to_gain, soft_clip, time_coeff};

/// Floor of the detector in dB
const DETECTOR_FLOOR_DB: f32 = -96.0;

/// Smoothing applied to the computed gain (per sample)
const GAIN_SMOOTH: f32 = 0.05;

/// Auto makeup cap in dB
const MAX_MAKEUP_DB: f32 = 18.0;

/// Headroom for the output safety clipper
const LIMITER_DRIVE: f32 = 0.9;

#[inline]
fn lin_to_db(x: f32) -> f32 {
    if x < 1e-6 {
        DETECTOR_FLOOR_DB
    } else {
        20.0 * x.log10()
    }
}

/// Detector and gain state for one channel
#[derive(Debug, Clone, Copy)]
struct Detector {
    envelope_db: f32,
    gain: f32,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            envelope_db: DETECTOR_FLOOR_DB,
            gain: 1.0,
        }
    }
}

pub struct Compressor {
    sample_rate: f32,
    left: Detector,
    right: Detector,
    // Parameters
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    auto_makeup: bool,
    // Derived
    attack_coeff: f32,
    release_coeff: f32,
    makeup: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            sample_rate,
            left: Detector::default(),
            right: Detector::default(),
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 100.0,
            auto_makeup: true,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup: 1.0,
        };
        comp.update_coefficients();
        comp
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_coeff(self.attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(self.release_ms, self.sample_rate);
        self.makeup = if self.auto_makeup {
            db_to_gain((-self.threshold_db * 0.6).clamp(0.0, MAX_MAKEUP_DB))
        } else {
            1.0
        };
    }

    /// Set threshold in dB (-60 - 0)
    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(-60.0, 0.0);
        self.update_coefficients();
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Set ratio (1:1 - 20:1)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(1.0, 20.0);
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set attack in milliseconds (0.1 - 100)
    pub fn set_attack(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(0.1, 100.0);
        self.update_coefficients();
    }

    pub fn attack(&self) -> f32 {
        self.attack_ms
    }

    /// Set release in milliseconds (10 - 1000)
    pub fn set_release(&mut self, ms: f32) {
        self.release_ms = ms.clamp(10.0, 1000.0);
        self.update_coefficients();
    }

    pub fn release(&self) -> f32 {
        self.release_ms
    }

    pub fn set_auto_makeup(&mut self, enabled: bool) {
        self.auto_makeup = enabled;
        self.update_coefficients();
    }

    pub fn auto_makeup(&self) -> bool {
        self.auto_makeup
    }

    /// Current gain reduction in dB (positive number)
    pub fn gain_reduction_db(&self) -> f32 {
        -lin_to_db(self.left.gain.min(self.right.gain))
    }

    #[inline]
    fn tick(&self, det: &mut Detector, x: f32) -> f32 {
        let level_db = lin_to_db(x.abs());
        let coeff = if level_db > det.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        det.envelope_db += coeff * (level_db - det.envelope_db);

        let over = det.envelope_db - self.threshold_db;
        let reduction_db = if over > 0.0 {
            over * (self.ratio - 1.0) / self.ratio
        } else {
            0.0
        };
        det.gain += GAIN_SMOOTH * (db_to_gain(-reduction_db) - det.gain);

        let y = x * det.gain * self.makeup;
        soft_clip(y * LIMITER_DRIVE) / LIMITER_DRIVE
    }
}

impl Effect for Compressor {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let mut left = self.left;
        let mut right = self.right;
        for i in 0..out_l.len() {
            out_l[i] = self.tick(&mut left, in_l[i]);
            out_r[i] = self.tick(&mut right, in_r[i]);
        }
        self.left = left;
        self.right = right;
    }

    fn reset(&mut self) {
        self.left = Detector::default();
        self.right = Detector::default();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_threshold(value),
            1 => self.set_ratio(value),
            2 => self.set_attack(value),
            3 => self.set_release(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "COMPRESSOR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(comp: &mut Compressor, level: f32, len: usize) -> f32 {
        let input = vec![level; len];
        let mut l = vec![0.0; len];
        let mut r = vec![0.0; len];
        comp.process(&input, &input, &mut l, &mut r);
        l[len - 1]
    }

    #[test]
    fn test_parameter_clamping() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold(10.0);
        assert_eq!(comp.threshold(), 0.0);
        comp.set_ratio(100.0);
        assert_eq!(comp.ratio(), 20.0);
        comp.set_attack(0.0);
        assert_eq!(comp.attack(), 0.1);
        comp.set_release(5000.0);
        assert_eq!(comp.release(), 1000.0);
    }

    #[test]
    fn test_below_threshold_unity() {
        let mut comp = Compressor::new(48000.0);
        comp.set_auto_makeup(false);
        comp.set_threshold(-20.0);
        let out = run(&mut comp, 0.01, 24000);
        assert!((out - 0.01).abs() < 1e-4, "expected unity, got {}", out / 0.01);
        assert!(comp.gain_reduction_db() < 0.01);
    }

    #[test]
    fn test_loud_signal_compression() {
        let mut comp = Compressor::new(48000.0);
        comp.set_auto_makeup(false);
        comp.set_threshold(-40.0);
        comp.set_ratio(4.0);

        // 0.1 is -20 dB: 20 dB over, expect 15 dB of reduction
        run(&mut comp, 0.1, 48000);
        let gr = comp.gain_reduction_db();
        assert!((gr - 15.0).abs() < 0.1, "gain reduction = {}", gr);
    }

    #[test]
    fn test_auto_makeup_capped() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold(-60.0);
        assert!((comp.makeup - db_to_gain(18.0)).abs() < 1e-4);
        comp.set_auto_makeup(false);
        assert_eq!(comp.makeup, 1.0);
    }
}
