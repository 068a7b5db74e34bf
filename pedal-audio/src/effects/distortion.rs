//! Distortion: a harder gain stage (up to 20x) into the unclamped
//! rational saturator, then tone and level.

use super::Effect;
use crate::dsp::{soft_limit, OnePole};

pub struct Distortion {
    gain: f32,
    level: f32,
    tone: f32,
    tone_l: OnePole,
    tone_r: OnePole,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion {
    pub const MIN_GAIN: f32 = 1.0;
    pub const MAX_GAIN: f32 = 20.0;

    pub fn new() -> Self {
        Self {
            gain: 10.0,
            level: 0.5,
            tone: 0.5,
            tone_l: OnePole::new(),
            tone_r: OnePole::new(),
        }
    }

    /// Set gain (1.0 - 20.0)
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(Self::MIN_GAIN, Self::MAX_GAIN);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_tone(&mut self, tone: f32) {
        self.tone = tone.clamp(0.0, 1.0);
    }

    pub fn tone(&self) -> f32 {
        self.tone
    }
}

impl Effect for Distortion {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let coeff = 0.05 + self.tone * 0.35;
        for i in 0..out_l.len() {
            let l = soft_limit(in_l[i] * self.gain);
            let r = soft_limit(in_r[i] * self.gain);
            out_l[i] = self.tone_l.process(l, coeff) * self.level;
            out_r[i] = self.tone_r.process(r, coeff) * self.level;
        }
    }

    fn reset(&mut self) {
        self.tone_l.reset();
        self.tone_r.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_gain(value),
            1 => self.set_level(value),
            2 => self.set_tone(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "DISTORTION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distortion_gain_range() {
        let mut d = Distortion::new();
        d.set_gain(100.0);
        assert_eq!(d.gain(), 20.0);
        d.set_gain(-3.0);
        assert_eq!(d.gain(), 1.0);
    }

    #[test]
    fn test_harder_than_overdrive_curve() {
        // Same input into both saturators: the unclamped curve exceeds 1
        // for large arguments while the overdrive clamp holds at 1
        let x = 0.5 * 20.0;
        assert!(soft_limit(x) > crate::dsp::soft_clip(x));
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut d = Distortion::new();
        let zeros = vec![0.0; 512];
        let mut l = vec![1.0; 512];
        let mut r = vec![1.0; 512];
        d.process(&zeros, &zeros, &mut l, &mut r);
        assert!(l.iter().chain(r.iter()).all(|s| *s == 0.0));
    }
}
