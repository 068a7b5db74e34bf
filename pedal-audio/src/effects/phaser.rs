//! Four-stage phaser
//!
//! A cascade of first-order allpass sections whose break frequency is swept
//! by a triangle LFO, with feedback around the whole cascade. The allpass
//! coefficient is only recomputed when the LFO has moved by more than 1%.

use std::f32::consts::PI;

use super::Effect;
use crate::dsp::TriangleLfo;

const STAGES: usize = 4;

/// Feedback scale applied when the control is set
const FEEDBACK_SCALE: f32 = 0.95;

/// LFO movement that triggers a coefficient update
const RECALC_THRESHOLD: f32 = 0.01;

/// First-order allpass section: H(z) = (c + z^-1) / (1 + c z^-1)
#[derive(Debug, Clone, Copy, Default)]
struct AllpassStage {
    state: f32,
}

impl AllpassStage {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        let out = self.state + input * coeff;
        self.state = input - out * coeff;
        out
    }
}

pub struct Phaser {
    sample_rate: f32,
    stages_l: [AllpassStage; STAGES],
    stages_r: [AllpassStage; STAGES],
    feedback_l: f32,
    feedback_r: f32,
    lfo: TriangleLfo,
    cached_lfo: f32,
    cached_coeff: f32,
    // Parameters
    rate: f32,
    depth: f32,
    feedback: f32,
    freq: f32,
}

impl Phaser {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            stages_l: [AllpassStage::default(); STAGES],
            stages_r: [AllpassStage::default(); STAGES],
            feedback_l: 0.0,
            feedback_r: 0.0,
            lfo: TriangleLfo::default(),
            cached_lfo: 0.0,
            cached_coeff: 0.0,
            rate: 0.5,
            depth: 0.5,
            feedback: 0.5,
            freq: 2000.0,
        }
    }

    /// Set LFO rate in Hz (0.05 - 5.0)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.05, 5.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Set feedback (0.0 - 1.0), applied scaled by 0.95
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 1.0);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set sweep centre frequency in Hz (200 - 4000)
    pub fn set_freq(&mut self, freq: f32) {
        self.freq = freq.clamp(200.0, 4000.0);
    }

    pub fn freq(&self) -> f32 {
        self.freq
    }

    #[inline]
    fn coefficient(&self, lfo: f32) -> f32 {
        let mod_freq = self.freq * (0.5 + self.depth * lfo);
        let omega = 2.0 * PI * mod_freq / self.sample_rate;
        ((1.0 - omega) / (1.0 + omega)).clamp(-0.99, 0.99)
    }
}

impl Effect for Phaser {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let lfo_inc = self.rate / self.sample_rate;
        let fb = self.feedback * FEEDBACK_SCALE;

        for i in 0..out_l.len() {
            self.lfo.advance(lfo_inc);
            let lfo = self.lfo.value();

            if i == 0 || (lfo - self.cached_lfo).abs() > RECALC_THRESHOLD {
                self.cached_lfo = lfo;
                self.cached_coeff = self.coefficient(lfo);
            }
            let c = self.cached_coeff;

            let mut wet_l = in_l[i] + self.feedback_l * fb;
            for stage in self.stages_l.iter_mut() {
                wet_l = stage.process(wet_l, c);
            }
            self.feedback_l = wet_l;

            let mut wet_r = in_r[i] + self.feedback_r * fb;
            for stage in self.stages_r.iter_mut() {
                wet_r = stage.process(wet_r, c);
            }
            self.feedback_r = wet_r;

            out_l[i] = (in_l[i] + wet_l) * 0.5;
            out_r[i] = (in_r[i] + wet_r) * 0.5;
        }
    }

    fn reset(&mut self) {
        self.stages_l = [AllpassStage::default(); STAGES];
        self.stages_r = [AllpassStage::default(); STAGES];
        self.feedback_l = 0.0;
        self.feedback_r = 0.0;
        self.lfo = TriangleLfo::default();
        self.cached_lfo = 0.0;
        self.cached_coeff = 0.0;
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_rate(value),
            1 => self.set_depth(value),
            2 => self.set_feedback(value),
            3 => self.set_freq(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "PHASER"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allpass_stage_unity_dc() {
        // DC passes an allpass at unity gain
        let mut stage = AllpassStage::default();
        let mut y = 0.0;
        for _ in 0..2000 {
            y = stage.process(1.0, 0.5);
        }
        assert!((y - 1.0).abs() < 1e-4, "dc gain {}", y);
    }

    #[test]
    fn test_coefficient_clamped() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_freq(4000.0);
        phaser.set_depth(1.0);
        let c = phaser.coefficient(1.0);
        assert!(c.abs() <= 0.99);
        phaser.set_freq(200.0);
        phaser.set_depth(0.0);
        assert!(phaser.coefficient(0.0) <= 0.99);
    }

    #[test]
    fn test_phaser_stable_at_max_feedback() {
        let mut phaser = Phaser::new(48000.0);
        phaser.set_feedback(1.0);
        let input: Vec<f32> = (0..24000).map(|i| if i % 100 == 0 { 1.0 } else { 0.0 }).collect();
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        phaser.process(&input, &input, &mut l, &mut r);
        assert!(l.iter().all(|s| s.is_finite() && s.abs() < 50.0));
    }
}
