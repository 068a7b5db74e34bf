//! Stereo flanger
//!
//! Features:
//! - Triangle LFO sweep around a 0.1 - 7 ms base delay
//! - Thiran allpass fractional read
//! - Feedback path (capped at 0.97)
//! - Right channel offset by half an LFO cycle

use super::modline::ModulatedLine;
use super::Effect;
use crate::dsp::TriangleLfo;

/// Buffer length in samples (20 ms at 48 kHz)
const FLANGER_BUFFER: usize = 960;

/// Feedback scale applied when the control is set
const FEEDBACK_SCALE: f32 = 0.97;

/// Stereo phase offset between channels, in cycles
const STEREO_OFFSET: f32 = 0.5;

pub struct Flanger {
    sample_rate: f32,
    line_l: ModulatedLine,
    line_r: ModulatedLine,
    write_idx: usize,
    lfo: TriangleLfo,
    // Parameters
    rate: f32,
    depth: f32,
    /// Feedback control value (0.0 - 1.0) before scaling
    feedback: f32,
    delay_ms: f32,
}

impl Flanger {
    pub fn new(sample_rate: f32) -> Self {
        let len = ((FLANGER_BUFFER as f32) * sample_rate / 48000.0).ceil() as usize;
        Self {
            sample_rate,
            line_l: ModulatedLine::new(len),
            line_r: ModulatedLine::new(len),
            write_idx: 0,
            lfo: TriangleLfo::default(),
            rate: 0.5,
            depth: 0.5,
            feedback: 0.5,
            delay_ms: 5.0,
        }
    }

    /// Set LFO rate in Hz (0.05 - 5.0)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.05, 5.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Set sweep depth (0.0 - 1.0)
    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Set feedback (0.0 - 1.0), applied scaled by 0.97
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 1.0);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set base delay in milliseconds (0.1 - 7.0)
    pub fn set_delay_ms(&mut self, delay_ms: f32) {
        self.delay_ms = delay_ms.clamp(0.1, 7.0);
    }

    pub fn delay_ms(&self) -> f32 {
        self.delay_ms
    }
}

impl Effect for Flanger {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let base_delay = self.delay_ms * 0.001 * self.sample_rate;
        let lfo_amp = self.depth * base_delay;
        let lfo_inc = self.rate / self.sample_rate;
        let fb = self.feedback * FEEDBACK_SCALE;
        let len = self.line_l.len();

        for i in 0..out_l.len() {
            self.lfo.advance(lfo_inc);
            let lfo_l = self.lfo.value();
            let lfo_r = TriangleLfo::with_phase(self.lfo.phase() + STEREO_OFFSET).value();

            let delayed_l = self.line_l.read(self.write_idx, base_delay + lfo_l * lfo_amp);
            let delayed_r = self.line_r.read(self.write_idx, base_delay + lfo_r * lfo_amp);

            self.line_l.write(self.write_idx, in_l[i] + delayed_l * fb);
            self.line_r.write(self.write_idx, in_r[i] + delayed_r * fb);
            self.write_idx = (self.write_idx + 1) % len;

            // Equal dry/wet for the comb notches
            out_l[i] = (in_l[i] + delayed_l) * 0.5;
            out_r[i] = (in_r[i] + delayed_r) * 0.5;
        }
    }

    fn reset(&mut self) {
        self.line_l.reset();
        self.line_r.reset();
        self.write_idx = 0;
        self.lfo = TriangleLfo::default();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_rate(value),
            1 => self.set_depth(value),
            2 => self.set_feedback(value),
            3 => self.set_delay_ms(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "FLANGER"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flanger_creation() {
        let flanger = Flanger::new(48000.0);
        assert_eq!(flanger.delay_ms(), 5.0);
        assert_eq!(flanger.feedback(), 0.5);
    }

    #[test]
    fn test_flanger_parameter_clamping() {
        let mut flanger = Flanger::new(48000.0);
        flanger.set_delay_ms(50.0);
        assert_eq!(flanger.delay_ms(), 7.0);
        flanger.set_delay_ms(0.0);
        assert_eq!(flanger.delay_ms(), 0.1);
        flanger.set_feedback(3.0);
        assert_eq!(flanger.feedback(), 1.0);
    }

    #[test]
    fn test_max_feedback_stays_bounded() {
        let mut flanger = Flanger::new(48000.0);
        flanger.set_feedback(1.0);
        flanger.set_depth(1.0);
        flanger.set_delay_ms(7.0);
        let input: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.02).sin() * 0.5).collect();
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        flanger.process(&input, &input, &mut l, &mut r);
        let peak = l.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak.is_finite() && peak < 20.0, "peak = {}", peak);
    }
}
