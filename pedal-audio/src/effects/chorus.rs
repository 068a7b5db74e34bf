//! Stereo chorus
//!
//! 12 ms base delay swept by a triangle LFO. The right channel runs half
//! a cycle behind the left for width. Fractional reads go through a
//! Thiran allpass so the sweep stays free of zipper noise.

use super::modline::ModulatedLine;
use super::Effect;
use crate::dsp::TriangleLfo;

/// Buffer length in samples (~25 ms at 48 kHz)
const CHORUS_BUFFER: usize = 1200;

/// Base delay in milliseconds
const BASE_DELAY_MS: f32 = 12.0;

/// Stereo phase offset between channels, in cycles
const STEREO_OFFSET: f32 = 0.5;

pub struct Chorus {
    sample_rate: f32,
    line_l: ModulatedLine,
    line_r: ModulatedLine,
    write_idx: usize,
    lfo: TriangleLfo,
    // Parameters
    rate: f32,
    depth: f32,
    mix: f32,
}

impl Chorus {
    pub fn new(sample_rate: f32) -> Self {
        let len = ((CHORUS_BUFFER as f32) * sample_rate / 48000.0).ceil() as usize;
        Self {
            sample_rate,
            line_l: ModulatedLine::new(len),
            line_r: ModulatedLine::new(len),
            write_idx: 0,
            lfo: TriangleLfo::default(),
            rate: 1.0,
            depth: 0.5,
            mix: 0.5,
        }
    }

    /// Set LFO rate in Hz (0.05 - 5.0)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.05, 5.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Set sweep depth (0.0 - 1.0) as a fraction of the base delay
    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }
}

impl Effect for Chorus {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let base_delay = (BASE_DELAY_MS * 0.001 * self.sample_rate).floor();
        let mod_depth = (self.depth * base_delay).floor();
        let lfo_inc = self.rate / self.sample_rate;
        let len = self.line_l.len();

        for i in 0..out_l.len() {
            self.lfo.advance(lfo_inc);
            let lfo_l = self.lfo.value();
            let lfo_r = TriangleLfo::with_phase(self.lfo.phase() + STEREO_OFFSET).value();

            let delayed_l = self.line_l.read(self.write_idx, base_delay + mod_depth * lfo_l);
            let delayed_r = self.line_r.read(self.write_idx, base_delay + mod_depth * lfo_r);

            self.line_l.write(self.write_idx, in_l[i]);
            self.line_r.write(self.write_idx, in_r[i]);
            self.write_idx = (self.write_idx + 1) % len;

            out_l[i] = (1.0 - self.mix) * in_l[i] + self.mix * delayed_l;
            out_r[i] = (1.0 - self.mix) * in_r[i] + self.mix * delayed_r;
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
            2 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "CHORUS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chorus_parameter_clamping() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_rate(20.0);
        assert_eq!(chorus.rate(), 5.0);
        chorus.set_rate(0.0);
        assert_eq!(chorus.rate(), 0.05);
        chorus.set_depth(-1.0);
        assert_eq!(chorus.depth(), 0.0);
    }

    #[test]
    fn test_dry_mix_is_passthrough() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_mix(0.0);
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut l = vec![0.0; 512];
        let mut r = vec![0.0; 512];
        chorus.process(&input, &input, &mut l, &mut r);
        assert_eq!(l, input);
        assert_eq!(r, input);
    }

    #[test]
    fn test_stereo_channels_differ() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_mix(1.0);
        chorus.set_depth(1.0);
        let input: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let mut l = vec![0.0; 4096];
        let mut r = vec![0.0; 4096];
        chorus.process(&input, &input, &mut l, &mut r);

        let diff: f32 = l[2000..].iter().zip(&r[2000..]).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 0.1, "channels should be decorrelated, diff = {}", diff);
        assert!(l.iter().all(|s| s.is_finite()));
    }
}
