//! Tremolo: sine LFO amplitude modulation with independent depth and mix.

use super::Effect;
use crate::dsp::SineLfo;

pub struct Tremolo {
    sample_rate: f32,
    lfo: SineLfo,
    rate: f32,
    depth: f32,
    mix: f32,
}

impl Tremolo {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            lfo: SineLfo::default(),
            rate: 2.0,
            depth: 0.5,
            mix: 0.5,
        }
    }

    /// Set LFO rate in Hz (0.1 - 20.0)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.1, 20.0);
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

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }
}

impl Effect for Tremolo {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        for i in 0..out_l.len() {
            let gain = 1.0 - self.depth + self.depth * self.lfo.unipolar();
            let wet = gain * self.mix;
            let dry = 1.0 - self.mix;

            out_l[i] = in_l[i] * dry + in_l[i] * wet;
            out_r[i] = in_r[i] * dry + in_r[i] * wet;

            self.lfo.advance(self.rate, self.sample_rate);
        }
    }

    fn reset(&mut self) {
        self.lfo.reset();
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
        "TREMOLO"
    }
}
