//! Shimmer reverb
//!
//! A hall-style comb/allpass tail with a slowly modulated tap read back
//! from a short delay. Mixing the swept tap under the tail gives a
//! chorused, pitch-smeared sheen without a real pitch shifter.

use super::{decay_feedback, tuned, AllpassFilter, CombBank};
use crate::dsp::{cubic_interp, linear_interp};
use crate::effects::Effect;
use std::f32::consts::PI;

const COMB_TUNINGS: [usize; 3] = [1024, 1600, 2200];
const ALLPASS_TUNING: usize = 431;
const ALLPASS_FEEDBACK: f32 = 0.7;
const COMB_DAMPING: f32 = 0.5;

const LFO_TABLE_SIZE: usize = 256;

/// Centre of the modulated tap in seconds
const TAP_BASE_S: f32 = 0.020;

/// Longest modulation depth in seconds
pub const MAX_DEPTH_S: f32 = 0.05;

/// Tail/tap blend
const TAIL_SHARE: f32 = 0.85;

pub struct ShimmerReverb {
    sample_rate: f32,
    combs_l: CombBank<3>,
    combs_r: CombBank<3>,
    allpass_l: AllpassFilter,
    allpass_r: AllpassFilter,
    tap_l: Vec<f32>,
    tap_r: Vec<f32>,
    tap_head: usize,
    lfo_table: [f32; LFO_TABLE_SIZE],
    /// LFO phase in table units (0..256)
    lfo_phase: f32,
    // Parameters
    time: f32,
    depth: f32,
    rate: f32,
    mix: f32,
}

impl ShimmerReverb {
    pub fn new(sample_rate: f32) -> Self {
        // Room for the deepest tap plus interpolation neighbours
        let tap_len = ((TAP_BASE_S + MAX_DEPTH_S) * sample_rate) as usize + 240;
        Self {
            sample_rate,
            combs_l: CombBank::new(&COMB_TUNINGS, sample_rate, false),
            combs_r: CombBank::new(&COMB_TUNINGS, sample_rate, true),
            allpass_l: AllpassFilter::new(tuned(ALLPASS_TUNING, sample_rate, false)),
            allpass_r: AllpassFilter::new(tuned(ALLPASS_TUNING, sample_rate, true)),
            tap_l: vec![0.0; tap_len],
            tap_r: vec![0.0; tap_len],
            tap_head: 0,
            lfo_table: std::array::from_fn(|i| {
                ((2.0 * PI * i as f32 / LFO_TABLE_SIZE as f32).sin() + 1.0) * 0.5
            }),
            lfo_phase: 0.0,
            time: 1.5,
            depth: 0.01,
            rate: 0.25,
            mix: 0.35,
        }
    }

    /// Set decay time in seconds (0.01 - 10)
    pub fn set_time(&mut self, time: f32) {
        self.time = time.clamp(0.01, 10.0);
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Set tap modulation depth in seconds (0 - 0.05)
    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, MAX_DEPTH_S);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Set modulation rate in Hz (0.01 - 5)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.01, 5.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Table lookup with linear interpolation, 0..1
    #[inline]
    fn lfo(&self) -> f32 {
        let idx0 = self.lfo_phase as usize % LFO_TABLE_SIZE;
        let idx1 = (idx0 + 1) % LFO_TABLE_SIZE;
        let frac = self.lfo_phase - self.lfo_phase.floor();
        linear_interp(self.lfo_table[idx0], self.lfo_table[idx1], frac)
    }

    /// Cubic read `delay` samples behind `head`; the fraction moves toward
    /// older samples
    #[inline]
    fn read_tap(buf: &[f32], head: usize, delay: f32) -> f32 {
        let len = buf.len();
        let int_delay = delay as usize;
        let frac = delay - int_delay as f32;
        let idx = (head + len - int_delay) % len;

        cubic_interp(
            buf[(idx + 1) % len],
            buf[idx],
            buf[(idx + len - 1) % len],
            buf[(idx + len - 2) % len],
            frac,
        )
    }
}

impl Effect for ShimmerReverb {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let feedback = decay_feedback(0.55, 0.4, 3.0, self.time, self.sample_rate);
        let lfo_inc = self.rate / self.sample_rate * LFO_TABLE_SIZE as f32;
        let dry = 1.0 - self.mix;

        for i in 0..out_l.len() {
            let (x_l, x_r) = (in_l[i], in_r[i]);

            let wet_l = self.combs_l.process(x_l, feedback, COMB_DAMPING);
            let wet_r = self.combs_r.process(x_r, feedback, COMB_DAMPING);
            let wet_l = self.allpass_l.process(wet_l, ALLPASS_FEEDBACK);
            let wet_r = self.allpass_r.process(wet_r, ALLPASS_FEEDBACK);

            self.tap_l[self.tap_head] = wet_l;
            self.tap_r[self.tap_head] = wet_r;

            let delay = (TAP_BASE_S + self.lfo() * self.depth) * self.sample_rate;
            let mod_l = Self::read_tap(&self.tap_l, self.tap_head, delay);
            let mod_r = Self::read_tap(&self.tap_r, self.tap_head, delay);

            self.lfo_phase += lfo_inc;
            if self.lfo_phase >= LFO_TABLE_SIZE as f32 {
                self.lfo_phase -= LFO_TABLE_SIZE as f32;
            }
            self.tap_head = (self.tap_head + 1) % self.tap_l.len();

            let combined_l = TAIL_SHARE * wet_l + (1.0 - TAIL_SHARE) * mod_l;
            let combined_r = TAIL_SHARE * wet_r + (1.0 - TAIL_SHARE) * mod_r;

            out_l[i] = dry * x_l + self.mix * combined_l;
            out_r[i] = dry * x_r + self.mix * combined_r;
        }
    }

    fn reset(&mut self) {
        self.combs_l.reset();
        self.combs_r.reset();
        self.allpass_l.reset();
        self.allpass_r.reset();
        self.tap_l.fill(0.0);
        self.tap_r.fill(0.0);
        self.tap_head = 0;
        self.lfo_phase = 0.0;
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_time(value),
            1 => self.set_depth(value),
            2 => self.set_rate(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "SHIMMERREVERB"
    }
}
