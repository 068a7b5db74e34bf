//! Envelope-controlled wah
//!
//! A peak follower drives the centre of a resonant band-pass between
//! 300 Hz and 2.5 kHz. Coefficients are only recomputed when the target
//! frequency moves by more than 5 Hz.

use super::Effect;
use crate::dsp::{Biquad, BiquadCoeffs};

const MIN_FREQ: f32 = 300.0;
const MAX_FREQ: f32 = 2500.0;
const SWEEP_RANGE: f32 = 2200.0;

/// Follower coefficients (per sample)
const ATTACK: f32 = 0.02;
const RELEASE: f32 = 0.001;

/// Frequency change that triggers a coefficient update
const RECALC_HZ: f32 = 5.0;

/// Per-channel follower, filter state and cached coefficients
#[derive(Debug, Clone, Copy, Default)]
struct WahChannel {
    envelope: f32,
    filter: Biquad,
    coeffs: BiquadCoeffs,
    cached_freq: f32,
}

impl WahChannel {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct AutoWah {
    sample_rate: f32,
    left: WahChannel,
    right: WahChannel,
    // Parameters
    wah: f32,
    level: f32,
    mix: f32,
    boost: f32,
}

impl AutoWah {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            left: WahChannel::default(),
            right: WahChannel::default(),
            wah: 0.5,
            level: 0.5,
            mix: 0.5,
            boost: 1.75,
        }
    }

    /// Set resonance amount (0.0 - 1.0), maps to Q 5..15
    pub fn set_wah(&mut self, wah: f32) {
        self.wah = wah.clamp(0.0, 1.0);
    }

    pub fn wah(&self) -> f32 {
        self.wah
    }

    /// Set envelope sensitivity (0.0 - 1.0)
    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Set wet output gain (0.5 - 3.0)
    pub fn set_boost(&mut self, boost: f32) {
        self.boost = boost.clamp(0.5, 3.0);
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    /// Current envelope-mapped centre frequency of the left channel
    pub fn center_freq(&self) -> f32 {
        self.left.cached_freq
    }

    #[inline]
    fn tick(&self, ch: &mut WahChannel, x: f32, first: bool, q: f32) -> f32 {
        let rectified = x.abs();
        let coeff = if rectified > ch.envelope { ATTACK } else { RELEASE };
        ch.envelope += coeff * (rectified - ch.envelope);

        let freq = (MIN_FREQ + ch.envelope * self.level * 3.0 * SWEEP_RANGE).clamp(MIN_FREQ, MAX_FREQ);
        if first || (freq - ch.cached_freq).abs() > RECALC_HZ {
            ch.cached_freq = freq;
            ch.coeffs = BiquadCoeffs::band_pass(freq, q, self.sample_rate);
        }

        let band = ch.filter.process(x, &ch.coeffs);
        x * (1.0 - self.mix) + band * self.mix * self.boost
    }
}

impl Effect for AutoWah {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let q = 5.0 + self.wah * 10.0;
        let mut left = self.left;
        let mut right = self.right;

        for i in 0..out_l.len() {
            out_l[i] = self.tick(&mut left, in_l[i], i == 0, q);
            out_r[i] = self.tick(&mut right, in_r[i], i == 0, q);
        }

        self.left = left;
        self.right = right;
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_wah(value),
            1 => self.set_level(value),
            2 => self.set_mix(value),
            3 => self.set_boost(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "AUTOWAH"
    }
}
