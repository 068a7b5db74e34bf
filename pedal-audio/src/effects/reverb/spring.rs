//! Spring reverb: a dispersive allpass chain with a resonant tone shaper.

use super::{tuned, AllpassFilter, MAX_FEEDBACK};
use crate::dsp::OnePole;
use crate::effects::Effect;

const STAGES: usize = 5;
const ALLPASS_TUNINGS: [usize; STAGES] = [1021, 997, 1009, 983, 1013];

pub struct SpringReverb {
    sample_rate: f32,
    allpass_l: [AllpassFilter; STAGES],
    allpass_r: [AllpassFilter; STAGES],
    lowpass_l: OnePole,
    lowpass_r: OnePole,
    // Parameters
    tension: f32,
    decay: f32,
    tone: f32,
    mix: f32,
}

impl SpringReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            allpass_l: std::array::from_fn(|i| {
                AllpassFilter::new(tuned(ALLPASS_TUNINGS[i], sample_rate, false))
            }),
            allpass_r: std::array::from_fn(|i| {
                AllpassFilter::new(tuned(ALLPASS_TUNINGS[i], sample_rate, true))
            }),
            lowpass_l: OnePole::new(),
            lowpass_r: OnePole::new(),
            tension: 0.6,
            decay: 0.5,
            tone: 0.5,
            mix: 0.35,
        }
    }

    pub fn set_tension(&mut self, tension: f32) {
        self.tension = tension.clamp(0.0, 1.0);
    }

    pub fn tension(&self) -> f32 {
        self.tension
    }

    /// Set decay in seconds (0.01 - 5)
    pub fn set_decay(&mut self, decay: f32) {
        self.decay = decay.clamp(0.01, 5.0);
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn set_tone(&mut self, tone: f32) {
        self.tone = tone.clamp(0.0, 1.0);
    }

    pub fn tone(&self) -> f32 {
        self.tone
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }
}

impl Effect for SpringReverb {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let feedback = ((0.5 + 0.45 * self.tension)
            * (-3.0 / (self.decay * self.sample_rate)).exp())
        .min(MAX_FEEDBACK);
        let lp_coeff = 0.002 + 0.018 * (1.0 - self.tone);
        let dry = 1.0 - self.mix;

        for i in 0..out_l.len() {
            let (x_l, x_r) = (in_l[i], in_r[i]);
            let (mut wet_l, mut wet_r) = (x_l, x_r);

            for (n, (ap_l, ap_r)) in self
                .allpass_l
                .iter_mut()
                .zip(self.allpass_r.iter_mut())
                .enumerate()
            {
                let g = (0.7 + 0.05 * n as f32) * feedback;
                wet_l = ap_l.process(wet_l, g);
                wet_r = ap_r.process(wet_r, g);
            }

            // Subtracting part of the lowpass leaves the "boing" band
            let shaped_l = wet_l - 0.5 * self.lowpass_l.process(wet_l, lp_coeff);
            let shaped_r = wet_r - 0.5 * self.lowpass_r.process(wet_r, lp_coeff);

            out_l[i] = dry * x_l + self.mix * shaped_l;
            out_r[i] = dry * x_r + self.mix * shaped_r;
        }
    }

    fn reset(&mut self) {
        self.allpass_l.iter_mut().for_each(AllpassFilter::reset);
        self.allpass_r.iter_mut().for_each(AllpassFilter::reset);
        self.lowpass_l.reset();
        self.lowpass_r.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_tension(value),
            1 => self.set_decay(value),
            2 => self.set_tone(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "SPRINGREVERB"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spring_ranges() {
        let mut spring = SpringReverb::new(48000.0);
        spring.set_decay(60.0);
        assert_eq!(spring.decay(), 5.0);
        spring.set_tension(2.0);
        assert_eq!(spring.tension(), 1.0);
    }

    #[test]
    fn test_spring_rings_after_impulse() {
        let mut spring = SpringReverb::new(48000.0);
        spring.set_mix(1.0);
        let mut input = vec![0.0; 12000];
        input[0] = 1.0;
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        spring.process(&input, &input, &mut l, &mut r);
        let late: f32 = l[6000..].iter().map(|s| s.abs()).sum();
        assert!(late > 0.0);
        assert!(l.iter().all(|s| s.abs() < 2.0));
    }
}
