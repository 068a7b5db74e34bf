//! Plate reverb: dense allpass chain after the combs, lowpass tone on the tail.

use super::{decay_feedback, tuned, AllpassFilter, CombBank};
use crate::dsp::OnePole;
use crate::effects::Effect;

const COMB_TUNINGS: [usize; 3] = [1433, 1493, 1559];
const ALLPASS_TUNINGS: [usize; 3] = [577, 601, 619];

pub struct PlateReverb {
    sample_rate: f32,
    combs_l: CombBank<3>,
    combs_r: CombBank<3>,
    allpass_l: [AllpassFilter; 3],
    allpass_r: [AllpassFilter; 3],
    tone_l: OnePole,
    tone_r: OnePole,
    // Parameters
    time: f32,
    damping: f32,
    tone: f32,
    mix: f32,
}

impl PlateReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            combs_l: CombBank::new(&COMB_TUNINGS, sample_rate, false),
            combs_r: CombBank::new(&COMB_TUNINGS, sample_rate, true),
            allpass_l: std::array::from_fn(|i| {
                AllpassFilter::new(tuned(ALLPASS_TUNINGS[i], sample_rate, false))
            }),
            allpass_r: std::array::from_fn(|i| {
                AllpassFilter::new(tuned(ALLPASS_TUNINGS[i], sample_rate, true))
            }),
            tone_l: OnePole::new(),
            tone_r: OnePole::new(),
            time: 1.0,
            damping: 0.5,
            tone: 0.5,
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

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping.clamp(0.0, 1.0);
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set tail brightness (0.0 dark - 1.0 bright)
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

impl Effect for PlateReverb {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let feedback = decay_feedback(0.55, 0.4, 2.0, self.time, self.sample_rate);
        let tone_coeff = 0.2 + 0.7 * self.tone;
        let dry = 1.0 - self.mix;

        for i in 0..out_l.len() {
            let (x_l, x_r) = (in_l[i], in_r[i]);

            let mut wet_l = self.combs_l.process(x_l, feedback, self.damping);
            let mut wet_r = self.combs_r.process(x_r, feedback, self.damping);

            for (n, (ap_l, ap_r)) in self
                .allpass_l
                .iter_mut()
                .zip(self.allpass_r.iter_mut())
                .enumerate()
            {
                let g = 0.75 + 0.05 * n as f32;
                wet_l = ap_l.process(wet_l, g);
                wet_r = ap_r.process(wet_r, g);
            }

            let wet_l = self.tone_l.process(wet_l, tone_coeff);
            let wet_r = self.tone_r.process(wet_r, tone_coeff);

            out_l[i] = dry * x_l + self.mix * wet_l;
            out_r[i] = dry * x_r + self.mix * wet_r;
        }
    }

    fn reset(&mut self) {
        self.combs_l.reset();
        self.combs_r.reset();
        self.allpass_l.iter_mut().for_each(AllpassFilter::reset);
        self.allpass_r.iter_mut().for_each(AllpassFilter::reset);
        self.tone_l.reset();
        self.tone_r.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_time(value),
            1 => self.set_damping(value),
            2 => self.set_tone(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "PLATEREVERB"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail_energy(tone: f32) -> f32 {
        let mut plate = PlateReverb::new(48000.0);
        plate.set_mix(1.0);
        plate.set_tone(tone);
        let input: Vec<f32> = (0..4800).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        plate.process(&input, &input, &mut l, &mut r);
        l.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_tone_darkens_tail() {
        // Nyquist-rate input: a darker tone must pass less of it
        assert!(tail_energy(0.0) < tail_energy(1.0));
    }

    #[test]
    fn test_plate_clamps_time() {
        let mut plate = PlateReverb::new(48000.0);
        plate.set_time(100.0);
        assert_eq!(plate.time(), 10.0);
    }
}
