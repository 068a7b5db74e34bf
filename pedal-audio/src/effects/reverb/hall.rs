//! Hall reverb: three damped combs, one diffuser and a pre-delay.

use super::{decay_feedback, tuned, AllpassFilter, CombBank};
use crate::effects::Effect;

const COMB_TUNINGS: [usize; 3] = [557, 677, 797];
const ALLPASS_TUNING: usize = 341;
const ALLPASS_FEEDBACK: f32 = 0.7;

/// Longest pre-delay in milliseconds
pub const MAX_PREDELAY_MS: f32 = 100.0;

/// Direct share of the wet path so a fully wet mix is never silent
const WET_DIRECT: f32 = 0.35;

/// Stereo pre-delay that passes the dry feed until enough history exists
struct PreDelay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_idx: usize,
    length: usize,
    filled: usize,
}

impl PreDelay {
    fn new(capacity: usize) -> Self {
        Self {
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_idx: 0,
            length: 0,
            filled: 0,
        }
    }

    fn set_length(&mut self, length: usize) {
        self.length = length.min(self.buffer_l.len() - 1);
        self.reset();
    }

    #[inline]
    fn process(&mut self, l: f32, r: f32) -> (f32, f32) {
        if self.length == 0 {
            self.filled = 0;
            return (l, r);
        }

        let cap = self.buffer_l.len();
        self.buffer_l[self.write_idx] = l;
        self.buffer_r[self.write_idx] = r;

        let out = if self.filled >= self.length {
            let read_idx = (self.write_idx + cap - self.length) % cap;
            (self.buffer_l[read_idx], self.buffer_r[read_idx])
        } else {
            self.filled += 1;
            (l, r)
        };

        self.write_idx = (self.write_idx + 1) % cap;
        out
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_idx = 0;
        self.filled = 0;
    }
}

pub struct HallReverb {
    sample_rate: f32,
    combs_l: CombBank<3>,
    combs_r: CombBank<3>,
    allpass_l: AllpassFilter,
    allpass_r: AllpassFilter,
    predelay: PreDelay,
    // Parameters
    time: f32,
    damping: f32,
    predelay_ms: f32,
    mix: f32,
}

impl HallReverb {
    pub fn new(sample_rate: f32) -> Self {
        let capacity = (MAX_PREDELAY_MS / 1000.0 * sample_rate) as usize + 1;
        let mut hall = Self {
            sample_rate,
            combs_l: CombBank::new(&COMB_TUNINGS, sample_rate, false),
            combs_r: CombBank::new(&COMB_TUNINGS, sample_rate, true),
            allpass_l: AllpassFilter::new(tuned(ALLPASS_TUNING, sample_rate, false)),
            allpass_r: AllpassFilter::new(tuned(ALLPASS_TUNING, sample_rate, true)),
            predelay: PreDelay::new(capacity),
            time: 3.0,
            damping: 0.5,
            predelay_ms: 0.0,
            mix: 0.5,
        };
        hall.set_predelay(20.0);
        hall
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

    /// Set pre-delay in milliseconds (0 - 100). Clears the pre-delay history.
    pub fn set_predelay(&mut self, ms: f32) {
        self.predelay_ms = ms.clamp(0.0, MAX_PREDELAY_MS);
        let length = (self.predelay_ms / 1000.0 * self.sample_rate) as usize;
        self.predelay.set_length(length);
    }

    pub fn predelay(&self) -> f32 {
        self.predelay_ms
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }
}

impl Effect for HallReverb {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let feedback = decay_feedback(0.6, 0.35, 3.0, self.time, self.sample_rate);
        let dry = 1.0 - self.mix;

        for i in 0..out_l.len() {
            let (x_l, x_r) = (in_l[i], in_r[i]);
            let (feed_l, feed_r) = self.predelay.process(x_l, x_r);

            let wet_l = self.combs_l.process(feed_l, feedback, self.damping);
            let wet_r = self.combs_r.process(feed_r, feedback, self.damping);
            let wet_l = self.allpass_l.process(wet_l, ALLPASS_FEEDBACK);
            let wet_r = self.allpass_r.process(wet_r, ALLPASS_FEEDBACK);

            let wet_l = WET_DIRECT * x_l + (1.0 - WET_DIRECT) * wet_l;
            let wet_r = WET_DIRECT * x_r + (1.0 - WET_DIRECT) * wet_r;

            out_l[i] = dry * x_l + self.mix * wet_l;
            out_r[i] = dry * x_r + self.mix * wet_r;
        }
    }

    fn reset(&mut self) {
        self.combs_l.reset();
        self.combs_r.reset();
        self.allpass_l.reset();
        self.allpass_r.reset();
        self.predelay.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_time(value),
            1 => self.set_damping(value),
            2 => self.set_predelay(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "HALLREVERB"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predelay_passes_dry_while_filling() {
        let mut pd = PreDelay::new(100);
        pd.set_length(10);
        for n in 0..10 {
            let (l, _) = pd.process(n as f32, 0.0);
            assert_eq!(l, n as f32, "sample {} should pass through", n);
        }
        let (l, _) = pd.process(10.0, 0.0);
        assert_eq!(l, 0.0);
        let (l, _) = pd.process(11.0, 0.0);
        assert_eq!(l, 1.0);
    }

    #[test]
    fn test_predelay_range() {
        let mut hall = HallReverb::new(48000.0);
        hall.set_predelay(500.0);
        assert_eq!(hall.predelay(), MAX_PREDELAY_MS);
        hall.set_time(0.0);
        assert_eq!(hall.time(), 0.01);
    }

    #[test]
    fn test_hall_produces_tail() {
        let mut hall = HallReverb::new(48000.0);
        hall.set_mix(1.0);
        let mut input = vec![0.0; 9600];
        input[0] = 1.0;
        let mut l = vec![0.0; 9600];
        let mut r = vec![0.0; 9600];
        hall.process(&input, &input, &mut l, &mut r);

        let tail: f32 = l[4000..].iter().map(|s| s.abs()).sum();
        assert!(tail > 0.01, "no reverb tail: {}", tail);
        assert_ne!(l[2000..4000], r[2000..4000]);
    }
}
