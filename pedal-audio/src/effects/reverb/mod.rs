//! Comb/allpass reverb family
//!
//! All four reverbs share the same building blocks: lowpass-damped
//! feedback combs in parallel, followed by Schroeder allpass diffusers.
//! Line lengths are tuned at 48 kHz and scaled for other rates; the right
//! channel is offset by a small spread so the two tails decorrelate.
//!
//! Comb feedback is always derived from the decay time and clamped below
//! [`MAX_FEEDBACK`].

mod hall;
mod plate;
mod shimmer;
mod spring;

pub use hall::HallReverb;
pub use plate::PlateReverb;
pub use shimmer::ShimmerReverb;
pub use spring::SpringReverb;

/// Tunings below are in samples at this rate
const TUNING_RATE: f32 = 48000.0;

/// Extra samples added to every right-channel line
const STEREO_SPREAD: usize = 23;

/// Upper bound on any comb feedback gain
pub const MAX_FEEDBACK: f32 = 0.995;

/// Maximum damping coefficient, keeps some tail at full damping
const DAMP_SCALE: f32 = 0.85;

/// Scale a 48 kHz tuning to `sample_rate`, optionally with stereo spread
fn tuned(len: usize, sample_rate: f32, right: bool) -> usize {
    let spread = if right { STEREO_SPREAD } else { 0 };
    (((len + spread) as f32 * sample_rate / TUNING_RATE) as usize).max(1)
}

/// Time-derived comb feedback: `(base + scale·min(1, t/knee))·exp(-3/(t·fs))`
fn decay_feedback(base: f32, scale: f32, knee: f32, time_s: f32, sample_rate: f32) -> f32 {
    let fb = (base + scale * (time_s / knee).min(1.0)) * (-3.0 / (time_s * sample_rate)).exp();
    fb.clamp(0.0, MAX_FEEDBACK)
}

/// Lowpass-feedback comb filter
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
            filter_store: 0.0,
        }
    }

    /// `damping` 0 leaves the loop unfiltered, 1 is the darkest setting
    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let output = self.buffer[self.index];
        let d = damping * DAMP_SCALE;

        self.filter_store = output * (1.0 - d) + self.filter_store * d;
        self.buffer[self.index] = input + self.filter_store * feedback;

        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_store = 0.0;
        self.index = 0;
    }
}

/// Schroeder allpass diffuser
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let stored = input + buffered * feedback;
        self.buffer[self.index] = stored;

        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        buffered - stored * feedback
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// Parallel combs averaged, one bank per channel
struct CombBank<const N: usize> {
    combs: [CombFilter; N],
}

impl<const N: usize> CombBank<N> {
    fn new(tunings: &[usize; N], sample_rate: f32, right: bool) -> Self {
        Self {
            combs: std::array::from_fn(|i| CombFilter::new(tuned(tunings[i], sample_rate, right))),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let sum: f32 = self
            .combs
            .iter_mut()
            .map(|c| c.process(input, feedback, damping))
            .sum();
        sum / N as f32
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_feedback_clamped() {
        for t in [0.01, 0.5, 3.0, 10.0] {
            let fb = decay_feedback(0.6, 0.35, 3.0, t, 48000.0);
            assert!(fb >= 0.0 && fb <= MAX_FEEDBACK, "t = {}: fb = {}", t, fb);
        }
        assert!(decay_feedback(0.9, 0.9, 1.0, 10.0, 48000.0) <= MAX_FEEDBACK);
    }

    #[test]
    fn test_stereo_lengths_differ() {
        let l = tuned(557, 48000.0, false);
        let r = tuned(557, 48000.0, true);
        assert_eq!(l, 557);
        assert_eq!(r, 580);
    }

    #[test]
    fn test_comb_delays_by_length() {
        let mut comb = CombFilter::new(10);
        let mut out = Vec::new();
        for n in 0..12 {
            let x = if n == 0 { 1.0 } else { 0.0 };
            out.push(comb.process(x, 0.0, 0.0));
        }
        assert_eq!(out[10], 1.0);
        assert!(out[..10].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_allpass_preserves_energy() {
        let mut ap = AllpassFilter::new(37);
        let mut energy = 0.0;
        for n in 0..20000 {
            let x = if n == 0 { 1.0 } else { 0.0 };
            let y = ap.process(x, 0.7);
            energy += y * y;
        }
        assert!((energy - 1.0).abs() < 1e-3, "energy = {}", energy);
    }
}
