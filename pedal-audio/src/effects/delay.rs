//! Digital delay with a filtered feedback path.
//!
//! Features:
//! - Up to 800 ms per channel (stereo interleaved ring buffer)
//! - Linear fractional read
//! - One-pole lowpass "tone" inside the feedback loop
//! - Exponentially smoothed delay-time changes (~20 ms) so sweeping the
//!   time control doesn't pitch-shift the repeats

use super::Effect;
use crate::dsp::OnePole;

/// Maximum delay time in milliseconds
pub const MAX_DELAY_MS: f32 = 800.0;

/// Stereo delay effect
pub struct Delay {
    sample_rate: f32,
    /// Delay buffer (stereo interleaved: L,R,L,R,...)
    buffer: Vec<f32>,
    /// Buffer length in stereo frames
    buffer_frames: usize,
    /// Write position (in frames, not samples)
    write_pos: usize,
    /// Smoothed delay in fractional frames
    delay_samples: f32,
    /// Target delay (for smoothing)
    target_delay: f32,
    /// Time changes jump straight to target until the first processed block
    snap_next: bool,
    // Parameters
    time_ms: f32,
    feedback: f32,
    tone: f32,
    mix: f32,
    // Feedback tone filters
    tone_l: OnePole,
    tone_r: OnePole,
}

impl Delay {
    /// Per-sample smoothing step for delay time
    const TIME_SMOOTH: f32 = 0.001;

    /// Feedback is capped below unity so repeats always die out
    pub const MAX_FEEDBACK: f32 = 0.98;

    /// Create a new delay effect
    pub fn new(sample_rate: f32) -> Self {
        let buffer_frames = (MAX_DELAY_MS / 1000.0 * sample_rate) as usize;

        let mut delay = Self {
            sample_rate,
            buffer: vec![0.0; buffer_frames * 2],
            buffer_frames,
            write_pos: 0,
            delay_samples: 0.0,
            target_delay: 0.0,
            snap_next: true,
            time_ms: 100.0,
            feedback: 0.5,
            tone: 0.7,
            mix: 0.3,
            tone_l: OnePole::new(),
            tone_r: OnePole::new(),
        };
        delay.set_time_ms(100.0);
        delay
    }

    /// Set delay time in milliseconds (0 - 800)
    pub fn set_time_ms(&mut self, ms: f32) {
        self.time_ms = ms.clamp(0.0, MAX_DELAY_MS);
        let max_frames = (self.buffer_frames - 2) as f32;
        self.target_delay = (self.time_ms / 1000.0 * self.sample_rate).clamp(1.0, max_frames);
        if self.snap_next {
            self.delay_samples = self.target_delay;
        }
    }

    /// Get delay time in milliseconds
    pub fn time_ms(&self) -> f32 {
        self.time_ms
    }

    /// Current (smoothed) delay in frames
    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }

    /// Set feedback amount (0.0 - 0.98)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, Self::MAX_FEEDBACK);
    }

    /// Get feedback amount
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set feedback tone (0.0 dark - 1.0 bright)
    pub fn set_tone(&mut self, tone: f32) {
        self.tone = tone.clamp(0.0, 1.0);
    }

    pub fn tone(&self) -> f32 {
        self.tone
    }

    /// Set wet/dry mix (0.0 = dry, 1.0 = wet)
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Get wet/dry mix
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Linear interpolated read `delay_frames` behind the write head
    #[inline]
    fn read_interpolated(&self, delay_frames: f32) -> (f32, f32) {
        let int_delay = delay_frames as usize;
        let frac = delay_frames - int_delay as f32;

        let pos0 = (self.write_pos + self.buffer_frames - int_delay) % self.buffer_frames;
        let pos1 = if pos0 == 0 {
            self.buffer_frames - 1
        } else {
            pos0 - 1
        };

        let (i0, i1) = (pos0 * 2, pos1 * 2);
        let l = self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac;
        let r = self.buffer[i0 + 1] * (1.0 - frac) + self.buffer[i1 + 1] * frac;
        (l, r)
    }
}

impl Effect for Delay {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let tone_coeff = 0.05 + self.tone * 0.85;
        let dry = 1.0 - self.mix;
        self.snap_next = false;

        for i in 0..out_l.len() {
            let (x_l, x_r) = (in_l[i], in_r[i]);

            self.delay_samples += Self::TIME_SMOOTH * (self.target_delay - self.delay_samples);

            let (delayed_l, delayed_r) = self.read_interpolated(self.delay_samples);

            let fb_l = self.tone_l.process(delayed_l, tone_coeff);
            let fb_r = self.tone_r.process(delayed_r, tone_coeff);

            let write_idx = self.write_pos * 2;
            self.buffer[write_idx] = x_l + fb_l * self.feedback;
            self.buffer[write_idx + 1] = x_r + fb_r * self.feedback;
            self.write_pos = (self.write_pos + 1) % self.buffer_frames;

            out_l[i] = dry * x_l + self.mix * delayed_l;
            out_r[i] = dry * x_r + self.mix * delayed_r;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.tone_l.reset();
        self.tone_r.reset();
        self.snap_next = true;
        self.delay_samples = self.target_delay;
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_time_ms(value),
            1 => self.set_feedback(value),
            2 => self.set_tone(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "DELAY"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    #[test]
    fn test_integer_delay_roundtrip() {
        let mut delay = Delay::new(48000.0);
        delay.set_time_ms(10.0); // 480 samples
        delay.set_feedback(0.0);
        delay.set_mix(0.5);

        let input: Vec<f32> = (0..2048).map(|i| ((i * 7919) % 200) as f32 / 200.0 - 0.5).collect();
        let mut out_l = vec![0.0; input.len()];
        let mut out_r = vec![0.0; input.len()];
        delay.process(&input, &input, &mut out_l, &mut out_r);

        for n in 480..input.len() {
            let expected = 0.5 * input[n] + 0.5 * input[n - 480];
            assert!(
                (out_l[n] - expected).abs() < 1e-5,
                "sample {}: expected {}, got {}",
                n,
                expected,
                out_l[n]
            );
        }
    }

    #[test]
    fn test_first_repeat_position() {
        let mut delay = Delay::new(48000.0);
        let input = impulse(6000);
        let mut out_l = vec![0.0; 6000];
        let mut out_r = vec![0.0; 6000];
        delay.process(&input, &input, &mut out_l, &mut out_r);

        assert!((out_l[0] - 0.7).abs() < 1e-6, "dry at 0: {}", out_l[0]);
        assert!((out_l[4800] - 0.3).abs() < 1e-6, "wet at 4800: {}", out_l[4800]);
        assert!(out_l[4799].abs() < 1e-6);
    }

    #[test]
    fn test_feedback_capped() {
        let mut delay = Delay::new(48000.0);
        delay.set_feedback(5.0);
        assert_eq!(delay.feedback(), Delay::MAX_FEEDBACK);
        delay.set_time_ms(2000.0);
        assert_eq!(delay.time_ms(), MAX_DELAY_MS);
    }

    #[test]
    fn test_time_change_is_smoothed() {
        let mut delay = Delay::new(48000.0);
        let silence = vec![0.0; 256];
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        delay.process(&silence, &silence, &mut l, &mut r);

        delay.set_time_ms(200.0);
        delay.process(&silence, &silence, &mut l, &mut r);

        let after = delay.delay_samples();
        assert!(after > 4800.0 && after < 9600.0, "delay jumped to {}", after);
    }
}
