//! Downward-expanding noise gate
//!
//! A peak envelope follower with separate attack/release. Below the
//! threshold the gain falls off in proportion to how far the envelope sits
//! under it, scaled by the ratio, so quiet hiss between notes is pulled
//! down without chopping decaying notes. Each channel has its own
//! envelope and gain.

use crate::dsp::db_to_gain;

/// Envelope follower and gain for one channel
#[derive(Debug, Clone, Copy)]
struct GateChannel {
    envelope: f32,
    gain: f32,
}

impl GateChannel {
    const IDLE: GateChannel = GateChannel {
        envelope: 0.0,
        gain: 1.0,
    };
}

pub struct NoiseGate {
    sample_rate: f32,
    enabled: bool,
    threshold_db: f32,
    /// Linear threshold
    threshold: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    attack_coeff: f32,
    release_coeff: f32,
    left: GateChannel,
    right: GateChannel,
}

impl NoiseGate {
    pub const MIN_THRESHOLD_DB: f32 = -60.0;
    pub const MAX_THRESHOLD_DB: f32 = 0.0;

    pub fn new(sample_rate: f32) -> Self {
        let mut gate = Self {
            sample_rate,
            enabled: false,
            threshold_db: -40.0,
            threshold: 0.01,
            ratio: 10.0,
            attack_ms: 1.0,
            release_ms: 50.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            left: GateChannel::IDLE,
            right: GateChannel::IDLE,
        };
        gate.set_attack_ms(1.0);
        gate.set_release_ms(50.0);
        gate
    }

    #[inline]
    fn coeff(ms: f32, sample_rate: f32) -> f32 {
        (-1.0 / (ms * 0.001 * sample_rate)).exp()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Threshold in dB (-60 to 0)
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = db.clamp(Self::MIN_THRESHOLD_DB, Self::MAX_THRESHOLD_DB);
        self.threshold = db_to_gain(self.threshold_db);
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Expansion ratio (1 to 100)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(1.0, 100.0);
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Attack in milliseconds (0.1 to 50)
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(0.1, 50.0);
        self.attack_coeff = Self::coeff(self.attack_ms, self.sample_rate);
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Release in milliseconds (10 to 500)
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(10.0, 500.0);
        self.release_coeff = Self::coeff(self.release_ms, self.sample_rate);
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Lower of the two channel gains for the most recent sample
    pub fn current_gain(&self) -> f32 {
        self.left.gain.min(self.right.gain)
    }

    /// Per-channel gains for the most recent sample
    pub fn channel_gains(&self) -> (f32, f32) {
        (self.left.gain, self.right.gain)
    }

    pub fn reset(&mut self) {
        self.left = GateChannel::IDLE;
        self.right = GateChannel::IDLE;
    }

    #[inline]
    fn gain_for(&self, ch: &mut GateChannel, x: f32) -> f32 {
        let level = x.abs();
        let c = if level > ch.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        ch.envelope = c * ch.envelope + (1.0 - c) * level;

        ch.gain = if ch.envelope < self.threshold {
            let under = (self.threshold - ch.envelope) / self.threshold;
            (1.0 - under * (1.0 - 1.0 / self.ratio)).max(0.0)
        } else {
            1.0
        };
        ch.gain
    }

    /// Gate a stereo block in place
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let (mut ch_l, mut ch_r) = (self.left, self.right);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l *= self.gain_for(&mut ch_l, *l);
            *r *= self.gain_for(&mut ch_r, *r);
        }
        self.left = ch_l;
        self.right = ch_r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_passthrough() {
        let mut gate = NoiseGate::new(48000.0);
        let mut l = vec![0.001; 64];
        let mut r = vec![0.001; 64];
        gate.process(&mut l, &mut r);
        assert!(l.iter().all(|s| *s == 0.001));
        assert_eq!(gate.current_gain(), 1.0);
    }

    #[test]
    fn test_quiet_signal_attenuated() {
        let mut gate = NoiseGate::new(48000.0);
        gate.set_enabled(true);
        let mut l = vec![0.001; 4800];
        let mut r = l.clone();
        gate.process(&mut l, &mut r);
        let g = gate.current_gain();
        assert!(g < 0.2, "gain {} should be mostly closed", g);
        assert!(l[4799] < 0.001 * 0.2);
    }

    #[test]
    fn test_loud_signal_open() {
        let mut gate = NoiseGate::new(48000.0);
        gate.set_enabled(true);
        let mut l = vec![0.5; 4800];
        let mut r = l.clone();
        gate.process(&mut l, &mut r);
        assert_eq!(gate.current_gain(), 1.0);
        assert_eq!(r[4799], 0.5);
    }

    #[test]
    fn test_threshold_db_roundtrip_and_clamp() {
        let mut gate = NoiseGate::new(48000.0);
        gate.set_threshold_db(-30.0);
        assert!((gate.threshold_db() + 30.0).abs() < 1e-3, "got {}", gate.threshold_db());
        gate.set_threshold_db(-90.0);
        assert!((gate.threshold_db() + 60.0).abs() < 1e-3);
        gate.set_ratio(500.0);
        assert_eq!(gate.ratio(), 100.0);
        gate.set_attack_ms(0.0);
        assert_eq!(gate.attack_ms(), 0.1);
        gate.set_release_ms(1000.0);
        assert_eq!(gate.release_ms(), 500.0);
    }

    #[test]
    fn test_disable_resets_envelope() {
        let mut gate = NoiseGate::new(48000.0);
        gate.set_enabled(true);
        let mut l = vec![0.0; 100];
        let mut r = l.clone();
        gate.process(&mut l, &mut r);
        assert!(gate.current_gain() < 1.0);
        gate.set_enabled(false);
        assert_eq!(gate.current_gain(), 1.0);
    }

    #[test]
    fn test_channels_gated_independently() {
        let mut gate = NoiseGate::new(48000.0);
        gate.set_enabled(true);
        let mut l = vec![0.0; 4800];
        let mut r = vec![0.5; 4800];
        gate.process(&mut l, &mut r);

        let (gain_l, gain_r) = gate.channel_gains();
        assert!(gain_l < 0.2, "silent left should close, gain {}", gain_l);
        assert_eq!(gain_r, 1.0, "loud right should stay open");
        assert_eq!(r[4799], 0.5, "right channel attenuated to {}", r[4799]);
        assert_eq!(l[4799], 0.0);
    }
}
