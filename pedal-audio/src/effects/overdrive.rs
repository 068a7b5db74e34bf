//! Overdrive: gain stage into the clamped soft clipper, then tone and level.

use super::Effect;
use crate::dsp::{soft_clip, OnePole};

/// Tube-style overdrive (drive 1x - 10x)
pub struct Overdrive {
    drive: f32,
    level: f32,
    tone: f32,
    tone_l: OnePole,
    tone_r: OnePole,
}

impl Default for Overdrive {
    fn default() -> Self {
        Self::new()
    }
}

impl Overdrive {
    pub const MIN_DRIVE: f32 = 1.0;
    pub const MAX_DRIVE: f32 = 10.0;

    pub fn new() -> Self {
        Self {
            drive: 5.0,
            level: 0.5,
            tone: 0.5,
            tone_l: OnePole::new(),
            tone_r: OnePole::new(),
        }
    }

    /// Set drive (1.0 - 10.0)
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.clamp(Self::MIN_DRIVE, Self::MAX_DRIVE);
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// Set output level (0.0 - 1.0)
    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Set tone (0.0 dark - 1.0 bright)
    pub fn set_tone(&mut self, tone: f32) {
        self.tone = tone.clamp(0.0, 1.0);
    }

    pub fn tone(&self) -> f32 {
        self.tone
    }
}

impl Effect for Overdrive {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let coeff = 0.01 + self.tone * 0.3;
        for i in 0..out_l.len() {
            let l = soft_clip(in_l[i] * self.drive);
            let r = soft_clip(in_r[i] * self.drive);
            out_l[i] = self.tone_l.process(l, coeff) * self.level;
            out_r[i] = self.tone_r.process(r, coeff) * self.level;
        }
    }

    fn reset(&mut self) {
        self.tone_l.reset();
        self.tone_r.reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        // Slot 3 has no control on this effect
        match index {
            0 => self.set_drive(value),
            1 => self.set_level(value),
            2 => self.set_tone(value),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "OVERDRIVE"
    }
}
