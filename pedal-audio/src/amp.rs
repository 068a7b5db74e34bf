//! Amplifier simulation
//!
//! Per channel: input pad, pre-EQ (bass shelf, mid peak), model gain
//! stage and clipper, makeup, post-EQ (treble and presence shelves),
//! DC blocker, master, then a gentle limiter above ±0.95.
//!
//! Tone-stack coefficients are cached and recomputed only when a tone
//! control differs from the value they were built from.

use crate::dsp::{soft_clip, soft_limit, Biquad, BiquadCoeffs};

/// Butterworth Q used by every tone-stack band
const TONE_Q: f32 = 0.707;

const BASS_FREQ: f32 = 80.0;
const MID_FREQ: f32 = 800.0;
const TREBLE_FREQ: f32 = 3000.0;
const PRESENCE_FREQ: f32 = 6000.0;

/// Input pad ahead of the pre-EQ
const INPUT_PAD: f32 = 0.5;

/// DC blocker pole
const DC_POLE: f32 = 0.995;

/// Limiter knee
const LIMIT_KNEE: f32 = 0.95;

/// Amp voicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AmpModel {
    #[default]
    Clean,
    Crunch,
    Lead,
    Blues,
    Metal,
}

/// Per-model gain stage constants
#[derive(Debug, Clone, Copy)]
struct Voicing {
    gain_base: f32,
    gain_range: f32,
    saturation: f32,
    asymmetry: f32,
    makeup: f32,
}

impl AmpModel {
    pub const ALL: [AmpModel; 5] = [
        AmpModel::Clean,
        AmpModel::Crunch,
        AmpModel::Lead,
        AmpModel::Blues,
        AmpModel::Metal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AmpModel::Clean => "Clean",
            AmpModel::Crunch => "Crunch",
            AmpModel::Lead => "Lead",
            AmpModel::Blues => "Blues",
            AmpModel::Metal => "Metal",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    fn voicing(self) -> Voicing {
        match self {
            AmpModel::Clean => Voicing {
                gain_base: 1.0,
                gain_range: 2.0,
                saturation: 0.15,
                asymmetry: 0.0,
                makeup: 0.95,
            },
            AmpModel::Crunch => Voicing {
                gain_base: 1.5,
                gain_range: 5.5,
                saturation: 0.68,
                asymmetry: 0.25,
                makeup: 0.58,
            },
            AmpModel::Lead => Voicing {
                gain_base: 2.0,
                gain_range: 10.0,
                saturation: 0.8,
                asymmetry: 0.12,
                makeup: 0.45,
            },
            AmpModel::Blues => Voicing {
                gain_base: 1.2,
                gain_range: 4.3,
                saturation: 0.48,
                asymmetry: 0.35,
                makeup: 0.72,
            },
            AmpModel::Metal => Voicing {
                gain_base: 3.0,
                gain_range: 19.0,
                saturation: 0.92,
                asymmetry: 0.03,
                makeup: 0.28,
            },
        }
    }
}

impl std::fmt::Display for AmpModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Symmetric tube-style saturation
#[inline]
fn soft_clip_tube(x: f32, saturation: f32) -> f32 {
    let a = x * (1.0 + saturation * 1.5);
    if a > 3.0 {
        0.995
    } else if a < -3.0 {
        -0.995
    } else {
        soft_limit(a)
    }
}

/// Triode-style clipper: the positive half clips harder than the negative
#[inline]
fn asymmetric_clip(x: f32, saturation: f32) -> f32 {
    let a = x * (1.0 + saturation);
    if a > 0.0 {
        if a > 2.0 {
            0.85
        } else {
            a * (1.0 - 0.18 * a + 0.03 * a * a)
        }
    } else if a < -2.5 {
        -0.95
    } else {
        a * (1.0 + 0.08 * a)
    }
}

/// Limit only the part of the signal beyond ±0.95
#[inline]
fn knee_limit(x: f32) -> f32 {
    if x > LIMIT_KNEE {
        LIMIT_KNEE + 0.05 * soft_clip((x - LIMIT_KNEE) * 10.0)
    } else if x < -LIMIT_KNEE {
        -LIMIT_KNEE + 0.05 * soft_clip((x + LIMIT_KNEE) * 10.0)
    } else {
        x
    }
}

/// Tone control values the cached coefficients were built from
#[derive(Debug, Clone, Copy, PartialEq)]
struct ToneSnapshot {
    bass: f32,
    mid: f32,
    treble: f32,
    presence: f32,
}

/// Mono amp simulator
pub struct AmpSim {
    sample_rate: f32,
    model: AmpModel,
    enabled: bool,
    // Controls (0.0 - 1.0)
    gain: f32,
    bass: f32,
    mid: f32,
    treble: f32,
    presence: f32,
    master: f32,
    // Tone stack
    bass_coeffs: BiquadCoeffs,
    mid_coeffs: BiquadCoeffs,
    treble_coeffs: BiquadCoeffs,
    presence_coeffs: BiquadCoeffs,
    built_from: Option<ToneSnapshot>,
    bass_filter: Biquad,
    mid_filter: Biquad,
    treble_filter: Biquad,
    presence_filter: Biquad,
    // DC blocker history
    dc_x1: f32,
    dc_y1: f32,
}

impl AmpSim {
    pub fn new(sample_rate: f32) -> Self {
        let mut amp = Self {
            sample_rate,
            model: AmpModel::Clean,
            enabled: true,
            gain: 0.2,
            bass: 0.5,
            mid: 0.5,
            treble: 0.5,
            presence: 0.3,
            master: 0.5,
            bass_coeffs: BiquadCoeffs::IDENTITY,
            mid_coeffs: BiquadCoeffs::IDENTITY,
            treble_coeffs: BiquadCoeffs::IDENTITY,
            presence_coeffs: BiquadCoeffs::IDENTITY,
            built_from: None,
            bass_filter: Biquad::default(),
            mid_filter: Biquad::default(),
            treble_filter: Biquad::default(),
            presence_filter: Biquad::default(),
            dc_x1: 0.0,
            dc_y1: 0.0,
        };
        amp.update_tone_stack();
        amp
    }

    fn tone_snapshot(&self) -> ToneSnapshot {
        ToneSnapshot {
            bass: self.bass,
            mid: self.mid,
            treble: self.treble,
            presence: self.presence,
        }
    }

    /// Rebuild the four tone-stack bands if a control moved.
    /// Returns true when coefficients were recomputed.
    fn update_tone_stack(&mut self) -> bool {
        let snapshot = self.tone_snapshot();
        if self.built_from == Some(snapshot) {
            return false;
        }

        // ±12 dB around the centre position
        let eq_amp = |v: f32| 10.0_f32.powf((v - 0.5) * 0.4);
        let sr = self.sample_rate;

        self.bass_coeffs = BiquadCoeffs::low_shelf(BASS_FREQ, TONE_Q, eq_amp(self.bass), sr);
        self.mid_coeffs = BiquadCoeffs::peaking(MID_FREQ, TONE_Q, eq_amp(self.mid), sr);
        self.treble_coeffs = BiquadCoeffs::high_shelf(TREBLE_FREQ, TONE_Q, eq_amp(self.treble), sr);
        self.presence_coeffs =
            BiquadCoeffs::high_shelf(PRESENCE_FREQ, TONE_Q, 1.0 + self.presence * 2.5, sr);

        self.built_from = Some(snapshot);
        true
    }

    /// Clear filter and DC-blocker history
    pub fn reset(&mut self) {
        self.bass_filter.reset();
        self.mid_filter.reset();
        self.treble_filter.reset();
        self.presence_filter.reset();
        self.dc_x1 = 0.0;
        self.dc_y1 = 0.0;
    }

    /// Switch model. Histories are cleared so the old voicing doesn't ring on.
    pub fn set_model(&mut self, model: AmpModel) {
        self.model = model;
        self.reset();
    }

    pub fn model(&self) -> AmpModel {
        self.model
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_bass(&mut self, bass: f32) {
        self.bass = bass.clamp(0.0, 1.0);
    }

    pub fn bass(&self) -> f32 {
        self.bass
    }

    pub fn set_mid(&mut self, mid: f32) {
        self.mid = mid.clamp(0.0, 1.0);
    }

    pub fn mid(&self) -> f32 {
        self.mid
    }

    pub fn set_treble(&mut self, treble: f32) {
        self.treble = treble.clamp(0.0, 1.0);
    }

    pub fn treble(&self) -> f32 {
        self.treble
    }

    pub fn set_presence(&mut self, presence: f32) {
        self.presence = presence.clamp(0.0, 1.0);
    }

    pub fn presence(&self) -> f32 {
        self.presence
    }

    pub fn set_master(&mut self, master: f32) {
        self.master = master.clamp(0.0, 1.0);
    }

    pub fn master(&self) -> f32 {
        self.master
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if !self.enabled {
            output.copy_from_slice(input);
            return;
        }

        self.update_tone_stack();

        let v = self.model.voicing();
        let drive = v.gain_base + self.gain * v.gain_range;
        let master = 0.3 + self.master * 0.7;

        for (out, &x) in output.iter_mut().zip(input) {
            let mut s = x * INPUT_PAD;

            s = self.bass_filter.process(s, &self.bass_coeffs);
            s = self.mid_filter.process(s, &self.mid_coeffs);

            s *= drive;
            s = if v.asymmetry > 0.01 {
                asymmetric_clip(s, v.saturation) * (1.0 + v.asymmetry * 0.5)
            } else {
                soft_clip_tube(s, v.saturation)
            };
            s *= v.makeup;

            s = self.treble_filter.process(s, &self.treble_coeffs);
            s = self.presence_filter.process(s, &self.presence_coeffs);

            let blocked = s - self.dc_x1 + DC_POLE * self.dc_y1;
            self.dc_x1 = s;
            self.dc_y1 = blocked;

            *out = knee_limit(blocked * master);
        }
    }
}

/// Left/right amp pair driven by one set of controls
pub struct StereoAmp {
    left: AmpSim,
    right: AmpSim,
}

macro_rules! forward_control {
    ($set:ident, $get:ident) => {
        pub fn $set(&mut self, value: f32) {
            self.left.$set(value);
            self.right.$set(value);
        }

        pub fn $get(&self) -> f32 {
            self.left.$get()
        }
    };
}

impl StereoAmp {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: AmpSim::new(sample_rate),
            right: AmpSim::new(sample_rate),
        }
    }

    forward_control!(set_gain, gain);
    forward_control!(set_bass, bass);
    forward_control!(set_mid, mid);
    forward_control!(set_treble, treble);
    forward_control!(set_presence, presence);
    forward_control!(set_master, master);

    pub fn set_model(&mut self, model: AmpModel) {
        self.left.set_model(model);
        self.right.set_model(model);
    }

    pub fn model(&self) -> AmpModel {
        self.left.model()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.left.set_enabled(enabled);
        self.right.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.left.is_enabled()
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    pub fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        self.left.process(in_l, out_l);
        self.right.process(in_r, out_r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, amp: f32) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.06).sin() * amp).collect()
    }

    #[test]
    fn test_disabled_is_copy() {
        let mut amp = AmpSim::new(48000.0);
        amp.set_enabled(false);
        let input = sine(256, 0.8);
        let mut out = vec![0.0; 256];
        amp.process(&input, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn test_controls_clamped() {
        let mut amp = AmpSim::new(48000.0);
        amp.set_gain(3.0);
        amp.set_master(-1.0);
        assert_eq!(amp.gain(), 1.0);
        assert_eq!(amp.master(), 0.0);
    }

    #[test]
    fn test_output_stays_below_limit() {
        for model in AmpModel::ALL {
            let mut amp = AmpSim::new(48000.0);
            amp.set_model(model);
            amp.set_gain(1.0);
            amp.set_bass(1.0);
            amp.set_treble(1.0);
            amp.set_presence(1.0);
            amp.set_master(1.0);
            let input = sine(9600, 1.0);
            let mut out = vec![0.0; input.len()];
            amp.process(&input, &mut out);
            let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak <= 1.0, "{} peaked at {}", model, peak);
        }
    }

    #[test]
    fn test_tone_stack_recomputed_lazily() {
        let mut amp = AmpSim::new(48000.0);
        assert!(!amp.update_tone_stack(), "unchanged controls must not rebuild");
        amp.set_gain(0.9);
        assert!(!amp.update_tone_stack(), "gain is not a tone control");
        amp.set_bass(0.8);
        assert!(amp.update_tone_stack());
        assert!(!amp.update_tone_stack());
    }

    #[test]
    fn test_model_change_resets_history() {
        let mut amp = AmpSim::new(48000.0);
        let input = sine(512, 0.5);
        let mut out = vec![0.0; 512];
        amp.process(&input, &mut out);
        assert!(amp.dc_y1 != 0.0);

        amp.set_model(AmpModel::Metal);
        assert_eq!(amp.dc_x1, 0.0);
        assert_eq!(amp.dc_y1, 0.0);
        assert_eq!(amp.model(), AmpModel::Metal);
    }

    #[test]
    fn test_asymmetric_clip_harder_on_positive() {
        assert!(asymmetric_clip(3.0, 0.0) < -asymmetric_clip(-3.0, 0.0));
        assert_eq!(asymmetric_clip(0.0, 0.5), 0.0);
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(AmpModel::from_name("metal"), Some(AmpModel::Metal));
        assert_eq!(AmpModel::from_index(1), Some(AmpModel::Crunch));
        assert_eq!(AmpModel::from_index(5), None);
    }
}
