//! The thirteen pedal effects
//!
//! Every effect owns its state and is created per chain slot, so two
//! instances of the same type never share buffers. [`EffectState`] is the
//! closed set of variants the chain stores; dispatch is a single `match`.

mod autowah;
mod chorus;
mod compressor;
mod delay;
mod distortion;
mod flanger;
mod modline;
mod overdrive;
mod phaser;
mod reverb;
mod tremolo;

pub use autowah::AutoWah;
pub use chorus::Chorus;
pub use compressor::Compressor;
pub use delay::{Delay, MAX_DELAY_MS};
pub use distortion::Distortion;
pub use flanger::Flanger;
pub use overdrive::Overdrive;
pub use phaser::Phaser;
pub use reverb::{HallReverb, PlateReverb, ShimmerReverb, SpringReverb};
pub use tremolo::Tremolo;

/// Parameter slots per effect
pub const MAX_PARAMS: usize = 4;

/// Trait for audio effects
pub trait Effect: Send {
    /// Process one block of split stereo. All four slices have the same length.
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]);

    /// Zero all internal state (buffers, filters, followers, LFO phase)
    fn reset(&mut self);

    /// Route a natural-unit value to the setter for slot `index`.
    /// Unknown slots are ignored.
    fn set_param(&mut self, index: usize, value: f32);

    /// Upper-case display name
    fn name(&self) -> &'static str;
}

/// Effect type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectType {
    Delay,
    Overdrive,
    Chorus,
    Tremolo,
    Flanger,
    Phaser,
    Distortion,
    AutoWah,
    Compressor,
    HallReverb,
    PlateReverb,
    SpringReverb,
    ShimmerReverb,
}

impl EffectType {
    pub const COUNT: usize = 13;

    pub const ALL: [EffectType; Self::COUNT] = [
        EffectType::Delay,
        EffectType::Overdrive,
        EffectType::Chorus,
        EffectType::Tremolo,
        EffectType::Flanger,
        EffectType::Phaser,
        EffectType::Distortion,
        EffectType::AutoWah,
        EffectType::Compressor,
        EffectType::HallReverb,
        EffectType::PlateReverb,
        EffectType::SpringReverb,
        EffectType::ShimmerReverb,
    ];

    /// Position in [`EffectType::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectType::Delay => "DELAY",
            EffectType::Overdrive => "OVERDRIVE",
            EffectType::Chorus => "CHORUS",
            EffectType::Tremolo => "TREMOLO",
            EffectType::Flanger => "FLANGER",
            EffectType::Phaser => "PHASER",
            EffectType::Distortion => "DISTORTION",
            EffectType::AutoWah => "AUTOWAH",
            EffectType::Compressor => "COMPRESSOR",
            EffectType::HallReverb => "HALLREVERB",
            EffectType::PlateReverb => "PLATEREVERB",
            EffectType::SpringReverb => "SPRINGREVERB",
            EffectType::ShimmerReverb => "SHIMMERREVERB",
        }
    }

    /// Case-insensitive lookup by display name. A few short aliases are
    /// accepted for typing at the console.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let alias = match upper.as_str() {
            "OD" => "OVERDRIVE",
            "DIST" => "DISTORTION",
            "WAH" => "AUTOWAH",
            "COMP" => "COMPRESSOR",
            "TREM" => "TREMOLO",
            "HALL" => "HALLREVERB",
            "PLATE" => "PLATEREVERB",
            "SPRING" => "SPRINGREVERB",
            "SHIMMER" => "SHIMMERREVERB",
            other => other,
        };
        Self::ALL.iter().copied().find(|t| t.name() == alias)
    }

    /// Parameters applied when an instance is added to the chain
    pub fn default_params(self) -> [f32; MAX_PARAMS] {
        match self {
            EffectType::Delay => [100.0, 0.5, 0.7, 0.3],
            EffectType::Overdrive => [5.0, 0.5, 0.5, 0.0],
            EffectType::Chorus => [1.0, 0.5, 0.5, 0.0],
            EffectType::Tremolo => [2.0, 0.5, 0.5, 0.0],
            EffectType::Flanger => [0.5, 0.5, 0.5, 5.0],
            EffectType::Phaser => [0.5, 0.5, 0.5, 2000.0],
            EffectType::Distortion => [10.0, 0.5, 0.5, 0.0],
            EffectType::AutoWah => [0.5, 0.5, 0.5, 1.75],
            EffectType::Compressor => [-20.0, 4.0, 5.0, 100.0],
            EffectType::HallReverb => [3.0, 0.5, 20.0, 0.5],
            EffectType::PlateReverb => [1.0, 0.5, 0.5, 0.35],
            EffectType::SpringReverb => [0.6, 0.5, 0.5, 0.35],
            EffectType::ShimmerReverb => [1.5, 0.01, 0.25, 0.35],
        }
    }

    /// Number of parameter slots the effect actually consumes
    pub fn param_count(self) -> usize {
        match self {
            EffectType::Overdrive
            | EffectType::Chorus
            | EffectType::Tremolo
            | EffectType::Distortion => 3,
            _ => MAX_PARAMS,
        }
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned DSP state for one chain slot
pub enum EffectState {
    Delay(Delay),
    Overdrive(Overdrive),
    Chorus(Chorus),
    Tremolo(Tremolo),
    Flanger(Flanger),
    Phaser(Phaser),
    Distortion(Distortion),
    AutoWah(AutoWah),
    Compressor(Compressor),
    HallReverb(HallReverb),
    PlateReverb(PlateReverb),
    SpringReverb(SpringReverb),
    ShimmerReverb(ShimmerReverb),
}

impl EffectState {
    /// Allocate fresh, zeroed state for `ty`
    pub fn new(ty: EffectType, sample_rate: f32) -> Self {
        match ty {
            EffectType::Delay => EffectState::Delay(Delay::new(sample_rate)),
            EffectType::Overdrive => EffectState::Overdrive(Overdrive::new()),
            EffectType::Chorus => EffectState::Chorus(Chorus::new(sample_rate)),
            EffectType::Tremolo => EffectState::Tremolo(Tremolo::new(sample_rate)),
            EffectType::Flanger => EffectState::Flanger(Flanger::new(sample_rate)),
            EffectType::Phaser => EffectState::Phaser(Phaser::new(sample_rate)),
            EffectType::Distortion => EffectState::Distortion(Distortion::new()),
            EffectType::AutoWah => EffectState::AutoWah(AutoWah::new(sample_rate)),
            EffectType::Compressor => EffectState::Compressor(Compressor::new(sample_rate)),
            EffectType::HallReverb => EffectState::HallReverb(HallReverb::new(sample_rate)),
            EffectType::PlateReverb => EffectState::PlateReverb(PlateReverb::new(sample_rate)),
            EffectType::SpringReverb => EffectState::SpringReverb(SpringReverb::new(sample_rate)),
            EffectType::ShimmerReverb => {
                EffectState::ShimmerReverb(ShimmerReverb::new(sample_rate))
            }
        }
    }

    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectState::Delay(_) => EffectType::Delay,
            EffectState::Overdrive(_) => EffectType::Overdrive,
            EffectState::Chorus(_) => EffectType::Chorus,
            EffectState::Tremolo(_) => EffectType::Tremolo,
            EffectState::Flanger(_) => EffectType::Flanger,
            EffectState::Phaser(_) => EffectType::Phaser,
            EffectState::Distortion(_) => EffectType::Distortion,
            EffectState::AutoWah(_) => EffectType::AutoWah,
            EffectState::Compressor(_) => EffectType::Compressor,
            EffectState::HallReverb(_) => EffectType::HallReverb,
            EffectState::PlateReverb(_) => EffectType::PlateReverb,
            EffectState::SpringReverb(_) => EffectType::SpringReverb,
            EffectState::ShimmerReverb(_) => EffectType::ShimmerReverb,
        }
    }

    fn as_effect_mut(&mut self) -> &mut dyn Effect {
        match self {
            EffectState::Delay(e) => e,
            EffectState::Overdrive(e) => e,
            EffectState::Chorus(e) => e,
            EffectState::Tremolo(e) => e,
            EffectState::Flanger(e) => e,
            EffectState::Phaser(e) => e,
            EffectState::Distortion(e) => e,
            EffectState::AutoWah(e) => e,
            EffectState::Compressor(e) => e,
            EffectState::HallReverb(e) => e,
            EffectState::PlateReverb(e) => e,
            EffectState::SpringReverb(e) => e,
            EffectState::ShimmerReverb(e) => e,
        }
    }
}

impl Effect for EffectState {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        self.as_effect_mut().process(in_l, in_r, out_l, out_r);
    }

    fn reset(&mut self) {
        self.as_effect_mut().reset();
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.as_effect_mut().set_param(index, value);
    }

    fn name(&self) -> &'static str {
        self.effect_type().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_indexed_in_order() {
        for (i, ty) in EffectType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
            assert_eq!(EffectType::from_index(i), Some(*ty));
        }
        assert_eq!(EffectType::from_index(EffectType::COUNT), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(EffectType::from_name("delay"), Some(EffectType::Delay));
        assert_eq!(EffectType::from_name("HallReverb"), Some(EffectType::HallReverb));
        assert_eq!(EffectType::from_name("comp"), Some(EffectType::Compressor));
        assert_eq!(EffectType::from_name("fuzz"), None);
    }

    #[test]
    fn test_state_names_match_types() {
        for ty in EffectType::ALL {
            let mut state = EffectState::new(ty, 48000.0);
            assert_eq!(state.effect_type(), ty);
            assert_eq!(state.name(), ty.name());
            assert_eq!(state.as_effect_mut().name(), ty.name(), "{:?} module name", ty);
        }
    }

    #[test]
    fn test_zero_input_stays_bounded() {
        let silence = vec![0.0; 256];
        for ty in EffectType::ALL {
            let mut state = EffectState::new(ty, 48000.0);
            for (i, v) in ty.default_params().iter().enumerate() {
                state.set_param(i, *v);
            }
            let mut l = vec![0.0; 256];
            let mut r = vec![0.0; 256];
            for _ in 0..50 {
                state.process(&silence, &silence, &mut l, &mut r);
                assert!(
                    l.iter().chain(r.iter()).all(|s| s.abs() <= 1.0),
                    "{} left bounds on silence",
                    ty
                );
            }
        }
    }
}
