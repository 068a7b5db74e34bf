//! Preset snapshots and the eight-slot preset bank
//!
//! A preset captures the effect chain plus, optionally, the amp, cabinet,
//! noise gate and level settings. Sections left out of a preset are not
//! touched when it is applied.

use pedal_audio::{AmpModel, EffectType, Pipeline, MAX_EFFECT_CHAIN, MAX_PARAMS};
use thiserror::Error;
use tracing::{info, warn};

/// Number of preset slots
pub const MAX_PRESETS: usize = 8;

/// Longest preset name kept, in characters
pub const PRESET_NAME_LENGTH: usize = 19;

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("preset slot {0} does not exist")]
    InvalidSlot(usize),
    #[error("preset slot {0} is empty")]
    EmptySlot(usize),
    #[error("corrupt preset data: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetEffect {
    pub effect: EffectType,
    pub enabled: bool,
    pub params: [f32; MAX_PARAMS],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmpSettings {
    pub enabled: bool,
    pub model: AmpModel,
    pub gain: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub presence: f32,
    pub master: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CabinetSettings {
    pub enabled: bool,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSettings {
    pub enabled: bool,
    pub threshold_db: f32,
    pub ratio: f32,
}

impl GateSettings {
    /// Gate switched off with its stock threshold and ratio
    pub const OFF: GateSettings = GateSettings {
        enabled: false,
        threshold_db: -40.0,
        ratio: 10.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSettings {
    pub input_gain: f32,
    pub output_level: f32,
}

/// Which optional sections `capture` records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeFlags {
    pub amp: bool,
    pub cabinet: bool,
    pub noise_gate: bool,
    pub levels: bool,
}

impl Default for IncludeFlags {
    fn default() -> Self {
        Self {
            amp: true,
            cabinet: true,
            noise_gate: true,
            levels: true,
        }
    }
}

/// Complete pedal snapshot. `None` sections are left alone on apply.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetData {
    pub name: String,
    pub effects: Vec<PresetEffect>,
    pub amp: Option<AmpSettings>,
    pub cabinet: Option<CabinetSettings>,
    pub noise_gate: Option<GateSettings>,
    pub levels: Option<LevelSettings>,
}

fn truncate_name(name: &str) -> String {
    name.trim().chars().take(PRESET_NAME_LENGTH).collect()
}

impl PresetData {
    /// Read the pedal's current settings through its getters
    pub fn capture(pedal: &Pipeline, name: &str, include: IncludeFlags) -> Self {
        let effects = pedal
            .chain()
            .instances()
            .take(MAX_EFFECT_CHAIN)
            .map(|inst| PresetEffect {
                effect: inst.effect_type(),
                enabled: inst.is_enabled(),
                params: *inst.params(),
            })
            .collect();

        let amp = pedal.amp();
        let gate = pedal.gate();
        let cabinet = pedal.cabinet();

        Self {
            name: truncate_name(name),
            effects,
            amp: include.amp.then(|| AmpSettings {
                enabled: amp.is_enabled(),
                model: amp.model(),
                gain: amp.gain(),
                bass: amp.bass(),
                mid: amp.mid(),
                treble: amp.treble(),
                presence: amp.presence(),
                master: amp.master(),
            }),
            cabinet: include.cabinet.then(|| CabinetSettings {
                enabled: cabinet.is_enabled(),
                slot: cabinet.selected(),
            }),
            noise_gate: include.noise_gate.then(|| GateSettings {
                enabled: gate.is_enabled(),
                threshold_db: gate.threshold_db(),
                ratio: gate.ratio(),
            }),
            levels: include.levels.then(|| LevelSettings {
                input_gain: pedal.input_gain(),
                output_level: pedal.output_level(),
            }),
        }
    }

    /// Push this snapshot into the pedal through its setters
    pub fn apply(&self, pedal: &mut Pipeline) {
        let chain = pedal.chain_mut();
        chain.clear();
        for slot in &self.effects {
            let index = match chain.add_effect(slot.effect) {
                Ok(index) => index,
                Err(e) => {
                    warn!(preset = %self.name, error = %e, "preset effect skipped");
                    continue;
                }
            };
            for (p, value) in slot.params.iter().enumerate() {
                let _ = chain.set_effect_param(index, p, *value);
            }
            let _ = chain.set_enabled(index, slot.enabled);
        }

        if let Some(amp) = self.amp {
            let a = pedal.amp_mut();
            a.set_enabled(amp.enabled);
            a.set_model(amp.model);
            a.set_gain(amp.gain);
            a.set_bass(amp.bass);
            a.set_mid(amp.mid);
            a.set_treble(amp.treble);
            a.set_presence(amp.presence);
            a.set_master(amp.master);
        }

        if let Some(cab) = self.cabinet {
            let c = pedal.cabinet_mut();
            c.set_enabled(cab.enabled);
            if let Err(e) = c.select(cab.slot) {
                warn!(preset = %self.name, error = %e, "preset cabinet ignored");
            }
        }

        if let Some(gate) = self.noise_gate {
            let g = pedal.gate_mut();
            g.set_enabled(gate.enabled);
            g.set_threshold_db(gate.threshold_db);
            g.set_ratio(gate.ratio);
        }

        if let Some(levels) = self.levels {
            pedal.set_input_gain(levels.input_gain);
            pedal.set_output_level(levels.output_level);
        }
    }
}

/// Eight preset slots plus the current-slot marker
#[derive(Debug, Clone)]
pub struct PresetBank {
    slots: [Option<PresetData>; MAX_PRESETS],
    current: Option<usize>,
    include: IncludeFlags,
}

impl Default for PresetBank {
    fn default() -> Self {
        Self::factory()
    }
}

impl PresetBank {
    /// Bank with every slot empty
    pub fn empty() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            current: None,
            include: IncludeFlags::default(),
        }
    }

    /// Bank filled with the factory presets
    pub fn factory() -> Self {
        let mut bank = Self::empty();
        for (slot, preset) in factory_presets().into_iter().enumerate() {
            bank.slots[slot] = Some(preset);
        }
        bank
    }

    fn check(slot: usize) -> Result<(), PresetError> {
        if slot >= MAX_PRESETS {
            return Err(PresetError::InvalidSlot(slot));
        }
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        MAX_PRESETS
    }

    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_valid(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    pub fn get(&self, slot: usize) -> Option<&PresetData> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Put a preset straight into a slot
    pub fn set(&mut self, slot: usize, preset: PresetData) -> Result<(), PresetError> {
        Self::check(slot)?;
        self.slots[slot] = Some(preset);
        Ok(())
    }

    /// Slot name, or "Empty"
    pub fn name(&self, slot: usize) -> &str {
        match self.slots.get(slot) {
            Some(Some(p)) => &p.name,
            Some(None) => "Empty",
            None => "Invalid",
        }
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    pub fn include_flags(&self) -> IncludeFlags {
        self.include
    }

    pub fn set_include_flags(&mut self, include: IncludeFlags) {
        self.include = include;
    }

    /// Capture the pedal into `slot`, keeping the slot's name if it had one
    pub fn save(&mut self, slot: usize, pedal: &Pipeline) -> Result<(), PresetError> {
        Self::check(slot)?;
        let name = match &self.slots[slot] {
            Some(existing) => existing.name.clone(),
            None => format!("Preset {}", slot + 1),
        };
        self.slots[slot] = Some(PresetData::capture(pedal, &name, self.include));
        self.current = Some(slot);
        info!(slot, name = %name, "preset saved");
        Ok(())
    }

    pub fn load(&mut self, slot: usize, pedal: &mut Pipeline) -> Result<(), PresetError> {
        Self::check(slot)?;
        let preset = self.slots[slot].as_ref().ok_or(PresetError::EmptySlot(slot))?;
        preset.apply(pedal);
        self.current = Some(slot);
        info!(slot, name = %preset.name, "preset loaded");
        Ok(())
    }

    pub fn rename(&mut self, slot: usize, name: &str) -> Result<(), PresetError> {
        Self::check(slot)?;
        let preset = self.slots[slot].as_mut().ok_or(PresetError::EmptySlot(slot))?;
        preset.name = truncate_name(name);
        Ok(())
    }

    pub fn clear(&mut self, slot: usize) -> Result<(), PresetError> {
        Self::check(slot)?;
        self.slots[slot] = None;
        if self.current == Some(slot) {
            self.current = None;
        }
        Ok(())
    }

    /// Copy a preset, marking the name as a copy
    pub fn copy(&mut self, from: usize, to: usize) -> Result<(), PresetError> {
        Self::check(from)?;
        Self::check(to)?;
        let mut preset = self.slots[from].clone().ok_or(PresetError::EmptySlot(from))?;
        let stem: String = preset.name.chars().take(12).collect();
        preset.name = truncate_name(&format!("{} (Copy)", stem));
        self.slots[to] = Some(preset);
        Ok(())
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), PresetError> {
        Self::check(a)?;
        Self::check(b)?;
        self.slots.swap(a, b);
        self.current = match self.current {
            Some(s) if s == a => Some(b),
            Some(s) if s == b => Some(a),
            other => other,
        };
        Ok(())
    }

    pub fn reset_to_factory(&mut self) {
        *self = Self {
            include: self.include,
            ..Self::factory()
        };
    }

    /// Restore one slot's factory preset
    pub fn reset_slot_to_factory(&mut self, slot: usize) -> Result<(), PresetError> {
        Self::check(slot)?;
        self.slots[slot] = factory_presets().into_iter().nth(slot);
        if self.current == Some(slot) {
            self.current = None;
        }
        Ok(())
    }
}

fn fx(effect: EffectType, params: [f32; MAX_PARAMS]) -> PresetEffect {
    PresetEffect {
        effect,
        enabled: true,
        params,
    }
}

#[allow(clippy::too_many_arguments)]
fn amp(model: AmpModel, gain: f32, bass: f32, mid: f32, treble: f32, presence: f32, master: f32) -> Option<AmpSettings> {
    Some(AmpSettings {
        enabled: true,
        model,
        gain,
        bass,
        mid,
        treble,
        presence,
        master,
    })
}

fn cab(slot: usize) -> Option<CabinetSettings> {
    Some(CabinetSettings { enabled: true, slot })
}

fn gate(threshold_db: f32, ratio: f32) -> Option<GateSettings> {
    Some(GateSettings {
        enabled: true,
        threshold_db,
        ratio,
    })
}

fn levels(input_gain: f32, output_level: f32) -> Option<LevelSettings> {
    Some(LevelSettings {
        input_gain,
        output_level,
    })
}

/// Presets shipped in slots 0-7
pub fn factory_presets() -> Vec<PresetData> {
    use EffectType::*;

    vec![
        PresetData {
            name: "Clean Sparkle".into(),
            effects: vec![
                fx(Compressor, [-20.0, 3.0, 10.0, 150.0]),
                fx(Chorus, [1.2, 0.4, 0.35, 0.0]),
            ],
            amp: amp(AmpModel::Clean, 0.3, 0.5, 0.5, 0.6, 0.5, 0.6),
            cabinet: cab(1),
            noise_gate: Some(GateSettings::OFF),
            levels: levels(0.3, 0.8),
        },
        PresetData {
            name: "Blues Crunch".into(),
            effects: vec![
                fx(Compressor, [-25.0, 4.0, 5.0, 100.0]),
                fx(Overdrive, [4.0, 0.6, 0.55, 0.0]),
            ],
            amp: amp(AmpModel::Crunch, 0.5, 0.55, 0.6, 0.5, 0.45, 0.6),
            cabinet: cab(4),
            noise_gate: gate(-45.0, 5.0),
            levels: levels(0.35, 0.75),
        },
        PresetData {
            name: "Classic Rock".into(),
            effects: vec![
                fx(Overdrive, [6.0, 0.6, 0.5, 0.0]),
                fx(Delay, [180.0, 0.2, 0.6, 0.25]),
            ],
            amp: amp(AmpModel::Lead, 0.55, 0.5, 0.7, 0.55, 0.55, 0.65),
            cabinet: cab(3),
            noise_gate: gate(-42.0, 8.0),
            levels: levels(0.35, 0.7),
        },
        PresetData {
            name: "Heavy Metal".into(),
            effects: vec![
                fx(Compressor, [-30.0, 6.0, 2.0, 80.0]),
                fx(Distortion, [15.0, 0.55, 0.45, 0.0]),
            ],
            amp: amp(AmpModel::Metal, 0.75, 0.6, 0.45, 0.6, 0.65, 0.6),
            cabinet: cab(6),
            noise_gate: gate(-38.0, 15.0),
            levels: levels(0.4, 0.65),
        },
        PresetData {
            name: "Ambient Clean".into(),
            effects: vec![
                fx(Chorus, [0.8, 0.3, 0.25, 0.0]),
                fx(Delay, [350.0, 0.35, 0.7, 0.3]),
                fx(HallReverb, [4.0, 0.4, 30.0, 0.4]),
            ],
            amp: amp(AmpModel::Clean, 0.25, 0.45, 0.5, 0.55, 0.5, 0.65),
            cabinet: cab(8),
            noise_gate: Some(GateSettings::OFF),
            levels: levels(0.3, 0.75),
        },
        PresetData {
            name: "Shimmer".into(),
            effects: vec![
                fx(Delay, [400.0, 0.4, 0.65, 0.3]),
                fx(ShimmerReverb, [5.0, 0.02, 0.5, 0.5]),
            ],
            amp: amp(AmpModel::Clean, 0.2, 0.4, 0.5, 0.6, 0.55, 0.6),
            cabinet: cab(2),
            noise_gate: Some(GateSettings::OFF),
            levels: levels(0.3, 0.7),
        },
        PresetData {
            name: "Funk Machine".into(),
            effects: vec![
                fx(Compressor, [-22.0, 5.0, 3.0, 60.0]),
                fx(AutoWah, [0.7, 0.6, 0.8, 2.0]),
            ],
            amp: amp(AmpModel::Clean, 0.4, 0.55, 0.6, 0.5, 0.45, 0.65),
            cabinet: cab(7),
            noise_gate: gate(-48.0, 4.0),
            levels: levels(0.35, 0.7),
        },
        PresetData {
            name: "80s Lead".into(),
            effects: vec![
                fx(Overdrive, [5.5, 0.55, 0.55, 0.0]),
                fx(Chorus, [1.5, 0.45, 0.35, 0.0]),
                fx(Delay, [320.0, 0.35, 0.6, 0.3]),
                fx(PlateReverb, [2.0, 0.5, 0.6, 0.3]),
            ],
            amp: amp(AmpModel::Crunch, 0.55, 0.5, 0.65, 0.55, 0.6, 0.6),
            cabinet: cab(11),
            noise_gate: gate(-44.0, 6.0),
            levels: levels(0.35, 0.7),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedal_audio::PedalConfig;

    fn pedal() -> Pipeline {
        Pipeline::new(PedalConfig {
            max_looper_seconds: 0.1,
            ..PedalConfig::default()
        })
    }

    #[test]
    fn test_factory_bank() {
        let bank = PresetBank::factory();
        assert_eq!(bank.valid_count(), MAX_PRESETS);
        assert_eq!(bank.name(0), "Clean Sparkle");
        assert_eq!(bank.name(7), "80s Lead");
        assert_eq!(bank.name(9), "Invalid");
        assert_eq!(bank.current_slot(), None);
        for slot in 0..MAX_PRESETS {
            let p = bank.get(slot).unwrap();
            assert!(p.effects.len() <= MAX_EFFECT_CHAIN);
            assert!(p.name.chars().count() <= PRESET_NAME_LENGTH);
        }
    }

    #[test]
    fn test_load_applies_everything() {
        let mut pedal = pedal();
        let mut bank = PresetBank::factory();
        bank.load(7, &mut pedal).unwrap();

        let names: Vec<&str> = pedal.chain().instances().map(|i| i.name()).collect();
        assert_eq!(names, ["OVERDRIVE", "CHORUS", "DELAY", "PLATEREVERB"]);
        assert_eq!(pedal.chain().instance(2).unwrap().param(0), Some(320.0));
        assert_eq!(pedal.amp().model(), AmpModel::Crunch);
        assert!(pedal.cabinet().is_enabled());
        assert_eq!(pedal.cabinet().selected(), 11);
        assert!(pedal.gate().is_enabled());
        assert!((pedal.gate().threshold_db() + 44.0).abs() < 1e-3);
        assert!((pedal.output_level() - 0.7).abs() < 1e-6);
        assert_eq!(bank.current_slot(), Some(7));
    }

    #[test]
    fn test_capture_apply_roundtrip() {
        let mut pedal = pedal();
        let mut bank = PresetBank::factory();
        bank.load(4, &mut pedal).unwrap();
        pedal.chain_mut().toggle_effect(1).unwrap();

        let snapshot = PresetData::capture(&pedal, "Mine", IncludeFlags::default());
        let mut other = self::pedal();
        snapshot.apply(&mut other);

        let again = PresetData::capture(&other, "Mine", IncludeFlags::default());
        assert_eq!(again, snapshot);
        assert!(!other.chain().instance(1).unwrap().is_enabled());
    }

    #[test]
    fn test_excluded_sections_untouched() {
        let mut pedal = pedal();
        pedal.amp_mut().set_model(AmpModel::Metal);
        let include = IncludeFlags {
            amp: false,
            ..IncludeFlags::default()
        };
        let snapshot = PresetData::capture(&pedal, "No amp", include);
        assert!(snapshot.amp.is_none());

        let mut other = self::pedal();
        snapshot.apply(&mut other);
        assert_eq!(other.amp().model(), AmpModel::Crunch);
    }

    #[test]
    fn test_save_keeps_name_and_defaults_new() {
        let pedal = pedal();
        let mut bank = PresetBank::empty();
        bank.save(2, &pedal).unwrap();
        assert_eq!(bank.name(2), "Preset 3");
        bank.rename(2, "A very long preset name indeed").unwrap();
        bank.save(2, &pedal).unwrap();
        assert_eq!(bank.name(2), "A very long preset ");
        assert_eq!(bank.current_slot(), Some(2));
    }

    #[test]
    fn test_slot_management() {
        let mut pedal = pedal();
        let mut bank = PresetBank::factory();
        assert!(matches!(bank.load(8, &mut pedal), Err(PresetError::InvalidSlot(8))));

        bank.clear(3).unwrap();
        assert_eq!(bank.name(3), "Empty");
        assert!(matches!(bank.load(3, &mut pedal), Err(PresetError::EmptySlot(3))));

        bank.copy(4, 3).unwrap();
        assert_eq!(bank.name(3), "Ambient Clea (Copy)");

        bank.load(0, &mut pedal).unwrap();
        bank.swap(0, 5).unwrap();
        assert_eq!(bank.current_slot(), Some(5));
        assert_eq!(bank.name(5), "Clean Sparkle");

        bank.reset_slot_to_factory(3).unwrap();
        assert_eq!(bank.name(3), "Heavy Metal");
    }
}
