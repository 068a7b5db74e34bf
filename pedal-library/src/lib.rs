//! Host-side library for the pedal - presets, config and impulse responses

mod config;
mod ir_loader;
mod presets;
mod store;

pub use config::Config;
pub use ir_loader::{IrLoadError, IrLoader, LoadedIr};
pub use presets::{
    factory_presets, AmpSettings, CabinetSettings, GateSettings, IncludeFlags, LevelSettings,
    PresetBank, PresetData, PresetEffect, PresetError, MAX_PRESETS, PRESET_NAME_LENGTH,
};
pub use store::PresetStore;
