//! Real-time core for the pedal - effects, amp sim, cabinet, looper
//!
//! This crate provides the block-based signal path:
//! - Effects: 13 stereo effects behind one `Effect` contract
//! - Chain: up to eight effect slots processed in order
//! - Amp: five-model preamp with a four-band tone stack
//! - Cabinet: 256-tap FIR speaker simulation
//! - Looper: record / overdub / undo with boundary quantization
//! - Pipeline: gain staging, noise gate, metering, sample conversion

pub mod dsp;
pub mod effects;
mod amp;
mod cabinet;
mod chain;
mod config;
mod control;
mod error;
mod gate;
mod looper;
mod meter;
mod params;
mod pipeline;
mod sample;

/// Largest block processed in one pass; longer buffers are split
pub const MAX_BLOCK_SIZE: usize = 512;

pub use amp::{AmpModel, AmpSim, StereoAmp};
pub use cabinet::{normalize_peak, Cabinet, CABINET_NAMES, CABINET_SLOTS, CABINET_TAPS};
pub use chain::{EffectChain, EffectInstance, MAX_EFFECT_CHAIN};
pub use config::PedalConfig;
pub use control::{AtomicF32, ButtonEvent, FootswitchQueue, LooperMailbox, SharedParams};
pub use effects::{Effect, EffectState, EffectType, MAX_PARAMS};
pub use error::{CabinetError, ChainError};
pub use gate::NoiseGate;
pub use looper::{Looper, LooperCommand, LooperState, WINDOW_SAMPLES};
pub use meter::PeakMeter;
pub use params::{format_param_value, param_info, param_to_slider, slider_to_param, ParamInfo, SLIDER_MAX};
pub use pipeline::{Pipeline, PipelineStatus};
pub use sample::{f32_to_s24, s24_to_f32};
