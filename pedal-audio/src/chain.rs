//! Effect chain manager
//!
//! Holds up to [`MAX_EFFECT_CHAIN`] effect instances in order. Parameter
//! writes go to the stored natural-unit value and to the instance's DSP
//! state at the same time; processing never re-applies parameters.
//! Audio runs through two pre-allocated scratch buffers, swapping
//! source and destination after every enabled effect.

use tracing::debug;

use crate::effects::{Effect, EffectState, EffectType, MAX_PARAMS};
use crate::error::ChainError;
use crate::params::slider_to_param;
use crate::MAX_BLOCK_SIZE;

/// Maximum effects in the chain
pub const MAX_EFFECT_CHAIN: usize = 8;

/// One slot of the chain
pub struct EffectInstance {
    state: EffectState,
    enabled: bool,
    params: [f32; MAX_PARAMS],
}

impl EffectInstance {
    pub fn effect_type(&self) -> EffectType {
        self.state.effect_type()
    }

    pub fn name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stored parameter values in natural units
    pub fn params(&self) -> &[f32; MAX_PARAMS] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<f32> {
        self.params.get(index).copied()
    }
}

/// Split stereo scratch buffer
struct Scratch {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Scratch {
    fn new() -> Self {
        Self {
            left: vec![0.0; MAX_BLOCK_SIZE],
            right: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

pub struct EffectChain {
    sample_rate: f32,
    instances: Vec<EffectInstance>,
    selected_instance: usize,
    selected_param: usize,
    scratch: [Scratch; 2],
}

impl EffectChain {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            instances: Vec::with_capacity(MAX_EFFECT_CHAIN),
            selected_instance: 0,
            selected_param: 0,
            scratch: [Scratch::new(), Scratch::new()],
        }
    }

    /// Append an effect with its default parameters applied.
    /// Returns the new slot index.
    pub fn add_effect(&mut self, ty: EffectType) -> Result<usize, ChainError> {
        if self.instances.len() >= MAX_EFFECT_CHAIN {
            return Err(ChainError::ChainFull);
        }

        let params = ty.default_params();
        let mut state = EffectState::new(ty, self.sample_rate);
        for (i, value) in params.iter().enumerate() {
            state.set_param(i, *value);
        }

        self.instances.push(EffectInstance {
            state,
            enabled: true,
            params,
        });
        let index = self.instances.len() - 1;
        debug!(effect = ty.name(), index, "effect added");
        Ok(index)
    }

    /// Remove the effect at `index`, shifting later effects down
    pub fn remove_effect(&mut self, index: usize) -> Result<(), ChainError> {
        if index >= self.instances.len() {
            return Err(ChainError::IndexOutOfRange(index));
        }
        let removed = self.instances.remove(index);
        debug!(effect = removed.name(), index, "effect removed");

        if self.selected_instance >= self.instances.len() {
            self.selected_instance = self.instances.len().saturating_sub(1);
        }
        Ok(())
    }

    /// Store a natural-unit value and push it to the effect's setter
    pub fn set_effect_param(
        &mut self,
        index: usize,
        param: usize,
        value: f32,
    ) -> Result<(), ChainError> {
        let inst = self
            .instances
            .get_mut(index)
            .ok_or(ChainError::IndexOutOfRange(index))?;
        if param >= MAX_PARAMS {
            return Err(ChainError::ParamOutOfRange(param));
        }

        inst.params[param] = value;
        inst.state.set_param(param, value);
        Ok(())
    }

    /// Slider-domain variant of [`set_effect_param`](Self::set_effect_param)
    pub fn set_effect_param_slider(
        &mut self,
        index: usize,
        param: usize,
        slider: u8,
    ) -> Result<(), ChainError> {
        let ty = self
            .instances
            .get(index)
            .ok_or(ChainError::IndexOutOfRange(index))?
            .effect_type();
        self.set_effect_param(index, param, slider_to_param(ty, param, slider))
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ChainError> {
        let inst = self
            .instances
            .get_mut(index)
            .ok_or(ChainError::IndexOutOfRange(index))?;
        inst.enabled = enabled;
        Ok(())
    }

    pub fn toggle_effect(&mut self, index: usize) -> Result<(), ChainError> {
        let enabled = self
            .instances
            .get(index)
            .ok_or(ChainError::IndexOutOfRange(index))?
            .enabled;
        self.set_enabled(index, !enabled)
    }

    pub fn instance(&self, index: usize) -> Option<&EffectInstance> {
        self.instances.get(index)
    }

    pub fn instances(&self) -> impl Iterator<Item = &EffectInstance> {
        self.instances.iter()
    }

    /// Index of the first instance whose name matches (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.instances
            .iter()
            .position(|inst| inst.name().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.instances.len() >= MAX_EFFECT_CHAIN
    }

    /// Remove every effect
    pub fn clear(&mut self) {
        self.instances.clear();
        self.selected_instance = 0;
        self.selected_param = 0;
    }

    /// Zero the DSP state of every instance, keeping parameters
    pub fn reset(&mut self) {
        for inst in &mut self.instances {
            inst.state.reset();
        }
    }

    pub fn select_instance(&mut self, index: usize) {
        if index < self.instances.len() {
            self.selected_instance = index;
            self.selected_param = 0;
        }
    }

    pub fn select_param(&mut self, param: usize) {
        if param < MAX_PARAMS {
            self.selected_param = param;
        }
    }

    pub fn selected_instance(&self) -> usize {
        self.selected_instance
    }

    pub fn selected_param(&self) -> usize {
        self.selected_param
    }

    /// Run the enabled effects in order. An empty chain copies input to output.
    ///
    /// Blocks longer than [`MAX_BLOCK_SIZE`] are processed in chunks.
    pub fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let len = out_l.len().min(out_r.len()).min(in_l.len()).min(in_r.len());

        if self.instances.is_empty() {
            out_l[..len].copy_from_slice(&in_l[..len]);
            out_r[..len].copy_from_slice(&in_r[..len]);
            return;
        }

        let mut start = 0;
        while start < len {
            let end = (start + MAX_BLOCK_SIZE).min(len);
            self.process_chunk(
                &in_l[start..end],
                &in_r[start..end],
                &mut out_l[start..end],
                &mut out_r[start..end],
            );
            start = end;
        }
    }

    fn process_chunk(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let n = in_l.len();
        self.scratch[0].left[..n].copy_from_slice(in_l);
        self.scratch[0].right[..n].copy_from_slice(in_r);

        let mut current = 0;
        for inst in self.instances.iter_mut().filter(|inst| inst.enabled) {
            let (first, second) = self.scratch.split_at_mut(1);
            let (src, dst) = if current == 0 {
                (&first[0], &mut second[0])
            } else {
                (&second[0], &mut first[0])
            };

            inst.state.process(
                &src.left[..n],
                &src.right[..n],
                &mut dst.left[..n],
                &mut dst.right[..n],
            );
            current ^= 1;
        }

        out_l.copy_from_slice(&self.scratch[current].left[..n]);
        out_r.copy_from_slice(&self.scratch[current].right[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 / len as f32) * 2.0 - 1.0).collect()
    }

    #[test]
    fn test_empty_chain_passthrough() {
        let mut chain = EffectChain::new(48000.0);
        let input = ramp(256);
        let input_r: Vec<f32> = input.iter().map(|s| -s).collect();
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        chain.process(&input, &input_r, &mut l, &mut r);
        assert_eq!(l, input);
        assert_eq!(r, input_r);
    }

    #[test]
    fn test_add_until_full() {
        let mut chain = EffectChain::new(48000.0);
        for i in 0..MAX_EFFECT_CHAIN {
            assert_eq!(chain.add_effect(EffectType::Tremolo), Ok(i));
        }
        assert_eq!(chain.add_effect(EffectType::Delay), Err(ChainError::ChainFull));
        assert_eq!(chain.len(), MAX_EFFECT_CHAIN);
        assert!(chain.is_full());
    }

    #[test]
    fn test_add_applies_defaults() {
        let mut chain = EffectChain::new(48000.0);
        let idx = chain.add_effect(EffectType::Compressor).unwrap();
        let inst = chain.instance(idx).unwrap();
        assert_eq!(inst.params(), &[-20.0, 4.0, 5.0, 100.0]);
        assert!(inst.is_enabled());
        assert_eq!(inst.name(), "COMPRESSOR");
    }

    #[test]
    fn test_remove_shifts_and_clamps_selection() {
        let mut chain = EffectChain::new(48000.0);
        chain.add_effect(EffectType::Delay).unwrap();
        chain.add_effect(EffectType::Chorus).unwrap();
        chain.add_effect(EffectType::Phaser).unwrap();
        chain.select_instance(2);

        chain.remove_effect(0).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.instance(0).unwrap().effect_type(), EffectType::Chorus);
        assert_eq!(chain.instance(1).unwrap().effect_type(), EffectType::Phaser);
        assert_eq!(chain.selected_instance(), 1);

        assert_eq!(chain.remove_effect(5), Err(ChainError::IndexOutOfRange(5)));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_set_param_bounds() {
        let mut chain = EffectChain::new(48000.0);
        chain.add_effect(EffectType::Delay).unwrap();

        chain.set_effect_param(0, 0, 250.0).unwrap();
        assert_eq!(chain.instance(0).unwrap().param(0), Some(250.0));

        assert_eq!(
            chain.set_effect_param(1, 0, 1.0),
            Err(ChainError::IndexOutOfRange(1))
        );
        assert_eq!(
            chain.set_effect_param(0, 4, 1.0),
            Err(ChainError::ParamOutOfRange(4))
        );

        chain.set_effect_param_slider(0, 3, 50).unwrap();
        assert_eq!(chain.instance(0).unwrap().param(3), Some(0.5));
    }

    #[test]
    fn test_disabled_effect_skipped() {
        let mut chain = EffectChain::new(48000.0);
        chain.add_effect(EffectType::Distortion).unwrap();
        chain.toggle_effect(0).unwrap();
        assert!(!chain.instance(0).unwrap().is_enabled());

        let input = ramp(256);
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        chain.process(&input, &input, &mut l, &mut r);
        assert_eq!(l, input);
    }

    #[test]
    fn test_two_instances_do_not_share_state() {
        let mut chain = EffectChain::new(48000.0);
        chain.add_effect(EffectType::Delay).unwrap();
        chain.add_effect(EffectType::Delay).unwrap();
        chain.set_effect_param(1, 0, 50.0).unwrap();

        let mut input = vec![0.0; 8192];
        input[0] = 1.0;
        let mut l = vec![0.0; 8192];
        let mut r = vec![0.0; 8192];
        chain.process(&input, &input, &mut l, &mut r);

        // Second delay's 2400-sample repeat of the dry impulse
        assert!(l[2400] > 0.1, "expected repeat at 2400, got {}", l[2400]);
        // Cross term: 4800 + 2400
        assert!(l[7200] > 0.0);
    }

    #[test]
    fn test_find_by_name_and_clear() {
        let mut chain = EffectChain::new(48000.0);
        chain.add_effect(EffectType::Chorus).unwrap();
        chain.add_effect(EffectType::HallReverb).unwrap();
        assert_eq!(chain.find_by_name("hallreverb"), Some(1));
        assert_eq!(chain.find_by_name("delay"), None);

        chain.clear();
        assert!(chain.is_empty());
        assert_eq!(chain.find_by_name("chorus"), None);
    }
}
