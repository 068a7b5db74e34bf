//! Audio pipeline - orchestrates the per-block signal path
//!
//! input gain → noise gate → effect chain → amp → looper → cabinet →
//! output level → meter
//!
//! Bypass copies the raw input to the output; no stage runs and looper
//! commands wait until bypass is released. Level controls and looper
//! commands are picked up from the shared control plane at the start of
//! every block.

use crate::amp::{AmpModel, StereoAmp};
use crate::cabinet::Cabinet;
use crate::chain::EffectChain;
use crate::config::PedalConfig;
use crate::control::{LooperMailbox, SharedParams};
use crate::dsp::soft_clip;
use crate::gate::NoiseGate;
use crate::looper::{Looper, LooperCommand, LooperState};
use crate::meter::PeakMeter;
use crate::sample::{f32_to_s24, s24_to_f32};
use crate::MAX_BLOCK_SIZE;
use std::sync::Arc;

/// Snapshot of pipeline counters and meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStatus {
    pub blocks_processed: u64,
    pub samples_processed: u64,
    pub peak: f32,
    pub level_db: f32,
    pub gate_gain: f32,
    pub looper_state: LooperState,
    pub looper_progress: u8,
}

pub struct Pipeline {
    sample_rate: f32,
    chain: EffectChain,
    amp: StereoAmp,
    cabinet: Cabinet,
    gate: NoiseGate,
    looper: Looper,
    meter: PeakMeter,
    mailbox: Arc<LooperMailbox>,
    shared: Arc<SharedParams>,
    // Pre-allocated stage buffers (no allocation in the audio callback)
    work_l: Vec<f32>,
    work_r: Vec<f32>,
    stage_l: Vec<f32>,
    stage_r: Vec<f32>,
    blocks_processed: u64,
    samples_processed: u64,
}

impl Pipeline {
    pub fn new(config: PedalConfig) -> Self {
        let sr = config.sample_rate;

        let mut amp = StereoAmp::new(sr);
        amp.set_model(AmpModel::Crunch);
        amp.set_gain(0.5);
        amp.set_bass(0.5);
        amp.set_mid(0.5);
        amp.set_treble(0.5);
        amp.set_presence(0.3);
        amp.set_master(0.7);

        Self {
            sample_rate: sr,
            chain: EffectChain::new(sr),
            amp,
            cabinet: Cabinet::new(sr),
            gate: NoiseGate::new(sr),
            looper: Looper::new(config.looper_samples()),
            meter: PeakMeter::new(),
            mailbox: Arc::new(LooperMailbox::new()),
            shared: Arc::new(SharedParams::new(
                config.input_gain,
                config.output_level,
                config.looper_mix,
            )),
            work_l: vec![0.0; MAX_BLOCK_SIZE],
            work_r: vec![0.0; MAX_BLOCK_SIZE],
            stage_l: vec![0.0; MAX_BLOCK_SIZE],
            stage_r: vec![0.0; MAX_BLOCK_SIZE],
            blocks_processed: 0,
            samples_processed: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    pub fn amp(&self) -> &StereoAmp {
        &self.amp
    }

    pub fn amp_mut(&mut self) -> &mut StereoAmp {
        &mut self.amp
    }

    pub fn cabinet(&self) -> &Cabinet {
        &self.cabinet
    }

    pub fn cabinet_mut(&mut self) -> &mut Cabinet {
        &mut self.cabinet
    }

    pub fn gate(&self) -> &NoiseGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut NoiseGate {
        &mut self.gate
    }

    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    pub fn looper_mut(&mut self) -> &mut Looper {
        &mut self.looper
    }

    /// Handle for posting looper commands from another thread
    pub fn mailbox(&self) -> Arc<LooperMailbox> {
        Arc::clone(&self.mailbox)
    }

    /// Post a looper command; it takes effect at the next block
    pub fn send_looper_command(&self, cmd: LooperCommand) {
        self.mailbox.post(cmd);
    }

    /// Handle for level controls shared with host threads
    pub fn shared_params(&self) -> Arc<SharedParams> {
        Arc::clone(&self.shared)
    }

    pub fn set_input_gain(&self, gain: f32) {
        self.shared.set_input_gain(gain);
    }

    pub fn input_gain(&self) -> f32 {
        self.shared.input_gain()
    }

    pub fn set_output_level(&self, level: f32) {
        self.shared.set_output_level(level);
    }

    pub fn output_level(&self) -> f32 {
        self.shared.output_level()
    }

    pub fn set_looper_mix(&self, mix: f32) {
        self.shared.set_looper_mix(mix);
    }

    pub fn looper_mix(&self) -> f32 {
        self.shared.looper_mix()
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.shared.set_bypass(bypass);
    }

    pub fn is_bypassed(&self) -> bool {
        self.shared.bypass()
    }

    pub fn output_level_db(&self) -> f32 {
        self.meter.level_db()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            blocks_processed: self.blocks_processed,
            samples_processed: self.samples_processed,
            peak: self.meter.peak(),
            level_db: self.meter.level_db(),
            gate_gain: self.gate.current_gain(),
            looper_state: self.looper.state(),
            looper_progress: self.looper.progress_percent(),
        }
    }

    /// Clear every stage's history without touching settings or the loop
    pub fn reset(&mut self) {
        self.chain.reset();
        self.amp.reset();
        self.cabinet.clear_history();
        self.gate.reset();
        self.meter.reset();
    }

    /// Process split stereo float buffers of any length
    pub fn process_f32(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let len = out_l.len().min(out_r.len()).min(in_l.len()).min(in_r.len());
        let mut offset = 0;
        while offset < len {
            let n = (len - offset).min(MAX_BLOCK_SIZE);
            let end = offset + n;
            if self.shared.bypass() {
                out_l[offset..end].copy_from_slice(&in_l[offset..end]);
                out_r[offset..end].copy_from_slice(&in_r[offset..end]);
                self.count_block(n);
                offset = end;
                continue;
            }
            self.work_l[..n].copy_from_slice(&in_l[offset..end]);
            self.work_r[..n].copy_from_slice(&in_r[offset..end]);
            self.process_block(n);
            out_l[offset..end].copy_from_slice(&self.work_l[..n]);
            out_r[offset..end].copy_from_slice(&self.work_r[..n]);
            offset = end;
        }
    }

    /// Process interleaved stereo frames of 24-bit samples in 32-bit words
    pub fn process_interleaved(&mut self, input: &[i32], output: &mut [i32]) {
        let frames = input.len().min(output.len()) / 2;
        let mut frame = 0;
        while frame < frames {
            let n = (frames - frame).min(MAX_BLOCK_SIZE);
            let src = &input[frame * 2..(frame + n) * 2];
            if self.shared.bypass() {
                output[frame * 2..(frame + n) * 2].copy_from_slice(src);
                self.count_block(n);
                frame += n;
                continue;
            }
            for (i, pair) in src.chunks_exact(2).enumerate() {
                self.work_l[i] = s24_to_f32(pair[0]);
                self.work_r[i] = s24_to_f32(pair[1]);
            }

            self.process_block(n);

            let dst = &mut output[frame * 2..(frame + n) * 2];
            for (i, pair) in dst.chunks_exact_mut(2).enumerate() {
                pair[0] = f32_to_s24(self.work_l[i]);
                pair[1] = f32_to_s24(self.work_r[i]);
            }
            frame += n;
        }
    }

    fn count_block(&mut self, n: usize) {
        self.blocks_processed += 1;
        self.samples_processed += n as u64;
    }

    /// Run one block of `n` frames held in the work buffers, in place
    fn process_block(&mut self, n: usize) {
        if let Some(cmd) = self.mailbox.take() {
            self.looper.request(cmd);
        }
        let input_gain = self.shared.input_gain();
        let output_level = self.shared.output_level();
        let looper_mix = self.shared.looper_mix();

        let (wl, wr) = (&mut self.work_l[..n], &mut self.work_r[..n]);
        let (sl, sr) = (&mut self.stage_l[..n], &mut self.stage_r[..n]);

        for (l, r) in wl.iter_mut().zip(wr.iter_mut()) {
            *l *= input_gain;
            *r *= input_gain;
        }

        self.gate.process(wl, wr);

        self.chain.process(wl, wr, sl, sr);
        self.amp.process(sl, sr, wl, wr);

        let state = self.looper.state();
        let playing = matches!(state, LooperState::Playing | LooperState::Overdubbing);
        for (l, r) in wl.iter_mut().zip(wr.iter_mut()) {
            let mono = (*l + *r) * 0.5;
            let looped = self.looper.process_sample(mono);
            if playing {
                let mixed = (1.0 - looper_mix) * mono + looper_mix * looped;
                *l = mixed;
                *r = mixed;
            }
            if l.abs() > 1.0 {
                *l = soft_clip(*l);
            }
            if r.abs() > 1.0 {
                *r = soft_clip(*r);
            }
        }

        if self.cabinet.is_enabled() {
            self.cabinet.process(wl, wr, sl, sr);
            wl.copy_from_slice(sl);
            wr.copy_from_slice(sr);
        }

        let mut peak = 0.0f32;
        for (l, r) in wl.iter_mut().zip(wr.iter_mut()) {
            *l *= output_level;
            *r *= output_level;
            peak = peak.max(l.abs()).max(r.abs());
        }
        self.meter.update(peak);
        self.count_block(n);
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PedalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectType;

    fn run(p: &mut Pipeline, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        p.process_f32(input, input, &mut l, &mut r);
        (l, r)
    }

    fn small_config() -> PedalConfig {
        PedalConfig {
            max_looper_seconds: 2.0,
            ..PedalConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let p = Pipeline::new(small_config());
        assert_eq!(p.amp().model(), AmpModel::Crunch);
        assert!((p.amp().master() - 0.7).abs() < 1e-6);
        assert!((p.input_gain() - 0.3).abs() < 1e-6);
        assert_eq!(p.output_level(), 1.0);
        assert_eq!(p.looper_mix(), 1.0);
        assert!(!p.gate().is_enabled());
        assert!(!p.cabinet().is_enabled());
        assert_eq!(p.output_level_db(), -60.0);
    }

    #[test]
    fn test_bypass_passes_raw_input() {
        let mut p = Pipeline::new(small_config());
        p.chain_mut().add_effect(EffectType::Distortion).unwrap();
        p.cabinet_mut().set_enabled(true);
        p.gate_mut().set_enabled(true);
        p.set_output_level(0.5);
        p.set_bypass(true);

        let input: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let (l, r) = run(&mut p, &input);
        assert_eq!(l, input, "left differs from input under bypass");
        assert_eq!(r, input, "right differs from input under bypass");
        assert_eq!(p.status().samples_processed, 1000);
    }

    #[test]
    fn test_bypass_holds_looper_commands() {
        let mut p = Pipeline::new(small_config());
        p.set_bypass(true);
        p.send_looper_command(LooperCommand::StartRecording);
        run(&mut p, &[0.2; 256]);
        assert_eq!(p.looper().state(), LooperState::Stopped);

        p.set_bypass(false);
        run(&mut p, &[0.2; 256]);
        assert_eq!(p.looper().state(), LooperState::Recording);
    }

    #[test]
    fn test_interleaved_bypass_copies_words() {
        let mut p = Pipeline::new(small_config());
        p.set_bypass(true);
        let input: Vec<i32> = (0..1024).map(|i| (i * 4099) % 0x7F_FFFF - 0x40_0000).collect();
        let mut output = vec![0i32; 1024];
        p.process_interleaved(&input, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn test_output_bounded_and_metered() {
        let mut p = Pipeline::new(small_config());
        p.set_input_gain(1.0);
        let input: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.05).sin()).collect();
        let (l, _) = run(&mut p, &input);
        assert!(l.iter().all(|s| s.abs() <= 1.0));
        let status = p.status();
        assert_eq!(status.blocks_processed, 8);
        assert_eq!(status.samples_processed, 4096);
        assert!(status.peak > 0.0);
        assert!(status.level_db > -60.0 && status.level_db <= 6.0);
    }

    #[test]
    fn test_mailbox_command_applied_next_block() {
        let mut p = Pipeline::new(small_config());
        p.send_looper_command(LooperCommand::StartRecording);
        run(&mut p, &[0.1; 256]);
        assert_eq!(p.looper().state(), LooperState::Recording);
        assert_eq!(p.looper().loop_length(), 256);

        p.mailbox().post(LooperCommand::StopRecording);
        run(&mut p, &[0.0; 16]);
        assert_eq!(p.looper().state(), LooperState::Playing);
        assert!(p.looper().has_loop());
    }

    #[test]
    fn test_interleaved_silence() {
        let mut p = Pipeline::new(small_config());
        let input = vec![0i32; 1024];
        let mut output = vec![1i32; 1024];
        p.process_interleaved(&input, &mut output);
        assert!(output.iter().all(|s| *s == 0));
        assert_eq!(p.status().samples_processed, 512);
    }
}
