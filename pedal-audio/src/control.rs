//! Cross-thread control plane
//!
//! The audio callback never blocks on anything in here. Every type is
//! either a single atomic word or a bounded lock-free channel.

use crate::looper::LooperCommand;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Single-slot looper command mailbox.
///
/// Last write wins: posting while a command is still waiting replaces it.
#[derive(Debug, Default)]
pub struct LooperMailbox {
    slot: AtomicU8,
}

impl LooperMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, cmd: LooperCommand) {
        self.slot.store(cmd as u8, Ordering::Release);
    }

    /// Take the waiting command, leaving the slot empty
    pub fn take(&self) -> Option<LooperCommand> {
        match LooperCommand::from_u8(self.slot.swap(LooperCommand::None as u8, Ordering::Acquire)) {
            Some(LooperCommand::None) | None => None,
            cmd => cmd,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load(Ordering::Relaxed) == LooperCommand::None as u8
    }
}

/// Footswitch edge event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub pressed: bool,
    pub time_ms: u64,
}

/// Bounded footswitch event queue. On overflow the oldest event is dropped
/// so the newest edge always gets through.
#[derive(Debug, Clone)]
pub struct FootswitchQueue {
    tx: Sender<ButtonEvent>,
    rx: Receiver<ButtonEvent>,
}

impl Default for FootswitchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FootswitchQueue {
    pub const CAPACITY: usize = 8;

    pub fn new() -> Self {
        let (tx, rx) = bounded(Self::CAPACITY);
        Self { tx, rx }
    }

    pub fn push(&self, event: ButtonEvent) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(ev)) => {
                    let _ = self.rx.try_recv();
                    event = ev;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn pop(&self) -> Option<ButtonEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// `f32` stored as raw bits in an `AtomicU32`
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Level controls written by host threads and read once per block
#[derive(Debug)]
pub struct SharedParams {
    input_gain: AtomicF32,
    output_level: AtomicF32,
    looper_mix: AtomicF32,
    bypass: AtomicBool,
}

impl SharedParams {
    pub fn new(input_gain: f32, output_level: f32, looper_mix: f32) -> Self {
        let params = Self {
            input_gain: AtomicF32::default(),
            output_level: AtomicF32::default(),
            looper_mix: AtomicF32::default(),
            bypass: AtomicBool::new(false),
        };
        params.set_input_gain(input_gain);
        params.set_output_level(output_level);
        params.set_looper_mix(looper_mix);
        params
    }

    /// Input gain (0.0 - 1.0)
    pub fn set_input_gain(&self, gain: f32) {
        self.input_gain.store(gain.clamp(0.0, 1.0));
    }

    pub fn input_gain(&self) -> f32 {
        self.input_gain.load()
    }

    /// Output level (0.0 - 1.0)
    pub fn set_output_level(&self, level: f32) {
        self.output_level.store(level.clamp(0.0, 1.0));
    }

    pub fn output_level(&self) -> f32 {
        self.output_level.load()
    }

    /// Looper blend (0.0 dry only, 1.0 loop only, up to 2.0)
    pub fn set_looper_mix(&self, mix: f32) {
        self.looper_mix.store(mix.clamp(0.0, 2.0));
    }

    pub fn looper_mix(&self) -> f32 {
        self.looper_mix.load()
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }

    pub fn bypass(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_last_write_wins() {
        let mb = LooperMailbox::new();
        assert!(mb.take().is_none());
        mb.post(LooperCommand::StartRecording);
        mb.post(LooperCommand::Clear);
        assert_eq!(mb.take(), Some(LooperCommand::Clear));
        assert!(mb.is_empty());
        assert!(mb.take().is_none());
    }

    #[test]
    fn test_footswitch_drops_oldest() {
        let q = FootswitchQueue::new();
        for t in 0..10u64 {
            q.push(ButtonEvent { pressed: t % 2 == 0, time_ms: t });
        }
        assert_eq!(q.len(), FootswitchQueue::CAPACITY);
        assert_eq!(q.pop().map(|e| e.time_ms), Some(2));
        let last = std::iter::from_fn(|| q.pop()).last();
        assert_eq!(last.map(|e| e.time_ms), Some(9));
    }

    #[test]
    fn test_shared_params_clamp() {
        let p = SharedParams::new(0.3, 1.0, 1.0);
        assert!((p.input_gain() - 0.3).abs() < 1e-7);
        p.set_looper_mix(5.0);
        assert_eq!(p.looper_mix(), 2.0);
        p.set_output_level(-1.0);
        assert_eq!(p.output_level(), 0.0);
        assert!(!p.bypass());
        p.set_bypass(true);
        assert!(p.bypass());
    }
}
