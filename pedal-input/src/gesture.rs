//! Footswitch gesture decoding
//!
//! One switch drives the whole looper:
//! - single press: record / stop recording / overdub / stop overdub / resume
//! - double press (second press within 400 ms): stop playback
//! - hold for 2 s, released: undo if possible, otherwise clear;
//!   a double press followed by a hold always clears
//!
//! Single presses act on the press edge, so there is no latency waiting
//! to rule out a double press.

use pedal_audio::{ButtonEvent, Looper, LooperCommand, LooperState};

/// Second press within this window is a double press
pub const DOUBLE_PRESS_WINDOW_MS: u64 = 400;

/// Press length that counts as a hold
pub const HOLD_THRESHOLD_MS: u64 = 2000;

/// What the decoder needs to know about the looper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooperStatus {
    pub state: LooperState,
    pub has_loop: bool,
    pub can_undo: bool,
}

impl From<&Looper> for LooperStatus {
    fn from(looper: &Looper) -> Self {
        Self {
            state: looper.state(),
            has_loop: looper.has_loop(),
            can_undo: looper.can_undo(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FootswitchDecoder {
    pressed: bool,
    press_start: u64,
    last_press: u64,
    waiting_for_double: bool,
    double_detected: bool,
    /// Where to go back to when resuming from a double-press stop
    state_before_stop: LooperState,
    /// Follow-up command held until the looper consumed the first one
    deferred: Option<LooperCommand>,
}

impl Default for FootswitchDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FootswitchDecoder {
    pub fn new() -> Self {
        Self {
            pressed: false,
            press_start: 0,
            last_press: 0,
            waiting_for_double: false,
            double_detected: false,
            state_before_stop: LooperState::Stopped,
            deferred: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// True while the switch has been held past the hold threshold
    pub fn hold_reached(&self, now_ms: u64) -> bool {
        self.pressed && now_ms.saturating_sub(self.press_start) >= HOLD_THRESHOLD_MS
    }

    /// Decode one switch edge into a looper command
    pub fn on_event(&mut self, event: ButtonEvent, looper: LooperStatus) -> Option<LooperCommand> {
        let now = event.time_ms;

        if event.pressed {
            if self.pressed {
                return None;
            }
            self.pressed = true;
            self.press_start = now;

            if self.waiting_for_double
                && now.saturating_sub(self.last_press) <= DOUBLE_PRESS_WINDOW_MS
            {
                self.double_detected = true;
                self.waiting_for_double = false;
                self.double_press(looper)
            } else {
                self.double_detected = false;
                self.waiting_for_double = true;
                self.last_press = now;
                self.single_press(looper)
            }
        } else {
            if !self.pressed {
                return None;
            }
            self.pressed = false;

            if now.saturating_sub(self.press_start) >= HOLD_THRESHOLD_MS {
                self.waiting_for_double = false;
                Some(self.hold(looper))
            } else {
                None
            }
        }
    }

    /// Periodic housekeeping: expires the double-press window and releases
    /// a deferred follow-up command once the looper has moved on.
    pub fn tick(&mut self, now_ms: u64, looper: LooperStatus) -> Option<LooperCommand> {
        if !self.pressed
            && self.waiting_for_double
            && now_ms.saturating_sub(self.last_press) > DOUBLE_PRESS_WINDOW_MS
        {
            self.waiting_for_double = false;
        }

        if looper.state != LooperState::Recording {
            return self.deferred.take();
        }
        None
    }

    fn single_press(&mut self, looper: LooperStatus) -> Option<LooperCommand> {
        let cmd = match looper.state {
            LooperState::Stopped if looper.has_loop => {
                if self.state_before_stop == LooperState::Overdubbing {
                    LooperCommand::StartOverdub
                } else {
                    LooperCommand::ResumePlayback
                }
            }
            LooperState::Stopped => LooperCommand::StartRecording,
            LooperState::Recording => LooperCommand::StopRecording,
            LooperState::Playing => LooperCommand::StartOverdub,
            LooperState::Overdubbing => LooperCommand::StopOverdub,
        };
        Some(cmd)
    }

    fn double_press(&mut self, looper: LooperStatus) -> Option<LooperCommand> {
        match looper.state {
            LooperState::Playing | LooperState::Overdubbing => {
                self.state_before_stop = looper.state;
                Some(LooperCommand::StopPlayback)
            }
            LooperState::Recording => {
                // The mailbox holds one command, so the stop follows later
                self.state_before_stop = LooperState::Stopped;
                self.deferred = Some(LooperCommand::StopPlayback);
                Some(LooperCommand::StopRecording)
            }
            LooperState::Stopped => None,
        }
    }

    fn hold(&mut self, looper: LooperStatus) -> LooperCommand {
        self.deferred = None;
        if !self.double_detected && looper.can_undo {
            LooperCommand::Undo
        } else {
            LooperCommand::Clear
        }
    }
}
