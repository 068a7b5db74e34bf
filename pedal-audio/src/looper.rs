//! Single-track looper
//!
//! States: Stopped -> Recording -> Playing <-> Overdubbing, with Stopped
//! reachable from playback and left again via resume.
//!
//! Commands arrive through a single pending slot and are consumed by the
//! per-sample processing. With quantization on, commands that define the
//! loop boundary wait until the playhead is back at position 0; stop,
//! clear, undo and resume always act immediately.
//!
//! Every entry into recording or overdubbing fades the new input in over
//! [`WINDOW_SAMPLES`] with a quarter-sine curve.

use std::f32::consts::FRAC_PI_2;

/// Entry fade length (25 ms at 48 kHz)
pub const WINDOW_SAMPLES: usize = 1200;

/// Share of the existing loop kept on each overdub pass
const OVERDUB_FEEDBACK: f32 = 0.85;

/// Gain of the new input while overdubbing
const OVERDUB_INPUT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LooperState {
    #[default]
    Stopped,
    Recording,
    Playing,
    Overdubbing,
}

impl LooperState {
    pub fn name(self) -> &'static str {
        match self {
            LooperState::Stopped => "Stopped",
            LooperState::Recording => "Recording",
            LooperState::Playing => "Playing",
            LooperState::Overdubbing => "Overdubbing",
        }
    }
}

impl std::fmt::Display for LooperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Looper transport command. `None` marks an empty mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LooperCommand {
    #[default]
    None = 0,
    StartRecording = 1,
    StopRecording = 2,
    StartOverdub = 3,
    StopOverdub = 4,
    StopPlayback = 5,
    ResumePlayback = 6,
    Clear = 7,
    Undo = 8,
}

impl LooperCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => LooperCommand::None,
            1 => LooperCommand::StartRecording,
            2 => LooperCommand::StopRecording,
            3 => LooperCommand::StartOverdub,
            4 => LooperCommand::StopOverdub,
            5 => LooperCommand::StopPlayback,
            6 => LooperCommand::ResumePlayback,
            7 => LooperCommand::Clear,
            8 => LooperCommand::Undo,
            _ => return None,
        })
    }

    /// Commands that never wait for the loop boundary
    fn is_immediate(self) -> bool {
        matches!(
            self,
            LooperCommand::StopPlayback
                | LooperCommand::StopOverdub
                | LooperCommand::Clear
                | LooperCommand::Undo
                | LooperCommand::ResumePlayback
        )
    }
}

/// Quarter-sine fade: 0 at x = 0, 1 at x = 1
#[inline]
fn window_value(x: f32) -> f32 {
    (FRAC_PI_2 * x).sin()
}

pub struct Looper {
    buffer: Vec<f32>,
    undo_buffer: Vec<f32>,
    /// Highest index ever written, bounds the work done by clear
    high_water: usize,
    state: LooperState,
    position: usize,
    loop_length: usize,
    has_loop: bool,
    has_undo: bool,
    pending: LooperCommand,
    quantize: bool,
    window_idx: usize,
    windowing_active: bool,
}

impl Looper {
    /// Looper with room for `max_samples` mono samples. Both buffers are
    /// allocated here and never resized.
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            buffer: vec![0.0; max_samples],
            undo_buffer: vec![0.0; max_samples],
            high_water: 0,
            state: LooperState::Stopped,
            position: 0,
            loop_length: 0,
            has_loop: false,
            has_undo: false,
            pending: LooperCommand::None,
            quantize: true,
            window_idx: 0,
            windowing_active: false,
        }
    }

    pub fn with_duration(sample_rate: f32, seconds: f32) -> Self {
        Self::new((sample_rate * seconds) as usize)
    }

    /// Queue a command, replacing any command still waiting
    pub fn request(&mut self, cmd: LooperCommand) {
        self.pending = cmd;
    }

    pub fn pending_command(&self) -> LooperCommand {
        self.pending
    }

    pub fn state(&self) -> LooperState {
        self.state
    }

    pub fn has_loop(&self) -> bool {
        self.has_loop
    }

    pub fn can_undo(&self) -> bool {
        self.has_undo
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn loop_length(&self) -> usize {
        self.loop_length
    }

    pub fn max_length(&self) -> usize {
        self.buffer.len()
    }

    pub fn progress_percent(&self) -> u8 {
        if self.loop_length == 0 {
            return 0;
        }
        ((self.position * 100) / self.loop_length).min(100) as u8
    }

    pub fn set_quantize(&mut self, enabled: bool) {
        self.quantize = enabled;
    }

    pub fn quantize_enabled(&self) -> bool {
        self.quantize
    }

    /// Recorded loop contents
    pub fn loop_samples(&self) -> &[f32] {
        &self.buffer[..self.loop_length]
    }

    fn start_window(&mut self) {
        self.window_idx = 0;
        self.windowing_active = true;
    }

    /// Next entry-fade gain, 1.0 once the fade has completed
    #[inline]
    fn next_window(&mut self) -> f32 {
        if self.windowing_active && self.window_idx < WINDOW_SAMPLES {
            let w = window_value(self.window_idx as f32 / WINDOW_SAMPLES as f32);
            self.window_idx += 1;
            w
        } else {
            self.windowing_active = false;
            1.0
        }
    }

    fn should_execute(&self, cmd: LooperCommand) -> bool {
        !self.quantize
            || cmd.is_immediate()
            || matches!(self.state, LooperState::Stopped | LooperState::Recording)
            || !self.has_loop
            || self.position == 0
    }

    fn execute(&mut self, cmd: LooperCommand) {
        match cmd {
            LooperCommand::None => {}
            LooperCommand::StartRecording => {
                self.state = LooperState::Recording;
                self.position = 0;
                self.loop_length = 0;
                self.has_loop = false;
                self.has_undo = false;
                self.start_window();
            }
            LooperCommand::StopRecording => {
                if self.state == LooperState::Recording && self.loop_length > 0 {
                    self.state = LooperState::Playing;
                    self.has_loop = true;
                    self.position = 0;
                    self.start_window();
                }
            }
            LooperCommand::StartOverdub => {
                if self.has_loop
                    && matches!(self.state, LooperState::Playing | LooperState::Stopped)
                {
                    self.state = LooperState::Overdubbing;
                    self.start_window();
                    // No undo snapshot: copying the loop here would stall the audio thread
                    self.has_undo = false;
                }
            }
            LooperCommand::StopOverdub => {
                if self.state == LooperState::Overdubbing {
                    self.state = LooperState::Playing;
                    self.windowing_active = false;
                }
            }
            LooperCommand::StopPlayback => {
                if self.has_loop {
                    self.state = LooperState::Stopped;
                }
            }
            LooperCommand::ResumePlayback => {
                if self.has_loop && self.state == LooperState::Stopped {
                    self.state = LooperState::Playing;
                }
            }
            LooperCommand::Undo => {
                if self.has_undo && self.has_loop {
                    std::mem::swap(&mut self.buffer, &mut self.undo_buffer);
                    if self.state == LooperState::Overdubbing {
                        self.state = LooperState::Playing;
                    }
                    self.has_undo = false;
                }
            }
            LooperCommand::Clear => {
                self.state = LooperState::Stopped;
                self.has_loop = false;
                self.has_undo = false;
                self.loop_length = 0;
                self.position = 0;
                let dirty = (self.high_water + 1).min(self.buffer.len());
                self.buffer[..dirty].fill(0.0);
                self.undo_buffer[..dirty].fill(0.0);
                self.high_water = 0;
            }
        }
        self.pending = LooperCommand::None;
    }

    #[inline]
    fn advance_playhead(&mut self) {
        self.position += 1;
        if self.position >= self.loop_length {
            self.position = 0;
        }
    }

    /// Process one mono sample
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let cmd = self.pending;
        if cmd != LooperCommand::None && self.should_execute(cmd) {
            self.execute(cmd);
        }

        match self.state {
            LooperState::Stopped => input,
            LooperState::Recording => {
                if self.position < self.buffer.len() {
                    let window = self.next_window();
                    self.buffer[self.position] = input * window;
                    self.high_water = self.high_water.max(self.position);
                    self.position += 1;
                    self.loop_length = self.position;
                    input
                } else {
                    // Buffer full: the loop is the whole buffer
                    self.state = LooperState::Playing;
                    self.has_loop = true;
                    self.position = 0;
                    self.start_window();
                    let out = self.buffer[0];
                    self.advance_playhead();
                    out
                }
            }
            LooperState::Playing => {
                if self.loop_length == 0 {
                    return input;
                }
                let out = (self.buffer[self.position] + input).clamp(-1.0, 1.0);
                self.advance_playhead();
                out
            }
            LooperState::Overdubbing => {
                if self.loop_length == 0 {
                    return input;
                }
                let gain = OVERDUB_INPUT * self.next_window();
                let mixed = (self.buffer[self.position] * OVERDUB_FEEDBACK + input * gain)
                    .clamp(-1.0, 1.0);
                self.buffer[self.position] = mixed;
                self.advance_playhead();
                mixed
            }
        }
    }

    /// Process a block of mono samples
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process_sample(x);
        }
    }
}
