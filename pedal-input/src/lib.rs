//! Input handling for the pedal - footswitch gestures and console commands

mod commands;
mod gesture;

pub use commands::{parse_command, AmpControl, Command, LooperAction, ParseError};
pub use gesture::{FootswitchDecoder, LooperStatus, DOUBLE_PRESS_WINDOW_MS, HOLD_THRESHOLD_MS};
