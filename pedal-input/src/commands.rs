//! Text commands for the pedal console

use pedal_audio::{AmpModel, EffectType, LooperCommand, LooperState, SLIDER_MAX};
use thiserror::Error;

/// Amp control addressed by `amp <control> <value>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmpControl {
    Model(AmpModel),
    Gain(f32),
    Bass(f32),
    Mid(f32),
    Treble(f32),
    Presence(f32),
    Master(f32),
}

/// Looper transport as typed by the operator. Resolved against the
/// current looper state by [`LooperAction::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooperAction {
    Record,
    Stop,
    Overdub,
    Undo,
    Clear,
    Play,
}

impl LooperAction {
    pub fn resolve(self, state: LooperState) -> LooperCommand {
        match (self, state) {
            (LooperAction::Record, LooperState::Recording) => LooperCommand::StopRecording,
            (LooperAction::Record, _) => LooperCommand::StartRecording,
            (LooperAction::Stop, LooperState::Recording) => LooperCommand::StopRecording,
            (LooperAction::Stop, LooperState::Overdubbing) => LooperCommand::StopOverdub,
            (LooperAction::Stop, _) => LooperCommand::StopPlayback,
            (LooperAction::Overdub, LooperState::Overdubbing) => LooperCommand::StopOverdub,
            (LooperAction::Overdub, _) => LooperCommand::StartOverdub,
            (LooperAction::Undo, _) => LooperCommand::Undo,
            (LooperAction::Clear, _) => LooperCommand::Clear,
            (LooperAction::Play, _) => LooperCommand::ResumePlayback,
        }
    }
}

/// Commands that can be dispatched from the console
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Chain
    AddEffect(EffectType),
    RemoveEffect(usize),
    ToggleEffect(usize),
    SetParam { index: usize, param: usize, slider: u8 },

    // Amp / cabinet / gate
    Amp(AmpControl),
    CabinetEnabled(bool),
    CabinetSelect(usize),
    GateEnabled(bool),
    GateThreshold(f32),
    GateRatio(f32),

    // Levels (0.0 - 1.0, looper mix up to 2.0)
    InputGain(f32),
    OutputLevel(f32),
    LooperMix(f32),

    // Looper
    Looper(LooperAction),
    /// Short footswitch press
    Tap,
    /// Footswitch held past the hold threshold
    Hold,

    // Presets
    LoadPreset(usize),
    SavePreset(usize),

    // Application
    ToggleBypass,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("slider value {0} out of range (0-100)")]
    SliderOutOfRange(u32),
    #[error("unknown effect: {0}")]
    UnknownEffect(String),
    #[error("unknown amp model: {0}")]
    UnknownAmpModel(String),
    #[error("unknown amp control: {0}")]
    UnknownAmpControl(String),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

fn arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<&'a str, ParseError> {
    words.next().ok_or(ParseError::MissingArgument(name))
}

fn number<T: std::str::FromStr>(text: &str) -> Result<T, ParseError> {
    text.parse()
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

fn on_off(text: &str) -> Option<bool> {
    match text {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn parse_amp<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<AmpControl, ParseError> {
    let control = arg(words, "amp control")?;
    let value = arg(words, "value")?;
    if control == "model" {
        return AmpModel::from_name(value)
            .map(AmpControl::Model)
            .ok_or_else(|| ParseError::UnknownAmpModel(value.to_string()));
    }

    let v: f32 = number(value)?;
    Ok(match control {
        "gain" => AmpControl::Gain(v),
        "bass" => AmpControl::Bass(v),
        "mid" => AmpControl::Mid(v),
        "treble" => AmpControl::Treble(v),
        "presence" => AmpControl::Presence(v),
        "master" => AmpControl::Master(v),
        other => return Err(ParseError::UnknownAmpControl(other.to_string())),
    })
}

/// Parse one console line
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let lowered = line.trim().to_ascii_lowercase();
    let mut words = lowered.split_whitespace();
    let head = words.next().ok_or(ParseError::Empty)?;

    let cmd = match head {
        "add" => {
            let name = arg(&mut words, "effect")?;
            EffectType::from_name(name)
                .map(Command::AddEffect)
                .ok_or_else(|| ParseError::UnknownEffect(name.to_string()))?
        }
        "rm" | "remove" => Command::RemoveEffect(number(arg(&mut words, "index")?)?),
        "toggle" => Command::ToggleEffect(number(arg(&mut words, "index")?)?),
        "set" => {
            let index = number(arg(&mut words, "index")?)?;
            let param = number(arg(&mut words, "param")?)?;
            let slider: u32 = number(arg(&mut words, "slider")?)?;
            if slider > SLIDER_MAX as u32 {
                return Err(ParseError::SliderOutOfRange(slider));
            }
            Command::SetParam {
                index,
                param,
                slider: slider as u8,
            }
        }
        "amp" => Command::Amp(parse_amp(&mut words)?),
        "cab" => {
            let value = arg(&mut words, "on|off|slot")?;
            match on_off(value) {
                Some(enabled) => Command::CabinetEnabled(enabled),
                None => Command::CabinetSelect(number(value)?),
            }
        }
        "gate" => {
            let value = arg(&mut words, "on|off|thr|ratio")?;
            match value {
                "thr" => Command::GateThreshold(number(arg(&mut words, "threshold dB")?)?),
                "ratio" => Command::GateRatio(number(arg(&mut words, "ratio")?)?),
                other => on_off(other)
                    .map(Command::GateEnabled)
                    .ok_or_else(|| ParseError::UnexpectedArgument(other.to_string()))?,
            }
        }
        "in" => Command::InputGain(number(arg(&mut words, "level")?)?),
        "out" => Command::OutputLevel(number(arg(&mut words, "level")?)?),
        "mix" => Command::LooperMix(number(arg(&mut words, "level")?)?),
        "rec" => Command::Looper(LooperAction::Record),
        "stop" => Command::Looper(LooperAction::Stop),
        "dub" => Command::Looper(LooperAction::Overdub),
        "undo" => Command::Looper(LooperAction::Undo),
        "clear" => Command::Looper(LooperAction::Clear),
        "play" => Command::Looper(LooperAction::Play),
        "tap" => Command::Tap,
        "hold" => Command::Hold,
        "preset" => {
            let action = arg(&mut words, "load|save")?;
            let slot = number(arg(&mut words, "slot")?)?;
            match action {
                "load" => Command::LoadPreset(slot),
                "save" => Command::SavePreset(slot),
                other => return Err(ParseError::UnexpectedArgument(other.to_string())),
            }
        }
        "bypass" => Command::ToggleBypass,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    match words.next() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_commands() {
        assert_eq!(parse_command("add delay"), Ok(Command::AddEffect(EffectType::Delay)));
        assert_eq!(parse_command("  ADD Hall "), Ok(Command::AddEffect(EffectType::HallReverb)));
        assert_eq!(parse_command("rm 2"), Ok(Command::RemoveEffect(2)));
        assert_eq!(parse_command("toggle 0"), Ok(Command::ToggleEffect(0)));
        assert_eq!(
            parse_command("set 1 3 75"),
            Ok(Command::SetParam { index: 1, param: 3, slider: 75 })
        );
    }

    #[test]
    fn test_amp_and_gate() {
        assert_eq!(
            parse_command("amp model metal"),
            Ok(Command::Amp(AmpControl::Model(AmpModel::Metal)))
        );
        assert_eq!(parse_command("amp bass 0.8"), Ok(Command::Amp(AmpControl::Bass(0.8))));
        assert_eq!(parse_command("gate on"), Ok(Command::GateEnabled(true)));
        assert_eq!(parse_command("gate thr -45"), Ok(Command::GateThreshold(-45.0)));
        assert_eq!(parse_command("cab 3"), Ok(Command::CabinetSelect(3)));
        assert_eq!(parse_command("cab off"), Ok(Command::CabinetEnabled(false)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_command(""), Err(ParseError::Empty));
        assert_eq!(parse_command("add"), Err(ParseError::MissingArgument("effect")));
        assert_eq!(
            parse_command("add wobble"),
            Err(ParseError::UnknownEffect("wobble".to_string()))
        );
        assert_eq!(parse_command("set 0 0 101"), Err(ParseError::SliderOutOfRange(101)));
        assert_eq!(parse_command("in loud"), Err(ParseError::InvalidNumber("loud".to_string())));
        assert_eq!(
            parse_command("amp fuzz 1"),
            Err(ParseError::UnknownAmpControl("fuzz".to_string()))
        );
        assert_eq!(
            parse_command("status now"),
            Err(ParseError::UnexpectedArgument("now".to_string()))
        );
        assert!(matches!(parse_command("dance"), Err(ParseError::UnknownCommand(_))));
    }

    #[test]
    fn test_looper_action_resolution() {
        use LooperState::*;
        assert_eq!(LooperAction::Record.resolve(Stopped), LooperCommand::StartRecording);
        assert_eq!(LooperAction::Record.resolve(Recording), LooperCommand::StopRecording);
        assert_eq!(LooperAction::Stop.resolve(Overdubbing), LooperCommand::StopOverdub);
        assert_eq!(LooperAction::Stop.resolve(Playing), LooperCommand::StopPlayback);
        assert_eq!(LooperAction::Overdub.resolve(Playing), LooperCommand::StartOverdub);
        assert_eq!(LooperAction::Play.resolve(Stopped), LooperCommand::ResumePlayback);
    }

    #[test]
    fn test_presets_and_misc() {
        assert_eq!(parse_command("preset load 4"), Ok(Command::LoadPreset(4)));
        assert_eq!(parse_command("preset save 0"), Ok(Command::SavePreset(0)));
        assert_eq!(parse_command("bypass"), Ok(Command::ToggleBypass));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert_eq!(parse_command("mix 1.5"), Ok(Command::LooperMix(1.5)));
    }
}
