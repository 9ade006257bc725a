//! Typed device commands and their JSON form.
//!
//! ```json
//! {"device": "pump", "command": "run_for_minutes", "minutes": 30}
//! {"device": "heater", "command": "reach_and_stop", "target": 28.0}
//! {"device": "light", "command": "set_color", "color": 5}
//! {"device": "light", "command": "set_color", "color": "reset"}
//! ```
use serde::{Deserialize, Serialize};

use crate::devices::color::{ColorIndex, ColorRequest};
use crate::error::CommandError;
use crate::events::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    SetOn,
    SetOff,
    RunForMinutes(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterCommand {
    SetOn,
    SetOff,
    ReachAndStop(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    SetOn,
    SetOff,
    SetColor(ColorRequest),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pump(PumpCommand),
    Heater(HeaterCommand),
    Light(LightCommand),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    SetOn,
    SetOff,
    RunForMinutes,
    ReachAndStop,
    SetColor,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::SetOn => "set_on",
            Self::SetOff => "set_off",
            Self::RunForMinutes => "run_for_minutes",
            Self::ReachAndStop => "reach_and_stop",
            Self::SetColor => "set_color",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColorArg {
    Index(u8),
    Word(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCommand {
    device: DeviceId,
    command: Action,
    #[serde(default)]
    minutes: Option<u32>,
    #[serde(default)]
    target: Option<f32>,
    #[serde(default)]
    color: Option<ColorArg>,
}

fn missing(action: Action, field: &str) -> CommandError {
    CommandError::InvalidParameter(format!("{} requires `{field}`", action.as_str()))
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let unsupported = CommandError::Unsupported {
            device: raw.device,
            command: raw.command.as_str(),
        };
        Ok(match (raw.device, raw.command) {
            (DeviceId::Pump, Action::SetOn) => Self::Pump(PumpCommand::SetOn),
            (DeviceId::Pump, Action::SetOff) => Self::Pump(PumpCommand::SetOff),
            (DeviceId::Pump, Action::RunForMinutes) => Self::Pump(PumpCommand::RunForMinutes(
                raw.minutes.ok_or_else(|| missing(raw.command, "minutes"))?,
            )),
            (DeviceId::Heater, Action::SetOn) => Self::Heater(HeaterCommand::SetOn),
            (DeviceId::Heater, Action::SetOff) => Self::Heater(HeaterCommand::SetOff),
            (DeviceId::Heater, Action::ReachAndStop) => Self::Heater(HeaterCommand::ReachAndStop(
                raw.target.ok_or_else(|| missing(raw.command, "target"))?,
            )),
            (DeviceId::Light, Action::SetOn) => Self::Light(LightCommand::SetOn),
            (DeviceId::Light, Action::SetOff) => Self::Light(LightCommand::SetOff),
            (DeviceId::Light, Action::SetColor) => {
                let request = match raw.color.ok_or_else(|| missing(raw.command, "color"))? {
                    ColorArg::Index(i) => ColorRequest::Color(ColorIndex::try_from(i)?),
                    ColorArg::Word(w) if w.eq_ignore_ascii_case("reset") => ColorRequest::Reset,
                    ColorArg::Word(w) => {
                        return Err(CommandError::InvalidParameter(format!(
                            "color must be an index in 0..=16 or \"reset\", got {w:?}"
                        )));
                    }
                };
                Self::Light(LightCommand::SetColor(request))
            }
            _ => return Err(unsupported),
        })
    }
}

impl Command {
    pub const fn device(&self) -> DeviceId {
        match self {
            Self::Pump(_) => DeviceId::Pump,
            Self::Heater(_) => DeviceId::Heater,
            Self::Light(_) => DeviceId::Light,
        }
    }
}

/// Parse one JSON command.
pub fn parse_command(json: &str) -> Result<Command, CommandError> {
    let raw: RawCommand = serde_json::from_str(json)
        .map_err(|e| CommandError::InvalidParameter(format!("malformed command: {e}")))?;
    Command::try_from(raw)
}

/// Result reported back to the command caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandReply {
    pub fn from_result(result: &Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                code: None,
                reason: None,
            },
            Err(e) => Self {
                ok: false,
                code: Some(e.code()),
                reason: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"device":"pump","command":"set_on"}"#, Command::Pump(PumpCommand::SetOn))]
    #[case(
        r#"{"device":"pump","command":"run_for_minutes","minutes":30}"#,
        Command::Pump(PumpCommand::RunForMinutes(30))
    )]
    #[case(
        r#"{"device":"heater","command":"reach_and_stop","target":28.5}"#,
        Command::Heater(HeaterCommand::ReachAndStop(28.5))
    )]
    #[case(
        r#"{"device":"light","command":"set_color","color":16}"#,
        Command::Light(LightCommand::SetColor(ColorRequest::Color(ColorIndex::new(16).unwrap())))
    )]
    #[case(
        r#"{"device":"light","command":"set_color","color":"reset"}"#,
        Command::Light(LightCommand::SetColor(ColorRequest::Reset))
    )]
    fn parses_commands(#[case] json: &str, #[case] expected: Command) {
        assert_eq!(parse_command(json).unwrap(), expected);
    }

    #[rstest]
    #[case(r#"{"device":"pump","command":"reach_and_stop","target":28.0}"#, "unsupported_command")]
    #[case(r#"{"device":"pump","command":"run_for_minutes"}"#, "invalid_parameter")]
    #[case(r#"{"device":"light","command":"set_color","color":17}"#, "invalid_parameter")]
    #[case(r#"{"device":"light","command":"set_color","color":"blue"}"#, "invalid_parameter")]
    #[case(r#"{"device":"pool","command":"set_on"}"#, "invalid_parameter")]
    #[case(r#"not json"#, "invalid_parameter")]
    fn rejects_bad_commands(#[case] json: &str, #[case] code: &str) {
        assert_eq!(parse_command(json).unwrap_err().code(), code);
    }

    #[test]
    fn reply_carries_code_and_reason() {
        let r = CommandReply::from_result(&Err(CommandError::InterlockViolation("heater requires the pump to be on")));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(
            json,
            r#"{"ok":false,"code":"interlock_violation","reason":"interlock violation: heater requires the pump to be on"}"#
        );
        let ok = serde_json::to_string(&CommandReply::from_result(&Ok(()))).unwrap();
        assert_eq!(ok, r#"{"ok":true}"#);
    }
}
