use crate::output_connector::ConnectionState;
use ivory_ports::types::Program;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    PlayNote { pitch: u8 },
    StopNote { pitch: u8 },
    PedalDown,
    PedalUp,
    SetInstrument { program: Program },
    NextInstrument,
    PrevInstrument,
    PlayFile { path: String },
    Stop,
    Status,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid {name}: {value}")]
    InvalidArgument { name: &'static str, value: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub program: Program,
    pub instrument_name: String,
    pub synth_channel: Option<u8>,
    pub connection: ConnectionState,
    pub playing: bool,
    pub last_fault: Option<String>,
}

/// Text form, one command per line:
///
/// ```text
/// play-note <pitch> | stop-note <pitch> | pedal <down|up>
/// instrument <0-127|next|prev> | play <path> | stop | status
/// ```
impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(CommandParseError::Empty),
            "play-note" => Ok(Command::PlayNote {
                pitch: parse_u8("pitch", rest)?,
            }),
            "stop-note" => Ok(Command::StopNote {
                pitch: parse_u8("pitch", rest)?,
            }),
            "pedal" => match rest {
                "down" => Ok(Command::PedalDown),
                "up" => Ok(Command::PedalUp),
                "" => Err(CommandParseError::MissingArgument("pedal position")),
                other => Err(CommandParseError::InvalidArgument {
                    name: "pedal position",
                    value: other.to_string(),
                }),
            },
            "instrument" => match rest {
                "next" | "+" => Ok(Command::NextInstrument),
                "prev" | "-" => Ok(Command::PrevInstrument),
                value => {
                    let raw = parse_u8("program", value)?;
                    let program =
                        Program::new(raw).ok_or_else(|| CommandParseError::InvalidArgument {
                            name: "program",
                            value: value.to_string(),
                        })?;
                    Ok(Command::SetInstrument { program })
                }
            },
            "play" => {
                if rest.is_empty() {
                    return Err(CommandParseError::MissingArgument("path"));
                }
                Ok(Command::PlayFile {
                    path: rest.to_string(),
                })
            }
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            _ => Err(CommandParseError::Unknown(verb.to_string())),
        }
    }
}

fn parse_u8(name: &'static str, value: &str) -> Result<u8, CommandParseError> {
    if value.is_empty() {
        return Err(CommandParseError::MissingArgument(name));
    }
    value
        .parse::<u8>()
        .map_err(|_| CommandParseError::InvalidArgument {
            name,
            value: value.to_string(),
        })
}
