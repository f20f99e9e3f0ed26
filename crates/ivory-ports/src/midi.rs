use crate::types::*;
use serde::{Deserialize, Serialize};

pub const NUM_CHANNELS: u8 = 16;
pub const SUSTAIN_PEDAL: u8 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    NoteOff,
    NoteOn,
    ControlChange,
    ProgramChange,
}

impl Command {
    pub fn status_nibble(self) -> u8 {
        match self {
            Command::NoteOff => 0x80,
            Command::NoteOn => 0x90,
            Command::ControlChange => 0xB0,
            Command::ProgramChange => 0xC0,
        }
    }
}

/// Channel voice message with 7-bit data. Construct through the checked
/// constructors so channel and data bytes stay in range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShortMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

/// Wire form of a short message: status plus one or two data bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMessage {
    bytes: [u8; 3],
    len: usize,
}

impl RawMessage {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl ShortMessage {
    pub fn new(command: Command, channel: u8, data1: u8, data2: u8) -> Result<Self, MidiError> {
        let message = match command {
            Command::NoteOff => ShortMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            },
            Command::NoteOn => ShortMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            Command::ControlChange => ShortMessage::ControlChange {
                channel,
                controller: data1,
                value: data2,
            },
            Command::ProgramChange => ShortMessage::ProgramChange {
                channel,
                program: data1,
            },
        };
        message.validate()?;
        Ok(message)
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<Self, MidiError> {
        Self::new(Command::NoteOn, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Result<Self, MidiError> {
        Self::new(Command::NoteOff, channel, note, velocity)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Result<Self, MidiError> {
        Self::new(Command::ControlChange, channel, controller, value)
    }

    pub fn program_change(channel: u8, program: Program) -> Result<Self, MidiError> {
        Self::new(Command::ProgramChange, channel, program.get(), 0)
    }

    pub fn command(&self) -> Command {
        match self {
            ShortMessage::NoteOff { .. } => Command::NoteOff,
            ShortMessage::NoteOn { .. } => Command::NoteOn,
            ShortMessage::ControlChange { .. } => Command::ControlChange,
            ShortMessage::ProgramChange { .. } => Command::ProgramChange,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            ShortMessage::NoteOff { channel, .. }
            | ShortMessage::NoteOn { channel, .. }
            | ShortMessage::ControlChange { channel, .. }
            | ShortMessage::ProgramChange { channel, .. } => channel,
        }
    }

    pub fn status(&self) -> u8 {
        self.command().status_nibble() | (self.channel() & 0x0F)
    }

    fn data(&self) -> (u8, Option<u8>) {
        match *self {
            ShortMessage::NoteOff { note, velocity, .. }
            | ShortMessage::NoteOn { note, velocity, .. } => (note, Some(velocity)),
            ShortMessage::ControlChange {
                controller, value, ..
            } => (controller, Some(value)),
            ShortMessage::ProgramChange { program, .. } => (program, None),
        }
    }

    pub fn validate(&self) -> Result<(), MidiError> {
        let channel = self.channel();
        if channel >= NUM_CHANNELS {
            return Err(MidiError::InvalidMessage(format!(
                "channel out of range: {}",
                channel
            )));
        }
        let (data1, data2) = self.data();
        if data1 > 0x7F {
            return Err(MidiError::InvalidMessage(format!(
                "data byte 1 out of range: {}",
                data1
            )));
        }
        if let Some(data2) = data2 {
            if data2 > 0x7F {
                return Err(MidiError::InvalidMessage(format!(
                    "data byte 2 out of range: {}",
                    data2
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> RawMessage {
        let (data1, data2) = self.data();
        match data2 {
            Some(data2) => RawMessage {
                bytes: [self.status(), data1, data2],
                len: 3,
            },
            None => RawMessage {
                bytes: [self.status(), data1, 0],
                len: 2,
            },
        }
    }

    /// Decodes a wire message. Running status and non-voice messages are not supported.
    pub fn parse(message: &[u8]) -> Option<Self> {
        let status = *message.first()?;
        let channel = status & 0x0F;
        let data1 = *message.get(1)?;
        let command = match status & 0xF0 {
            0x80 => Command::NoteOff,
            0x90 => Command::NoteOn,
            0xB0 => Command::ControlChange,
            0xC0 => return Self::new(Command::ProgramChange, channel, data1, 0).ok(),
            _ => return None,
        };
        let data2 = *message.get(2)?;
        Self::new(command, channel, data1, data2).ok()
    }
}

/// Open connection to an output device. Dropping it closes the connection.
pub trait MidiOutputSink: Send {
    fn device_name(&self) -> &str;
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError>;
}

pub trait MidiOutputPort: Send + Sync {
    fn list_outputs(&self) -> Result<Vec<MidiOutputDevice>, MidiError>;

    fn open_output(&self, device_id: &DeviceId) -> Result<Box<dyn MidiOutputSink>, MidiError>;

    /// The platform's fallback route when no named device is configured or found.
    fn open_default_output(&self) -> Result<Box<dyn MidiOutputSink>, MidiError>;
}
