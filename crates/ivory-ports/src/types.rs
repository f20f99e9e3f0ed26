use serde::{Deserialize, Serialize};
use std::fmt;

pub type Tick = i64; // musical time, monotonic in a sequence
pub type SampleTime = u64; // audio sample index, monotonic while stream running

pub const NUM_PROGRAMS: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiOutputDevice {
    pub id: DeviceId,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioOutputDevice {
    pub id: DeviceId,
    pub name: String,
    pub default_config: AudioConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16, // fixed 2
    pub buffer_size_frames: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            channels: 2,
            buffer_size_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Volume01(pub f32);

impl Volume01 {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// General MIDI program number, always in `0..NUM_PROGRAMS`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Program(u8);

impl Program {
    pub const ACOUSTIC_GRAND_PIANO: Program = Program(0);
    pub const LAST: Program = Program((NUM_PROGRAMS - 1) as u8);

    pub fn new(value: u8) -> Option<Self> {
        if (value as usize) < NUM_PROGRAMS {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Next program, 127 wraps to 0.
    pub fn next(self) -> Self {
        if self < Self::LAST {
            Self(self.0 + 1)
        } else {
            Self::ACOUSTIC_GRAND_PIANO
        }
    }

    /// Previous program, 0 wraps to 127.
    pub fn prev(self) -> Self {
        if self.0 > 0 {
            Self(self.0 - 1)
        } else {
            Self::LAST
        }
    }
}

impl TryFrom<u8> for Program {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Program::new(value).ok_or_else(|| format!("program out of range: {}", value))
    }
}

impl From<Program> for u8 {
    fn from(program: Program) -> Self {
        program.0
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
