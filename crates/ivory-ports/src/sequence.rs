use crate::midi::ShortMessage;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEvent {
    pub tick: Tick,
    pub message: ShortMessage,
}

/// A merged, tick-ordered stream of short messages ready for a sequencer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub ppq: u16,
    pub tempo_map: Vec<TempoPoint>,
    pub events: Vec<SequenceEvent>,
}

#[derive(thiserror::Error, Debug)]
pub enum SequenceError {
    #[error("resolution must be positive")]
    InvalidResolution,
    #[error("tempo at tick {tick} must be positive")]
    InvalidTempo { tick: Tick },
    #[error("event {index} has negative tick {tick}")]
    NegativeTick { index: usize, tick: Tick },
    #[error("event {index}: {reason}")]
    InvalidMessage { index: usize, reason: String },
}

impl Sequence {
    pub fn new(ppq: u16) -> Self {
        Self {
            ppq,
            tempo_map: vec![TempoPoint {
                tick: 0,
                us_per_quarter: DEFAULT_US_PER_QUARTER,
            }],
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, tick: Tick, message: ShortMessage) {
        self.events.push(SequenceEvent { tick, message });
    }

    pub fn set_tempo(&mut self, tick: Tick, us_per_quarter: u32) {
        self.tempo_map.retain(|point| point.tick != tick);
        self.tempo_map.push(TempoPoint {
            tick,
            us_per_quarter,
        });
        self.tempo_map.sort_by_key(|point| point.tick);
    }

    pub fn end_tick(&self) -> Tick {
        self.events.iter().map(|event| event.tick).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn validate(&self) -> Result<(), SequenceError> {
        if self.ppq == 0 {
            return Err(SequenceError::InvalidResolution);
        }
        if let Some(point) = self.tempo_map.iter().find(|p| p.us_per_quarter == 0) {
            return Err(SequenceError::InvalidTempo { tick: point.tick });
        }
        for (index, event) in self.events.iter().enumerate() {
            if event.tick < 0 {
                return Err(SequenceError::NegativeTick {
                    index,
                    tick: event.tick,
                });
            }
            event
                .message
                .validate()
                .map_err(|e| SequenceError::InvalidMessage {
                    index,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}
