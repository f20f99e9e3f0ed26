use crate::sequence::{Sequence, SequenceError};

#[derive(thiserror::Error, Debug)]
pub enum SequencerError {
    #[error("sequencer unavailable: {0}")]
    Unavailable(String),
    #[error("sequencer is not open")]
    NotOpen,
    #[error("no sequence loaded")]
    NoSequence,
    #[error("invalid sequence: {0}")]
    InvalidSequence(#[from] SequenceError),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Plays a loaded sequence in the background.
///
/// Lifecycle mirrors a hardware sequencer: open, load, start, stop, close.
/// Closing forgets the loaded sequence.
pub trait SequencerPort: Send {
    fn open(&mut self) -> Result<(), SequencerError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;

    fn set_sequence(&mut self, sequence: Sequence) -> Result<(), SequencerError>;
    /// Number of extra passes after the first; 0 plays once.
    fn set_loop_count(&mut self, count: u32);

    fn start(&mut self) -> Result<(), SequencerError>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}
