use ivory_domain_sequence::SequenceImportError;
use ivory_ports::midi::MidiError;
use ivory_ports::sequencer::SequencerError;
use ivory_ports::synth::SynthError;

/// A failure that was logged and swallowed instead of being returned to the caller.
///
/// The player never interrupts its caller; the most recent fault is kept so
/// degraded states stay observable.
#[derive(thiserror::Error, Debug)]
pub enum Fault {
    #[error("midi output unavailable: {0}")]
    OutputUnavailable(MidiError),
    #[error("invalid midi message: {0}")]
    InvalidMessage(MidiError),
    #[error("midi send failed: {0}")]
    Send(MidiError),
    #[error("cannot play midi music: {0}")]
    SequencerUnavailable(SequencerError),
    #[error("midi music data is invalid: {0}")]
    InvalidSequence(SequencerError),
    #[error("cannot load midi file: {0}")]
    SequenceLoad(SequenceImportError),
    #[error("synthesizer unavailable: {0}")]
    SynthUnavailable(SynthError),
    #[error("synthesizer dropped message: {0}")]
    SynthSend(SynthError),
}

/// Last-fault slot shared by the player components.
#[derive(Debug, Default)]
pub struct FaultSlot {
    last: Option<Fault>,
    count: u64,
}

impl FaultSlot {
    pub fn record(&mut self, fault: Fault) {
        tracing::warn!("{}", fault);
        self.count += 1;
        self.last = Some(fault);
    }

    pub fn last(&self) -> Option<&Fault> {
        self.last.as_ref()
    }

    pub fn take(&mut self) -> Option<Fault> {
        self.last.take()
    }

    /// Faults recorded since construction, including ones already taken.
    pub fn count(&self) -> u64 {
        self.count
    }
}
