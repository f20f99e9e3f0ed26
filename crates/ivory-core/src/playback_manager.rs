use crate::command::{Command, StatusReport};
use crate::fault::{Fault, FaultSlot};
use crate::instruments::InstrumentNameTable;
use crate::output_connector::OutputPortConnector;
use ivory_domain_sequence::import_midi_path;
use ivory_ports::midi::{MidiError, ShortMessage, SUSTAIN_PEDAL};
use ivory_ports::sequence::Sequence;
use ivory_ports::sequencer::{SequencerError, SequencerPort};
use ivory_ports::synth::{SynthError, Synthesizer};
use ivory_ports::types::Program;
use std::path::Path;
use std::sync::Arc;

pub const SYNTH_NOTE_VELOCITY: u8 = 120;
pub const SYNTH_NOTE_OFF_VELOCITY: u8 = 127;
pub const SYNTH_INSTRUMENT: Program = Program::ACOUSTIC_GRAND_PIANO;
pub const PEDAL_ON: u8 = 127;
pub const PEDAL_OFF: u8 = 0;

// The external receiver listens on channel 0 and expects note-off velocity 0,
// independent of the local channel.
pub const MIRROR_CHANNEL: u8 = 0;
pub const MIRROR_NOTE_OFF_VELOCITY: u8 = 0;

struct SynthOutput {
    synth: Box<dyn Synthesizer>,
    channel: u8,
}

/// Owns local synthesis and sequence playback, and mirrors live notes to
/// the external output connector.
///
/// Every operation is fire-and-forget: failures are logged and kept as the
/// last fault instead of being returned.
pub struct PlaybackManager {
    sequencer: Option<Box<dyn SequencerPort>>,
    synth: Option<SynthOutput>,
    connector: OutputPortConnector,
    instruments: Arc<InstrumentNameTable>,
    program: Program,
    faults: FaultSlot,
}

impl PlaybackManager {
    pub fn new(
        mut sequencer: Box<dyn SequencerPort>,
        mut synth: Box<dyn Synthesizer>,
        connector: OutputPortConnector,
        instruments: Arc<InstrumentNameTable>,
    ) -> Self {
        let mut faults = FaultSlot::default();

        let sequencer = match sequencer.open() {
            Ok(()) => Some(sequencer),
            Err(err) => {
                faults.record(Fault::SequencerUnavailable(err));
                None
            }
        };

        let synth = match synth.open() {
            Ok(()) => match synth.channel_count() {
                0 => {
                    faults.record(Fault::SynthUnavailable(SynthError::Unavailable(
                        "synthesizer has no channels".to_string(),
                    )));
                    synth.close();
                    None
                }
                count => Some(SynthOutput {
                    synth,
                    channel: count - 1,
                }),
            },
            Err(err) => {
                faults.record(Fault::SynthUnavailable(err));
                None
            }
        };

        let mut manager = Self {
            sequencer,
            synth,
            connector,
            instruments,
            program: SYNTH_INSTRUMENT,
            faults,
        };
        manager.set_synth_instrument(SYNTH_INSTRUMENT);
        manager
    }

    /// Replaces whatever is playing with `sequence`, played once.
    pub fn play(&mut self, sequence: Sequence) {
        let Some(sequencer) = self.sequencer.as_mut() else {
            return;
        };
        sequencer.stop();
        sequencer.close();
        if let Err(err) = sequencer.open() {
            self.faults.record(Fault::SequencerUnavailable(err));
            return;
        }

        if let Err(err) = sequencer.set_sequence(sequence) {
            self.faults.record(Fault::InvalidSequence(err));
            return;
        }
        sequencer.set_loop_count(0);
        if let Err(err) = sequencer.start() {
            let fault = match err {
                SequencerError::InvalidSequence(_) | SequencerError::NoSequence => {
                    Fault::InvalidSequence(err)
                }
                other => Fault::SequencerUnavailable(other),
            };
            self.faults.record(fault);
        }
    }

    pub fn play_file(&mut self, path: &Path) {
        match import_midi_path(path) {
            Ok(sequence) => {
                tracing::info!(path = %path.display(), "playing midi file");
                self.play(sequence);
            }
            Err(err) => self.faults.record(Fault::SequenceLoad(err)),
        }
    }

    pub fn stop(&mut self) {
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sequencer
            .as_ref()
            .map_or(false, |sequencer| sequencer.is_running())
    }

    pub fn can_play_sequences(&self) -> bool {
        self.sequencer.is_some()
    }

    pub fn play_note(&mut self, pitch: u8) {
        self.send_local(|channel| ShortMessage::note_on(channel, pitch, SYNTH_NOTE_VELOCITY));
        self.connector
            .send_note_on(MIRROR_CHANNEL, pitch, SYNTH_NOTE_VELOCITY);
    }

    pub fn stop_note(&mut self, pitch: u8) {
        self.send_local(|channel| ShortMessage::note_off(channel, pitch, SYNTH_NOTE_OFF_VELOCITY));
        self.connector
            .send_note_off(MIRROR_CHANNEL, pitch, MIRROR_NOTE_OFF_VELOCITY);
    }

    pub fn pedal_down(&mut self) {
        self.send_local(|channel| ShortMessage::control_change(channel, SUSTAIN_PEDAL, PEDAL_ON));
    }

    pub fn pedal_up(&mut self) {
        self.send_local(|channel| ShortMessage::control_change(channel, SUSTAIN_PEDAL, PEDAL_OFF));
    }

    pub fn set_synth_instrument(&mut self, program: Program) {
        self.program = program;
        self.send_local(|channel| ShortMessage::program_change(channel, program));
    }

    pub fn dec_synth_instrument(&mut self) {
        self.set_synth_instrument(self.program.prev());
    }

    pub fn inc_synth_instrument(&mut self) {
        self.set_synth_instrument(self.program.next());
    }

    pub fn synth_instrument(&self) -> Program {
        self.program
    }

    pub fn instrument_name(&self) -> &str {
        self.instruments.name(self.program)
    }

    pub fn instruments(&self) -> &InstrumentNameTable {
        &self.instruments
    }

    /// Active local channel, `None` when the synthesizer could not be opened.
    pub fn synth_channel(&self) -> Option<u8> {
        self.synth.as_ref().map(|output| output.channel)
    }

    pub fn connector(&self) -> &OutputPortConnector {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut OutputPortConnector {
        &mut self.connector
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.faults.last()
    }

    pub fn take_last_fault(&mut self) -> Option<Fault> {
        self.faults.take()
    }

    pub fn handle_command(&mut self, command: Command) -> Option<StatusReport> {
        match command {
            Command::PlayNote { pitch } => self.play_note(pitch),
            Command::StopNote { pitch } => self.stop_note(pitch),
            Command::PedalDown => self.pedal_down(),
            Command::PedalUp => self.pedal_up(),
            Command::SetInstrument { program } => self.set_synth_instrument(program),
            Command::NextInstrument => self.inc_synth_instrument(),
            Command::PrevInstrument => self.dec_synth_instrument(),
            Command::PlayFile { path } => self.play_file(Path::new(&path)),
            Command::Stop => self.stop(),
            Command::Status => return Some(self.status()),
        }
        None
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            program: self.program,
            instrument_name: self.instrument_name().to_string(),
            synth_channel: self.synth_channel(),
            connection: self.connector.state().clone(),
            playing: self.is_playing(),
            last_fault: self
                .faults
                .last()
                .or_else(|| self.connector.last_fault())
                .map(|fault| fault.to_string()),
        }
    }

    /// Stops playback and releases the sequencer and synthesizer. Safe to call twice.
    pub fn shutdown(&mut self) {
        if let Some(mut sequencer) = self.sequencer.take() {
            sequencer.stop();
            sequencer.close();
        }
        if let Some(mut output) = self.synth.take() {
            output.synth.close();
        }
    }

    fn send_local(&mut self, build: impl FnOnce(u8) -> Result<ShortMessage, MidiError>) {
        let Some(output) = self.synth.as_mut() else {
            return;
        };
        let result = match build(output.channel) {
            Ok(message) => output.synth.send(message),
            Err(err) => {
                self.faults.record(Fault::InvalidMessage(err));
                return;
            }
        };
        if let Err(err) = result {
            self.faults.record(Fault::SynthSend(err));
        }
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
