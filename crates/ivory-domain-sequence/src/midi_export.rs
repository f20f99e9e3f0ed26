use ivory_ports::midi::ShortMessage;
use ivory_ports::sequence::Sequence;
use ivory_ports::types::Tick;
use midly::num::{u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum SequenceExportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
}

pub fn export_midi_path(sequence: &Sequence, path: &Path) -> Result<(), SequenceExportError> {
    let data = export_midi_bytes(sequence)?;
    std::fs::write(path, data).map_err(|e| SequenceExportError::Io(e.to_string()))
}

pub fn export_midi_bytes(sequence: &Sequence) -> Result<Vec<u8>, SequenceExportError> {
    sequence
        .validate()
        .map_err(|e| SequenceExportError::InvalidSequence(e.to_string()))?;

    let mut events = build_events(sequence);
    // Stable sort keeps source order among simultaneous channel events.
    events.sort_by_key(|event| (event.tick, !matches!(event.kind, TrackEventKind::Meta(_))));

    let mut track_events = Vec::with_capacity(events.len() + 1);
    let mut last_tick: Tick = 0;
    for event in events {
        let delta = (event.tick - last_tick).max(0) as u32;
        last_tick = event.tick;
        track_events.push(TrackEvent {
            delta: u28::new(delta),
            kind: event.kind,
        });
    }

    track_events.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(sequence.ppq.into()),
        },
        tracks: vec![track_events],
    };

    let mut data = Vec::new();
    smf.write(&mut data)
        .map_err(|e| SequenceExportError::Io(e.to_string()))?;
    Ok(data)
}

struct TimedKind {
    tick: Tick,
    kind: TrackEventKind<'static>,
}

fn build_events(sequence: &Sequence) -> Vec<TimedKind> {
    let mut events = Vec::with_capacity(sequence.tempo_map.len() + sequence.events.len());

    for tempo in &sequence.tempo_map {
        events.push(TimedKind {
            tick: tempo.tick,
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo.us_per_quarter))),
        });
    }

    for event in &sequence.events {
        events.push(TimedKind {
            tick: event.tick,
            kind: TrackEventKind::Midi {
                channel: u4::new(event.message.channel()),
                message: to_midly(&event.message),
            },
        });
    }

    events
}

fn to_midly(message: &ShortMessage) -> MidiMessage {
    match *message {
        ShortMessage::NoteOn { note, velocity, .. } => MidiMessage::NoteOn {
            key: u7::new(note),
            vel: u7::new(velocity),
        },
        ShortMessage::NoteOff { note, velocity, .. } => MidiMessage::NoteOff {
            key: u7::new(note),
            vel: u7::new(velocity),
        },
        ShortMessage::ControlChange {
            controller, value, ..
        } => MidiMessage::Controller {
            controller: u7::new(controller),
            value: u7::new(value),
        },
        ShortMessage::ProgramChange { program, .. } => MidiMessage::ProgramChange {
            program: u7::new(program),
        },
    }
}
