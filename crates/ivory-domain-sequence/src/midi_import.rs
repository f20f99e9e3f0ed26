use ivory_ports::midi::ShortMessage;
use ivory_ports::sequence::{Sequence, SequenceEvent, TempoPoint, DEFAULT_US_PER_QUARTER};
use ivory_ports::types::{Program, Tick};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum SequenceImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

pub fn import_midi_path(path: &Path) -> Result<Sequence, SequenceImportError> {
    let data = std::fs::read(path).map_err(|e| SequenceImportError::Io(e.to_string()))?;
    import_midi_bytes(&data)
}

pub fn import_midi_bytes(data: &[u8]) -> Result<Sequence, SequenceImportError> {
    let smf = Smf::parse(data).map_err(|e| SequenceImportError::Parse(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };

    let mut tempo_points: BTreeMap<Tick, u32> = BTreeMap::new();
    let mut events: Vec<SequenceEvent> = Vec::new();

    for track in &smf.tracks {
        let mut tick: Tick = 0;
        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi { channel, message } => {
                    if let Some(message) = convert_message(channel.as_int(), message) {
                        events.push(SequenceEvent { tick, message });
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    tempo_points.insert(tick, us_per_quarter.as_int());
                }
                _ => {}
            }
        }
    }

    sort_events(&mut events);
    let events = sanitize_note_pairs(ppq, events);
    tracing::debug!(ppq, events = events.len(), "imported midi sequence");

    Ok(Sequence {
        ppq,
        tempo_map: build_tempo_map(tempo_points, tempo_override),
        events,
    })
}

fn convert_message(channel: u8, message: &MidiMessage) -> Option<ShortMessage> {
    match *message {
        MidiMessage::NoteOn { key, vel } => {
            let note = key.as_int();
            if vel.as_int() == 0 {
                ShortMessage::note_off(channel, note, 0).ok()
            } else {
                ShortMessage::note_on(channel, note, vel.as_int()).ok()
            }
        }
        MidiMessage::NoteOff { key, vel } => {
            ShortMessage::note_off(channel, key.as_int(), vel.as_int()).ok()
        }
        MidiMessage::Controller { controller, value } => {
            ShortMessage::control_change(channel, controller.as_int(), value.as_int()).ok()
        }
        MidiMessage::ProgramChange { program } => {
            let program = Program::new(program.as_int())?;
            ShortMessage::program_change(channel, program).ok()
        }
        _ => None,
    }
}

/// Orders simultaneous events so that programs and pedal-down come first,
/// note-offs precede note-ons, and pedal-up comes last.
fn message_rank(message: &ShortMessage) -> u8 {
    match message {
        ShortMessage::ProgramChange { .. } => 0,
        ShortMessage::ControlChange { value, .. } => {
            if *value >= 64 {
                1
            } else {
                4
            }
        }
        ShortMessage::NoteOff { .. } => 2,
        ShortMessage::NoteOn { .. } => 3,
    }
}

fn message_note_key(message: &ShortMessage) -> (u8, u8) {
    match *message {
        ShortMessage::NoteOn { channel, note, .. } | ShortMessage::NoteOff { channel, note, .. } => {
            (channel, note)
        }
        ShortMessage::ControlChange { channel, .. } | ShortMessage::ProgramChange { channel, .. } => {
            (channel, 0)
        }
    }
}

fn sort_events(events: &mut [SequenceEvent]) {
    events.sort_by(|a, b| {
        a.tick
            .cmp(&b.tick)
            .then_with(|| message_rank(&a.message).cmp(&message_rank(&b.message)))
            .then_with(|| message_note_key(&a.message).cmp(&message_note_key(&b.message)))
    });
}

fn build_tempo_map(
    tempo_points: BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> Vec<TempoPoint> {
    if let Some(us_per_quarter) = override_us_per_quarter {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }

    let mut map: Vec<TempoPoint> = tempo_points
        .into_iter()
        .filter(|(_, us_per_quarter)| *us_per_quarter > 0)
        .map(|(tick, us_per_quarter)| TempoPoint {
            tick,
            us_per_quarter,
        })
        .collect();

    if map.first().map_or(true, |point| point.tick != 0) {
        map.insert(
            0,
            TempoPoint {
                tick: 0,
                us_per_quarter: DEFAULT_US_PER_QUARTER,
            },
        );
    }

    map
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}

fn sanitize_note_pairs(ppq: u16, events: Vec<SequenceEvent>) -> Vec<SequenceEvent> {
    if events.is_empty() {
        return events;
    }

    let default_len: Tick = ppq.max(1) as Tick;
    let mut out: Vec<SequenceEvent> = Vec::with_capacity(events.len() + 64);
    // Sounding-note counts per channel and key.
    let mut active = [[0u8; 128]; 16];
    let mut last_tick: Tick = 0;

    for event in events {
        last_tick = last_tick.max(event.tick);
        match event.message {
            ShortMessage::NoteOn { channel, note, .. } => {
                let slot = &mut active[channel as usize][note as usize];
                for _ in 0..*slot {
                    out.push(SequenceEvent {
                        tick: event.tick,
                        message: ShortMessage::NoteOff {
                            channel,
                            note,
                            velocity: 0,
                        },
                    });
                }
                *slot = 1;
                out.push(event);
            }
            ShortMessage::NoteOff { channel, note, .. } => {
                let slot = &mut active[channel as usize][note as usize];
                if *slot == 0 {
                    continue;
                }
                *slot -= 1;
                out.push(event);
            }
            ShortMessage::ControlChange { .. } | ShortMessage::ProgramChange { .. } => {
                out.push(event)
            }
        }
    }

    let end_tick = last_tick.saturating_add(default_len);
    for (channel, notes) in active.iter().enumerate() {
        for (note, count) in notes.iter().copied().enumerate() {
            for _ in 0..count {
                out.push(SequenceEvent {
                    tick: end_tick,
                    message: ShortMessage::NoteOff {
                        channel: channel as u8,
                        note: note as u8,
                        velocity: 0,
                    },
                });
            }
        }
    }

    sort_events(&mut out);
    out
}
