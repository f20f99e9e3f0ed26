mod common;

use common::{
    FakeMidiOutputPort, FakeSequencer, FakeSynthesizer, RecordingSynthPort, SentLog,
    SequencerCall, SynthTap,
};
use ivory_core::{
    Command, ConnectionState, Fault, InstrumentNameTable, OutputPortConnector, PlaybackManager,
    ThreadSequencer,
};
use ivory_ports::midi::ShortMessage;
use ivory_ports::sequence::Sequence;
use ivory_ports::types::Program;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DEVICE: &str = "loopMIDI Port 2";

struct Rig {
    manager: PlaybackManager,
    synth: SynthTap,
    sequencer_calls: Arc<Mutex<Vec<SequencerCall>>>,
    sent: SentLog,
}

fn rig() -> Rig {
    rig_with(|_, _| {})
}

fn rig_with(configure: impl FnOnce(&mut FakeSequencer, &mut FakeSynthesizer)) -> Rig {
    let (mut sequencer, sequencer_calls, _) = FakeSequencer::new();
    let (mut synth, tap) = FakeSynthesizer::new();
    configure(&mut sequencer, &mut synth);

    let port = FakeMidiOutputPort::with_devices(&[DEVICE]);
    let sent = Arc::clone(&port.sent);
    let instruments = InstrumentNameTable::from_reader(Cursor::new("Piano\nGuitar\nBass\n"));

    let manager = PlaybackManager::new(
        Box::new(sequencer),
        Box::new(synth),
        OutputPortConnector::new(Box::new(port), DEVICE),
        Arc::new(instruments),
    );
    Rig {
        manager,
        synth: tap,
        sequencer_calls,
        sent,
    }
}

fn program(value: u8) -> Program {
    Program::new(value).expect("program in range")
}

fn one_note_sequence() -> Sequence {
    let mut sequence = Sequence::new(480);
    sequence.push(0, ShortMessage::note_on(0, 60, 100).expect("valid"));
    sequence.push(480, ShortMessage::note_off(0, 60, 0).expect("valid"));
    sequence
}

#[test]
fn construction_selects_piano_on_last_channel() {
    let rig = rig();

    assert_eq!(rig.manager.synth_channel(), Some(15));
    assert_eq!(rig.manager.synth_instrument(), Program::ACOUSTIC_GRAND_PIANO);
    assert_eq!(rig.manager.instrument_name(), "Piano");
    assert_eq!(
        rig.synth.messages.lock().as_slice(),
        &[ShortMessage::ProgramChange {
            channel: 15,
            program: 0
        }]
    );
    assert_eq!(rig.sequencer_calls.lock().as_slice(), &[SequencerCall::Open]);
}

#[test]
fn play_note_sounds_locally_and_mirrors_on_channel_zero() {
    let mut rig = rig();
    rig.synth.messages.lock().clear();

    rig.manager.play_note(60);

    assert_eq!(
        rig.synth.messages.lock().as_slice(),
        &[ShortMessage::NoteOn {
            channel: 15,
            note: 60,
            velocity: 120
        }]
    );
    assert_eq!(
        rig.sent.lock().as_slice(),
        &[(DEVICE.to_string(), vec![0x90, 60, 120])]
    );
}

#[test]
fn stop_note_uses_different_release_velocities() {
    let mut rig = rig();
    rig.synth.messages.lock().clear();

    rig.manager.stop_note(60);

    assert_eq!(
        rig.synth.messages.lock().as_slice(),
        &[ShortMessage::NoteOff {
            channel: 15,
            note: 60,
            velocity: 127
        }]
    );
    assert_eq!(
        rig.sent.lock().as_slice(),
        &[(DEVICE.to_string(), vec![0x80, 60, 0])]
    );
}

#[test]
fn pedal_is_local_only() {
    let mut rig = rig();
    rig.synth.messages.lock().clear();

    rig.manager.pedal_down();
    rig.manager.pedal_up();

    assert_eq!(
        rig.synth.messages.lock().as_slice(),
        &[
            ShortMessage::ControlChange {
                channel: 15,
                controller: 64,
                value: 127
            },
            ShortMessage::ControlChange {
                channel: 15,
                controller: 64,
                value: 0
            },
        ]
    );
    assert!(rig.sent.lock().is_empty());
}

#[test]
fn instrument_stepping_wraps_at_both_ends() {
    let mut rig = rig();

    rig.manager.dec_synth_instrument();
    assert_eq!(rig.manager.synth_instrument(), Program::LAST);
    assert_eq!(rig.manager.instrument_name(), "");

    rig.manager.inc_synth_instrument();
    assert_eq!(rig.manager.synth_instrument(), Program::ACOUSTIC_GRAND_PIANO);

    rig.manager.set_synth_instrument(program(1));
    rig.manager.inc_synth_instrument();
    assert_eq!(rig.manager.instrument_name(), "Bass");

    let last = *rig.synth.messages.lock().last().expect("program change sent");
    assert_eq!(
        last,
        ShortMessage::ProgramChange {
            channel: 15,
            program: 2
        }
    );
}

#[test]
fn play_restarts_sequencer_in_order() {
    let mut rig = rig();
    rig.sequencer_calls.lock().clear();

    rig.manager.play(one_note_sequence());

    assert_eq!(
        rig.sequencer_calls.lock().as_slice(),
        &[
            SequencerCall::Stop,
            SequencerCall::Close,
            SequencerCall::Open,
            SequencerCall::SetSequence(2),
            SequencerCall::SetLoopCount(0),
            SequencerCall::Start,
        ]
    );
    assert!(rig.manager.is_playing());
    assert!(rig.manager.last_fault().is_none());

    rig.manager.stop();
    assert!(!rig.manager.is_playing());
}

#[test]
fn invalid_sequence_is_recorded_and_never_started() {
    let mut rig = rig();
    rig.sequencer_calls.lock().clear();
    let mut sequence = one_note_sequence();
    sequence.ppq = 0;

    rig.manager.play(sequence);

    assert!(matches!(
        rig.manager.last_fault(),
        Some(Fault::InvalidSequence(_))
    ));
    assert!(!rig
        .sequencer_calls
        .lock()
        .contains(&SequencerCall::Start));
    assert!(!rig.manager.is_playing());
}

#[test]
fn missing_sequencer_makes_play_a_no_op() {
    let mut rig = rig_with(|sequencer, _| sequencer.fail_open = true);
    assert!(!rig.manager.can_play_sequences());
    assert!(matches!(
        rig.manager.take_last_fault(),
        Some(Fault::SequencerUnavailable(_))
    ));
    rig.sequencer_calls.lock().clear();

    rig.manager.play(one_note_sequence());

    assert!(rig.sequencer_calls.lock().is_empty());
    assert!(rig.manager.last_fault().is_none());
}

#[test]
fn missing_synth_still_mirrors_notes() {
    let mut rig = rig_with(|_, synth| synth.fail_open = true);
    assert_eq!(rig.manager.synth_channel(), None);

    rig.manager.play_note(72);
    rig.manager.pedal_down();
    rig.manager.inc_synth_instrument();

    assert!(rig.synth.messages.lock().is_empty());
    assert_eq!(rig.sent.lock().len(), 1);
    assert_eq!(rig.manager.synth_instrument(), program(1));
}

#[test]
fn no_external_device_leaves_local_playback_working() {
    let (sequencer, _, _) = FakeSequencer::new();
    let (synth, tap) = FakeSynthesizer::new();
    let port = FakeMidiOutputPort {
        fail_default: true,
        ..FakeMidiOutputPort::default()
    };
    let mut manager = PlaybackManager::new(
        Box::new(sequencer),
        Box::new(synth),
        OutputPortConnector::new(Box::new(port), DEVICE),
        Arc::new(InstrumentNameTable::blank()),
    );

    manager.play_note(60);
    manager.stop_note(60);

    assert_eq!(manager.connector().state(), &ConnectionState::Unavailable);
    assert_eq!(tap.messages.lock().len(), 3);
}

#[test]
fn out_of_range_pitch_is_recorded_not_sent() {
    let mut rig = rig();
    rig.synth.messages.lock().clear();

    rig.manager.play_note(128);

    assert!(matches!(
        rig.manager.last_fault(),
        Some(Fault::InvalidMessage(_))
    ));
    assert!(rig.synth.messages.lock().is_empty());
    assert!(rig.sent.lock().is_empty());
}

#[test]
fn shutdown_releases_everything_once() {
    let mut rig = rig();
    rig.manager.play(one_note_sequence());
    rig.sequencer_calls.lock().clear();

    rig.manager.shutdown();
    rig.manager.shutdown();

    assert_eq!(
        rig.sequencer_calls.lock().as_slice(),
        &[SequencerCall::Stop, SequencerCall::Close]
    );
    assert_eq!(*rig.synth.close_calls.lock(), 1);
    assert!(!rig.manager.is_playing());

    rig.manager.play_note(60);
    assert_eq!(rig.sent.lock().len(), 1);
    drop(rig.manager);
    assert_eq!(*rig.synth.close_calls.lock(), 1);
}

#[test]
fn commands_drive_the_manager_and_report_status() {
    let mut rig = rig();

    for line in ["play-note 60", "instrument next", "pedal down"] {
        let command: Command = line.parse().expect("command should parse");
        assert!(rig.manager.handle_command(command).is_none());
    }

    let report = rig
        .manager
        .handle_command(Command::Status)
        .expect("status returns a report");
    assert_eq!(report.program, program(1));
    assert_eq!(report.instrument_name, "Guitar");
    assert_eq!(report.synth_channel, Some(15));
    assert_eq!(report.connection, ConnectionState::Connected(DEVICE.to_string()));
    assert!(!report.playing);
    assert_eq!(report.last_fault, None);
}

#[test]
fn missing_file_is_recorded_as_load_fault() {
    let mut rig = rig();
    rig.sequencer_calls.lock().clear();

    rig.manager.handle_command(Command::PlayFile {
        path: "does/not/exist.mid".to_string(),
    });

    assert!(matches!(
        rig.manager.last_fault(),
        Some(Fault::SequenceLoad(_))
    ));
    assert!(rig.sequencer_calls.lock().is_empty());
}

#[test]
fn playing_again_stops_the_running_sequence_first() {
    let engine = Arc::new(RecordingSynthPort::default());
    let (synth, _) = FakeSynthesizer::new();
    let mut manager = PlaybackManager::new(
        Box::new(ThreadSequencer::new(engine.clone())),
        Box::new(synth),
        OutputPortConnector::new(Box::new(FakeMidiOutputPort::with_devices(&[DEVICE])), DEVICE),
        Arc::new(InstrumentNameTable::blank()),
    );
    let delivered = |message: ShortMessage| engine.messages.lock().contains(&message);

    let mut first = Sequence::new(96);
    first.push(0, ShortMessage::note_on(0, 60, 100).expect("valid"));
    // Ten seconds away at the default tempo.
    first.push(1920, ShortMessage::note_on(0, 61, 100).expect("valid"));
    let mut second = Sequence::new(96);
    second.push(0, ShortMessage::note_on(1, 72, 100).expect("valid"));
    second.push(12, ShortMessage::note_off(1, 72, 0).expect("valid"));

    manager.play(first);
    let deadline = Instant::now() + Duration::from_secs(5);
    while !delivered(ShortMessage::note_on(0, 60, 100).expect("valid")) {
        assert!(Instant::now() < deadline, "first sequence never started");
        thread::sleep(Duration::from_millis(2));
    }

    manager.play(second);
    while manager.is_playing() {
        assert!(Instant::now() < deadline, "second sequence never finished");
        thread::sleep(Duration::from_millis(5));
    }

    let messages = engine.messages.lock().clone();
    let second_start = messages
        .iter()
        .position(|message| *message == ShortMessage::note_on(1, 72, 100).expect("valid"))
        .expect("second sequence played");
    assert!(!messages.contains(&ShortMessage::note_on(0, 61, 100).expect("valid")));
    assert_eq!(
        messages[..second_start].last(),
        Some(&ShortMessage::note_off(0, 60, 0).expect("valid"))
    );
    assert!(messages[second_start..]
        .iter()
        .all(|message| message.channel() == 1));
    assert!(manager.last_fault().is_none());
}
