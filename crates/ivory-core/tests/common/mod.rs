#![allow(dead_code)]

use ivory_ports::midi::{MidiError, MidiOutputPort, MidiOutputSink, ShortMessage};
use ivory_ports::sequence::Sequence;
use ivory_ports::sequencer::{SequencerError, SequencerPort};
use ivory_ports::synth::{SoundFontInfo, SynthError, SynthPort, Synthesizer};
use ivory_ports::types::{DeviceId, MidiOutputDevice};
use parking_lot::Mutex;
use std::sync::Arc;

pub const DEFAULT_DEVICE_NAME: &str = "Default Synth";

/// What a fake output device received, tagged with the device name.
pub type SentLog = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

#[derive(Default)]
pub struct FakeMidiOutputPort {
    pub devices: Vec<String>,
    pub fail_list: bool,
    pub fail_open: bool,
    pub fail_default: bool,
    pub fail_send: bool,
    pub sent: SentLog,
    pub list_calls: Arc<Mutex<u32>>,
}

impl FakeMidiOutputPort {
    pub fn with_devices(names: &[&str]) -> Self {
        Self {
            devices: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    fn sink(&self, name: &str) -> Box<dyn MidiOutputSink> {
        Box::new(FakeSink {
            name: name.to_string(),
            fail_send: self.fail_send,
            sent: Arc::clone(&self.sent),
        })
    }
}

impl MidiOutputPort for FakeMidiOutputPort {
    fn list_outputs(&self) -> Result<Vec<MidiOutputDevice>, MidiError> {
        *self.list_calls.lock() += 1;
        if self.fail_list {
            return Err(MidiError::Backend("enumeration failed".to_string()));
        }
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, name)| MidiOutputDevice {
                id: DeviceId(format!("fake:{}", index)),
                name: name.clone(),
            })
            .collect())
    }

    fn open_output(&self, device_id: &DeviceId) -> Result<Box<dyn MidiOutputSink>, MidiError> {
        if self.fail_open {
            return Err(MidiError::DeviceUnavailable(device_id.to_string()));
        }
        let index: usize = device_id
            .0
            .trim_start_matches("fake:")
            .parse()
            .map_err(|_| MidiError::DeviceNotFound(device_id.to_string()))?;
        let name = self
            .devices
            .get(index)
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;
        Ok(self.sink(name))
    }

    fn open_default_output(&self) -> Result<Box<dyn MidiOutputSink>, MidiError> {
        if self.fail_default {
            return Err(MidiError::DeviceNotFound("no default output".to_string()));
        }
        Ok(self.sink(DEFAULT_DEVICE_NAME))
    }
}

struct FakeSink {
    name: String,
    fail_send: bool,
    sent: SentLog,
}

impl MidiOutputSink for FakeSink {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        if self.fail_send {
            return Err(MidiError::Backend("send failed".to_string()));
        }
        self.sent.lock().push((self.name.clone(), message.to_vec()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SynthTap {
    pub messages: Arc<Mutex<Vec<ShortMessage>>>,
    pub open: Arc<Mutex<bool>>,
    pub close_calls: Arc<Mutex<u32>>,
}

pub struct FakeSynthesizer {
    pub tap: SynthTap,
    pub channels: u8,
    pub fail_open: bool,
}

impl FakeSynthesizer {
    pub fn new() -> (Self, SynthTap) {
        let tap = SynthTap::default();
        (
            Self {
                tap: tap.clone(),
                channels: 16,
                fail_open: false,
            },
            tap,
        )
    }
}

impl Synthesizer for FakeSynthesizer {
    fn open(&mut self) -> Result<(), SynthError> {
        if self.fail_open {
            return Err(SynthError::Unavailable("no audio device".to_string()));
        }
        *self.tap.open.lock() = true;
        Ok(())
    }

    fn close(&mut self) {
        *self.tap.open.lock() = false;
        *self.tap.close_calls.lock() += 1;
    }

    fn is_open(&self) -> bool {
        *self.tap.open.lock()
    }

    fn channel_count(&self) -> u8 {
        self.channels
    }

    fn send(&mut self, message: ShortMessage) -> Result<(), SynthError> {
        if !*self.tap.open.lock() {
            return Err(SynthError::Closed);
        }
        self.tap.messages.lock().push(message);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequencerCall {
    Open,
    Close,
    SetSequence(usize),
    SetLoopCount(u32),
    Start,
    Stop,
}

pub struct FakeSequencer {
    pub calls: Arc<Mutex<Vec<SequencerCall>>>,
    pub fail_open: bool,
    open: bool,
    running: Arc<Mutex<bool>>,
}

impl FakeSequencer {
    pub fn new() -> (Self, Arc<Mutex<Vec<SequencerCall>>>, Arc<Mutex<bool>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(Mutex::new(false));
        (
            Self {
                calls: Arc::clone(&calls),
                fail_open: false,
                open: false,
                running: Arc::clone(&running),
            },
            calls,
            running,
        )
    }
}

impl SequencerPort for FakeSequencer {
    fn open(&mut self) -> Result<(), SequencerError> {
        self.calls.lock().push(SequencerCall::Open);
        if self.fail_open {
            return Err(SequencerError::Unavailable("no sequencer".to_string()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.calls.lock().push(SequencerCall::Close);
        *self.running.lock() = false;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_sequence(&mut self, sequence: Sequence) -> Result<(), SequencerError> {
        sequence.validate()?;
        self.calls
            .lock()
            .push(SequencerCall::SetSequence(sequence.events.len()));
        Ok(())
    }

    fn set_loop_count(&mut self, count: u32) {
        self.calls.lock().push(SequencerCall::SetLoopCount(count));
    }

    fn start(&mut self) -> Result<(), SequencerError> {
        self.calls.lock().push(SequencerCall::Start);
        *self.running.lock() = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().push(SequencerCall::Stop);
        *self.running.lock() = false;
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }
}

/// Synth engine that only records what the sequencer delivered.
#[derive(Default)]
pub struct RecordingSynthPort {
    pub messages: Mutex<Vec<ShortMessage>>,
    pub all_notes_off_calls: Mutex<u32>,
}

impl SynthPort for RecordingSynthPort {
    fn load_soundfont_from_path(&self, _path: &str) -> Result<SoundFontInfo, SynthError> {
        Err(SynthError::UnsupportedFormat)
    }

    fn set_sample_rate(&self, _sample_rate_hz: u32) {}

    fn channel_count(&self) -> u8 {
        16
    }

    fn handle_message(&self, message: ShortMessage) {
        self.messages.lock().push(message);
    }

    fn all_notes_off(&self) {
        *self.all_notes_off_calls.lock() += 1;
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l[..frames].fill(0.0);
        out_r[..frames].fill(0.0);
    }
}
