use ivory_ports::midi::{ShortMessage, NUM_CHANNELS, SUSTAIN_PEDAL};
use ivory_ports::synth::{SoundFontInfo, SynthError, SynthPort};
use parking_lot::Mutex;
use std::f32::consts::TAU;

/// Sine-based General MIDI stand-in used when no soundfont is available.
/// Programs only change the brightness of the tone.
pub struct SimpleSynth {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    sample_rate_hz: f32,
    max_voices: usize,
    channels: [ChannelState; NUM_CHANNELS as usize],
    voices: Vec<Voice>,
    note_counter: u64,
}

#[derive(Clone, Debug, Default)]
struct ChannelState {
    program: u8,
    sustain_down: bool,
}

#[derive(Clone, Debug)]
struct Voice {
    channel: u8,
    note: u8,
    freq: f32,
    phase: f32,
    velocity: f32,
    overtone: f32,
    key_down: bool,
    sustained: bool,
    release_samples_left: u32,
    release_total_samples: u32,
    age: u64,
}

impl SimpleSynth {
    pub fn new(sample_rate_hz: u32, max_voices: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sample_rate_hz: sample_rate_hz as f32,
                max_voices: max_voices.max(8),
                channels: Default::default(),
                voices: Vec::new(),
                note_counter: 0,
            }),
        }
    }

    /// Voices still sounding, including ones in their release tail.
    pub fn active_voices(&self) -> usize {
        self.inner.lock().voices.len()
    }

    pub fn program(&self, channel: u8) -> Option<u8> {
        let inner = self.inner.lock();
        inner
            .channels
            .get(channel as usize)
            .map(|state| state.program)
    }
}

impl Default for SimpleSynth {
    fn default() -> Self {
        Self::new(48_000, 64)
    }
}

impl Inner {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.note_counter = self.note_counter.wrapping_add(1);

        if self.voices.len() >= self.max_voices {
            if let Some((idx, _)) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, voice)| voice.age)
            {
                self.voices.swap_remove(idx);
            }
        }

        let program = self.channels[channel as usize].program;
        let release_total_samples = (self.sample_rate_hz * 0.2) as u32;
        self.voices.push(Voice {
            channel,
            note,
            freq: 440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0),
            phase: 0.0,
            velocity: (velocity as f32 / 127.0).clamp(0.05, 1.0),
            // One of sixteen GM families, darkest first.
            overtone: (program / 8) as f32 / 15.0 * 0.5,
            key_down: true,
            sustained: false,
            release_samples_left: 0,
            release_total_samples: release_total_samples.max(1),
            age: self.note_counter,
        });
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        let sustain_down = self.channels[channel as usize].sustain_down;
        for voice in &mut self.voices {
            if voice.channel == channel && voice.note == note && voice.key_down {
                voice.key_down = false;
                if sustain_down {
                    voice.sustained = true;
                } else {
                    voice.release_samples_left = voice.release_total_samples;
                }
            }
        }
    }

    fn sustain(&mut self, channel: u8, down: bool) {
        self.channels[channel as usize].sustain_down = down;
        if down {
            return;
        }
        for voice in &mut self.voices {
            if voice.channel == channel && !voice.key_down && voice.sustained {
                voice.sustained = false;
                voice.release_samples_left = voice.release_total_samples;
            }
        }
    }

    fn release_all(&mut self) {
        for state in &mut self.channels {
            state.sustain_down = false;
        }
        for voice in &mut self.voices {
            voice.sustained = false;
            if voice.key_down || voice.release_samples_left == 0 {
                voice.key_down = false;
                voice.release_samples_left = voice.release_total_samples;
            }
        }
    }

    fn render(&mut self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l[..frames].fill(0.0);
        out_r[..frames].fill(0.0);

        let amplitude = 0.2;
        for voice in &mut self.voices {
            let phase_step = TAU * voice.freq / self.sample_rate_hz;
            for i in 0..frames {
                let mut gain = voice.velocity;
                if voice.release_samples_left > 0 {
                    gain *= voice.release_samples_left as f32 / voice.release_total_samples as f32;
                    voice.release_samples_left -= 1;
                    if voice.release_samples_left == 0 {
                        voice.sustained = false;
                        break;
                    }
                }

                let tone = voice.phase.sin() + voice.overtone * (2.0 * voice.phase).sin();
                let sample = tone * gain * amplitude;
                out_l[i] += sample;
                out_r[i] += sample;
                voice.phase += phase_step;
                if voice.phase >= TAU {
                    voice.phase -= TAU;
                }
            }
        }

        self.voices
            .retain(|voice| voice.key_down || voice.sustained || voice.release_samples_left > 0);
    }
}

impl SynthPort for SimpleSynth {
    fn load_soundfont_from_path(&self, _path: &str) -> Result<SoundFontInfo, SynthError> {
        Err(SynthError::UnsupportedFormat)
    }

    fn set_sample_rate(&self, sample_rate_hz: u32) {
        let mut inner = self.inner.lock();
        inner.sample_rate_hz = sample_rate_hz as f32;
    }

    fn channel_count(&self) -> u8 {
        NUM_CHANNELS
    }

    fn handle_message(&self, message: ShortMessage) {
        if message.validate().is_err() {
            return;
        }
        let mut inner = self.inner.lock();
        match message {
            ShortMessage::NoteOn {
                channel,
                note,
                velocity,
            } if velocity > 0 => inner.note_on(channel, note, velocity),
            ShortMessage::NoteOn { channel, note, .. }
            | ShortMessage::NoteOff { channel, note, .. } => inner.note_off(channel, note),
            ShortMessage::ControlChange {
                channel,
                controller: SUSTAIN_PEDAL,
                value,
            } => inner.sustain(channel, value >= 64),
            ShortMessage::ControlChange { .. } => {}
            ShortMessage::ProgramChange { channel, program } => {
                inner.channels[channel as usize].program = program;
            }
        }
    }

    fn all_notes_off(&self) {
        self.inner.lock().release_all();
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        let mut inner = self.inner.lock();
        inner.render(frames, out_l, out_r);
    }
}
