use ivory_infra_synth_simple::SimpleSynth;
use ivory_ports::midi::{ShortMessage, NUM_CHANNELS};
use ivory_ports::synth::{SoundFontInfo, SynthError, SynthPort};
use parking_lot::Mutex;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// SoundFont-backed General MIDI synth with all sixteen channels. Until a
/// soundfont is loaded every call goes to a [`SimpleSynth`].
pub struct RustySynth {
    fallback: SimpleSynth,
    sample_rate_hz: AtomicU32,
    enabled: AtomicBool,
    sound_font: Mutex<Option<Arc<SoundFont>>>,
    programs: [AtomicU8; NUM_CHANNELS as usize],
    synth: Mutex<Option<Synthesizer>>,
}

impl Default for RustySynth {
    fn default() -> Self {
        Self::new(48_000, 64)
    }
}

impl RustySynth {
    pub fn new(sample_rate_hz: u32, max_voices: usize) -> Self {
        Self {
            fallback: SimpleSynth::new(sample_rate_hz, max_voices),
            sample_rate_hz: AtomicU32::new(sample_rate_hz),
            enabled: AtomicBool::new(false),
            sound_font: Mutex::new(None),
            programs: Default::default(),
            synth: Mutex::new(None),
        }
    }

    pub fn has_soundfont(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn rebuild_synthesizer(&self, sound_font: Arc<SoundFont>) -> Result<(), SynthError> {
        let sample_rate_hz = self.sample_rate_hz.load(Ordering::Relaxed) as i32;
        let mut settings = SynthesizerSettings::new(sample_rate_hz);
        settings.enable_reverb_and_chorus = false;

        let mut synth = Synthesizer::new(&sound_font, &settings)
            .map_err(|e| SynthError::Backend(e.to_string()))?;
        synth.set_master_volume(0.25);
        // A fresh synthesizer starts every channel on program 0.
        for (channel, program) in self.programs.iter().enumerate() {
            let program = program.load(Ordering::Relaxed);
            if program != 0 {
                synth.process_midi_message(channel as i32, 0xC0, program as i32, 0);
            }
        }
        *self.synth.lock() = Some(synth);
        Ok(())
    }
}

impl SynthPort for RustySynth {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SynthError> {
        let mut file = File::open(path).map_err(|e| SynthError::SoundFontLoad(e.to_string()))?;
        let sound_font = Arc::new(
            SoundFont::new(&mut file).map_err(|e| SynthError::SoundFontLoad(e.to_string()))?,
        );

        let name = sound_font.get_info().get_bank_name().trim().to_string();
        let name = if name.is_empty() {
            Path::new(path)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("SoundFont")
                .to_string()
        } else {
            name
        };
        let preset_count = sound_font.get_presets().len();

        *self.sound_font.lock() = Some(sound_font.clone());
        self.rebuild_synthesizer(sound_font)?;
        self.fallback.all_notes_off();
        self.enabled.store(true, Ordering::Relaxed);
        tracing::info!(soundfont = %name, presets = preset_count, "soundfont loaded");

        Ok(SoundFontInfo { name, preset_count })
    }

    fn set_sample_rate(&self, sample_rate_hz: u32) {
        self.sample_rate_hz.store(sample_rate_hz, Ordering::Relaxed);
        self.fallback.set_sample_rate(sample_rate_hz);

        let sound_font = self.sound_font.lock().clone();
        if let Some(sound_font) = sound_font {
            if let Err(err) = self.rebuild_synthesizer(sound_font) {
                tracing::warn!(error = %err, "failed to rebuild synthesizer");
            }
        }
    }

    fn channel_count(&self) -> u8 {
        NUM_CHANNELS
    }

    fn handle_message(&self, message: ShortMessage) {
        if message.validate().is_err() {
            return;
        }
        if let ShortMessage::ProgramChange { channel, program } = message {
            self.programs[channel as usize].store(program, Ordering::Relaxed);
        }
        if !self.enabled.load(Ordering::Relaxed) {
            self.fallback.handle_message(message);
            return;
        }

        let bytes = message.encode();
        let bytes = bytes.as_slice();
        let data2 = bytes.get(2).copied().unwrap_or(0);
        if let Some(synth) = self.synth.lock().as_mut() {
            synth.process_midi_message(
                message.channel() as i32,
                message.command().status_nibble() as i32,
                bytes[1] as i32,
                data2 as i32,
            );
        }
    }

    fn all_notes_off(&self) {
        self.fallback.all_notes_off();
        if let Some(synth) = self.synth.lock().as_mut() {
            synth.note_off_all(false);
        }
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        if !self.enabled.load(Ordering::Relaxed) {
            self.fallback.render(frames, out_l, out_r);
            return;
        }

        let frames = frames.min(out_l.len()).min(out_r.len());
        out_l[..frames].fill(0.0);
        out_r[..frames].fill(0.0);

        // Never block the audio thread; a contended block renders silence.
        if let Some(mut guard) = self.synth.try_lock() {
            if let Some(synth) = guard.as_mut() {
                synth.render(&mut out_l[..frames], &mut out_r[..frames]);
            }
        }
    }
}
