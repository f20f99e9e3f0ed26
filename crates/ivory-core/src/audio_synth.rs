use ivory_ports::audio::{AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use ivory_ports::midi::ShortMessage;
use ivory_ports::synth::{SynthError, SynthPort, Synthesizer};
use ivory_ports::types::{AudioConfig, DeviceId, SampleTime, Volume01};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Master gain shared with the audio thread.
#[derive(Debug)]
pub struct MasterVolume(AtomicU32);

impl MasterVolume {
    pub fn new(volume: Volume01) -> Self {
        Self(AtomicU32::new(volume.get().to_bits()))
    }

    pub fn set(&self, volume: Volume01) {
        self.0.store(volume.get().to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Pulls frames from the synth engine on the audio thread.
pub struct SynthRenderCallback {
    engine: Arc<dyn SynthPort>,
    volume: Arc<MasterVolume>,
    limiter_gain: f32,
}

impl SynthRenderCallback {
    pub fn new(engine: Arc<dyn SynthPort>, volume: Arc<MasterVolume>) -> Self {
        Self {
            engine,
            volume,
            limiter_gain: 1.0,
        }
    }
}

impl AudioRenderCallback for SynthRenderCallback {
    fn render(&mut self, _sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        self.engine
            .render(frames, &mut out_l[..frames], &mut out_r[..frames]);

        let master = self.volume.get();
        let limit = 0.98_f32;
        let mut peak = 0.0_f32;
        for i in 0..frames {
            out_l[i] *= master;
            out_r[i] *= master;
            peak = peak.max(out_l[i].abs()).max(out_r[i].abs());
        }

        let target_gain = if peak > limit { limit / peak } else { 1.0 };
        // Fast attack, slow release.
        let coeff = if target_gain < self.limiter_gain {
            0.25
        } else {
            0.01
        };
        self.limiter_gain =
            (self.limiter_gain + coeff * (target_gain - self.limiter_gain)).clamp(0.0, 1.0);

        if self.limiter_gain < 0.999 {
            for i in 0..frames {
                out_l[i] *= self.limiter_gain;
                out_r[i] *= self.limiter_gain;
            }
        }
    }
}

/// A `Synthesizer` that makes sound by streaming a synth engine to an audio output.
pub struct AudioSynthesizer {
    engine: Arc<dyn SynthPort>,
    audio: Box<dyn AudioOutputPort>,
    device: Option<DeviceId>,
    config: AudioConfig,
    volume: Arc<MasterVolume>,
    stream: Option<Box<dyn AudioStreamHandle>>,
}

impl AudioSynthesizer {
    pub fn new(
        engine: Arc<dyn SynthPort>,
        audio: Box<dyn AudioOutputPort>,
        device: Option<DeviceId>,
        config: AudioConfig,
        volume: Volume01,
    ) -> Self {
        Self {
            engine,
            audio,
            device,
            config,
            volume: Arc::new(MasterVolume::new(volume)),
            stream: None,
        }
    }

    pub fn engine(&self) -> &Arc<dyn SynthPort> {
        &self.engine
    }

    pub fn set_master_volume(&self, volume: Volume01) {
        self.volume.set(volume);
    }
}

impl Synthesizer for AudioSynthesizer {
    fn open(&mut self) -> Result<(), SynthError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.engine.set_sample_rate(self.config.sample_rate_hz);
        let callback = SynthRenderCallback::new(Arc::clone(&self.engine), Arc::clone(&self.volume));
        let stream = self
            .audio
            .open_output(self.device.as_ref(), self.config, Box::new(callback))
            .map_err(|e| SynthError::Unavailable(e.to_string()))?;
        tracing::info!(
            sample_rate_hz = self.config.sample_rate_hz,
            "synthesizer audio stream opened"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.engine.all_notes_off();
            stream.close();
            tracing::info!("synthesizer audio stream closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn channel_count(&self) -> u8 {
        self.engine.channel_count()
    }

    fn send(&mut self, message: ShortMessage) -> Result<(), SynthError> {
        if self.stream.is_none() {
            return Err(SynthError::Closed);
        }
        self.engine.handle_message(message);
        Ok(())
    }
}

impl Drop for AudioSynthesizer {
    fn drop(&mut self) {
        self.close();
    }
}
