use crate::midi::ShortMessage;

#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    #[error("soundfont load failed: {0}")]
    SoundFontLoad(String),
    #[error("unsupported soundfont format")]
    UnsupportedFormat,
    #[error("synthesizer unavailable: {0}")]
    Unavailable(String),
    #[error("synthesizer is closed")]
    Closed,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug)]
pub struct SoundFontInfo {
    pub name: String,
    pub preset_count: usize,
}

/// Sound engine shared between the control thread, the sequencer thread
/// and the audio thread.
///
/// - load_* / set_sample_rate are called from the control thread (can lock internally)
/// - handle_message is called from the control and sequencer threads
/// - render is called from the audio thread (must not block for long)
pub trait SynthPort: Send + Sync {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SynthError>;
    fn set_sample_rate(&self, sample_rate_hz: u32);
    fn channel_count(&self) -> u8;

    fn handle_message(&self, message: ShortMessage);
    /// Releases every sounding voice on every channel.
    fn all_notes_off(&self);

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]);
}

/// A synthesizer device as seen by the player: it must be opened before it
/// makes sound and exposes a fixed set of channels.
pub trait Synthesizer: Send {
    fn open(&mut self) -> Result<(), SynthError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn channel_count(&self) -> u8;
    fn send(&mut self, message: ShortMessage) -> Result<(), SynthError>;
}
