use crate::types::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIDI_OUT_DEVICE_NAME: &str = "loopMIDI Port 2";
pub const DEFAULT_INSTRUMENT_NAMES_PATH: &str = "resources/data/instruments.txt";

fn default_midi_out_device_name() -> String {
    DEFAULT_MIDI_OUT_DEVICE_NAME.to_string()
}

fn default_midi_client_name() -> String {
    "Ivory".to_string()
}

fn default_instrument_names_path() -> String {
    DEFAULT_INSTRUMENT_NAMES_PATH.to_string()
}

fn default_audio_sample_rate_hz() -> u32 {
    48_000
}

fn default_master_volume() -> Volume01 {
    Volume01::new(0.8)
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    #[serde(default = "default_midi_out_device_name")]
    pub midi_out_device_name: String,
    #[serde(default = "default_midi_client_name")]
    pub midi_client_name: String,
    #[serde(default = "default_instrument_names_path")]
    pub instrument_names_path: String,
    pub default_sf2_path: Option<String>,
    pub selected_audio_out: Option<DeviceId>,
    #[serde(default = "default_audio_sample_rate_hz")]
    pub audio_sample_rate_hz: u32,
    pub audio_buffer_size_frames: Option<u32>,
    #[serde(default = "default_master_volume")]
    pub master_volume: Volume01,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            midi_out_device_name: default_midi_out_device_name(),
            midi_client_name: default_midi_client_name(),
            instrument_names_path: default_instrument_names_path(),
            default_sf2_path: None,
            selected_audio_out: None,
            audio_sample_rate_hz: default_audio_sample_rate_hz(),
            audio_buffer_size_frames: None,
            master_volume: default_master_volume(),
        }
    }
}

impl SettingsDto {
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate_hz: self.audio_sample_rate_hz,
            channels: 2,
            buffer_size_frames: self.audio_buffer_size_frames,
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
