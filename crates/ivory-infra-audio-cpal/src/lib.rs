use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfigRange,
};
use ivory_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use ivory_ports::types::{AudioConfig, AudioOutputDevice, DeviceId};
use std::sync::mpsc;
use std::thread;

/// Frames preallocated per channel when the host picks the buffer size.
const DEFAULT_SCRATCH_FRAMES: usize = 8192;

pub struct CpalAudioOutputPort {
    host: cpal::Host,
}

struct SelectedStreamConfig {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalAudioOutputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn list_devices_from_host(
        host: &cpal::Host,
    ) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| "Unknown Output".to_string());
                (
                    DeviceId(format!("cpal:{}:{}:{}", host_id, index, name)),
                    device,
                )
            })
            .collect())
    }

    fn find_device(
        host: &cpal::Host,
        device_id: Option<&DeviceId>,
    ) -> Result<cpal::Device, AudioError> {
        match device_id {
            Some(device_id) => Self::list_devices_from_host(host)?
                .into_iter()
                .find(|(id, _)| id == device_id)
                .map(|(_, device)| device)
                .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string())),
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default output".to_string())),
        }
    }

    fn select_stream_config(
        device: &cpal::Device,
        desired: AudioConfig,
    ) -> Result<SelectedStreamConfig, AudioError> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let chosen = select_supported_config(&mut supported, desired)?;
        let sample_format = chosen.sample_format();
        let mut config = chosen.config();
        config.buffer_size = match desired.buffer_size_frames {
            Some(frames) => BufferSize::Fixed(frames),
            None => BufferSize::Default,
        };

        Ok(SelectedStreamConfig {
            config,
            sample_format,
        })
    }
}

impl Default for CpalAudioOutputPort {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the stream alive on its own thread; cpal streams are not `Send`
/// on every host.
pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::error!("audio stream thread panicked");
            }
        }
    }
}

impl AudioOutputPort for CpalAudioOutputPort {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        let devices = Self::list_devices_from_host(&self.host)?;
        let mut results = Vec::new();

        for (id, device) in devices {
            let name = device
                .name()
                .unwrap_or_else(|_| "Unknown Output".to_string());
            let Ok(default_config) = device.default_output_config() else {
                continue;
            };

            results.push(AudioOutputDevice {
                id,
                name,
                default_config: AudioConfig {
                    sample_rate_hz: default_config.sample_rate().0,
                    channels: default_config.channels(),
                    buffer_size_frames: None,
                },
            });
        }

        Ok(results)
    }

    fn open_output(
        &self,
        device_id: Option<&DeviceId>,
        config: AudioConfig,
        cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let device_id = device_id.cloned();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join_handle = thread::Builder::new()
            .name("ivory-audio".to_string())
            .spawn(move || {
                let stream = match build_stream(device_id.as_ref(), config, cb) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))??;
        Ok(Box::new(CpalAudioStreamHandle {
            stop_tx,
            join_handle: Some(join_handle),
        }))
    }
}

fn build_stream(
    device_id: Option<&DeviceId>,
    desired: AudioConfig,
    cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = CpalAudioOutputPort::find_device(&host, device_id)?;
    let selected = CpalAudioOutputPort::select_stream_config(&device, desired)?;
    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate_hz = selected.config.sample_rate.0,
        format = ?selected.sample_format,
        "opening audio output"
    );

    match selected.sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(&device, &selected.config, cb),
        SampleFormat::I16 => build_typed_stream::<i16>(&device, &selected.config, cb),
        SampleFormat::U16 => build_typed_stream::<u16>(&device, &selected.config, cb),
        other => Err(AudioError::UnsupportedConfig(format!(
            "sample format {:?}",
            other
        ))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let scratch_frames = match config.buffer_size {
        BufferSize::Fixed(frames) => frames as usize,
        BufferSize::Default => DEFAULT_SCRATCH_FRAMES,
    };
    let mut left = vec![0.0f32; scratch_frames];
    let mut right = vec![0.0f32; scratch_frames];
    let mut sample_time: u64 = 0;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                if frames > left.len() {
                    left.resize(frames, 0.0);
                    right.resize(frames, 0.0);
                }
                cb.render(sample_time, &mut left[..frames], &mut right[..frames]);
                write_interleaved(data, channels, &left[..frames], &right[..frames]);
                sample_time = sample_time.saturating_add(frames as u64);
            },
            |err| tracing::error!(error = %err, "audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Backend(e.to_string()))
}

fn select_supported_config(
    supported: &mut dyn Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let mut best: Option<(i32, cpal::SupportedStreamConfig)> = None;

    for config_range in supported {
        if config_range.channels() != desired.channels {
            continue;
        }
        let min = config_range.min_sample_rate().0;
        let max = config_range.max_sample_rate().0;
        if desired.sample_rate_hz < min || desired.sample_rate_hz > max {
            continue;
        }

        let score = format_score(config_range.sample_format());
        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((
                score,
                config_range.with_sample_rate(SampleRate(desired.sample_rate_hz)),
            ));
        }
    }

    best.map(|(_, config)| config).ok_or_else(|| {
        AudioError::UnsupportedConfig(format!(
            "{} channels at {} Hz",
            desired.channels, desired.sample_rate_hz
        ))
    })
}

fn format_score(format: SampleFormat) -> i32 {
    match format {
        SampleFormat::F32 => 3,
        SampleFormat::I16 => 2,
        SampleFormat::U16 => 1,
        _ => 0,
    }
}

/// Writes the stereo pair into the first two channels of each frame. Mono
/// devices get the average and extra channels get silence.
fn write_interleaved<T>(data: &mut [T], channels: usize, left: &[f32], right: &[f32])
where
    T: SizedSample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, samples) in data.chunks_exact_mut(channels).enumerate() {
        let l = left.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let r = right.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        match samples {
            [mono] => *mono = T::from_sample((l + r) * 0.5),
            [first, second, rest @ ..] => {
                *first = T::from_sample(l);
                *second = T::from_sample(r);
                rest.fill(T::EQUILIBRIUM);
            }
            [] => {}
        }
    }
}
