use ivory_core::{
    AudioSynthesizer, Command, InstrumentNameTable, OutputPortConnector, PlaybackManager,
    ThreadSequencer,
};
use ivory_infra_audio_cpal::CpalAudioOutputPort;
use ivory_infra_midi_midir::MidirMidiOutputPort;
use ivory_infra_storage_fs::FsStorage;
use ivory_infra_synth_rustysynth::RustySynth;
use ivory_ports::storage::SettingsDto;
use ivory_ports::synth::SynthPort;
use parking_lot::Mutex;
use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const WATCH_INTERVAL: Duration = Duration::from_millis(50);
const MAX_VOICES: usize = 64;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_settings(storage: &FsStorage) -> SettingsDto {
    match storage.load_or_init_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(
                path = %storage.settings_path().display(),
                error = %err,
                "cannot read settings, using defaults"
            );
            SettingsDto::default()
        }
    }
}

fn build_manager(settings: &SettingsDto) -> PlaybackManager {
    let engine = Arc::new(RustySynth::new(settings.audio_sample_rate_hz, MAX_VOICES));
    if let Some(path) = settings.default_sf2_path.as_deref() {
        match engine.load_soundfont_from_path(path) {
            Ok(info) => tracing::info!(name = %info.name, "using soundfont"),
            Err(err) => tracing::warn!(path, error = %err, "soundfont not loaded, using fallback synth"),
        }
    }
    let engine: Arc<dyn SynthPort> = engine;

    let synth = AudioSynthesizer::new(
        Arc::clone(&engine),
        Box::new(CpalAudioOutputPort::new()),
        settings.selected_audio_out.clone(),
        settings.audio_config(),
        settings.master_volume,
    );
    let sequencer = ThreadSequencer::new(engine);
    let connector = OutputPortConnector::new(
        Box::new(MidirMidiOutputPort::new(settings.midi_client_name.clone())),
        settings.midi_out_device_name.clone(),
    );
    let instruments =
        InstrumentNameTable::load_or_blank(Path::new(&settings.instrument_names_path));

    PlaybackManager::new(
        Box::new(sequencer),
        Box::new(synth),
        connector,
        Arc::new(instruments),
    )
}

/// Logs when a sequence runs to its end on its own.
fn spawn_playback_watcher(
    manager: Arc<Mutex<PlaybackManager>>,
    quit: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ivory-watch".to_string())
        .spawn(move || {
            let mut was_playing = false;
            while !quit.load(Ordering::Relaxed) {
                let playing = manager.lock().is_playing();
                if was_playing && !playing {
                    tracing::info!("playback finished");
                }
                was_playing = playing;
                thread::sleep(WATCH_INTERVAL);
            }
        })
}

fn run_command_loop(manager: &Mutex<PlaybackManager>) -> io::Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(input = %line.trim(), error = %err, "ignoring command");
                continue;
            }
        };

        let report = manager.lock().handle_command(command);
        if let Some(report) = report {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{}", json),
                Err(err) => tracing::error!(error = %err, "cannot encode status"),
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let storage = FsStorage::default();
    let settings = load_settings(&storage);
    let manager = Arc::new(Mutex::new(build_manager(&settings)));

    if let Some(path) = env::args().nth(1) {
        manager.lock().play_file(Path::new(&path));
    }

    let quit = Arc::new(AtomicBool::new(false));
    let watcher = spawn_playback_watcher(Arc::clone(&manager), Arc::clone(&quit))?;

    let result = run_command_loop(&manager);

    quit.store(true, Ordering::Relaxed);
    if watcher.join().is_err() {
        tracing::error!("playback watcher panicked");
    }
    manager.lock().shutdown();
    result?;
    Ok(())
}
