use crate::tempo::TempoMap;
use ivory_ports::midi::{ShortMessage, SUSTAIN_PEDAL};
use ivory_ports::sequence::Sequence;
use ivory_ports::sequencer::{SequencerError, SequencerPort};
use ivory_ports::synth::SynthPort;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long the playback thread sleeps before re-checking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A sequence with tick positions resolved to offsets from the start of a pass.
struct Schedule {
    steps: Vec<Step>,
    length: Duration,
}

struct Step {
    at: Duration,
    message: ShortMessage,
}

impl Schedule {
    fn from_sequence(sequence: &Sequence) -> Self {
        let tempo_map = TempoMap::new(sequence.ppq, &sequence.tempo_map);
        let mut events = sequence.events.clone();
        events.sort_by_key(|event| event.tick);
        let steps = events
            .into_iter()
            .map(|event| Step {
                at: tempo_map.tick_to_duration(event.tick),
                message: event.message,
            })
            .collect();
        Self {
            steps,
            length: tempo_map.tick_to_duration(sequence.end_tick()),
        }
    }
}

struct PlaybackThread {
    stop_requested: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

/// Software sequencer that plays into a shared synth engine on its own thread.
pub struct ThreadSequencer {
    receiver: Arc<dyn SynthPort>,
    open: bool,
    loaded: Option<Arc<Schedule>>,
    loop_count: u32,
    playback: Option<PlaybackThread>,
}

impl ThreadSequencer {
    pub fn new(receiver: Arc<dyn SynthPort>) -> Self {
        Self {
            receiver,
            open: false,
            loaded: None,
            loop_count: 0,
            playback: None,
        }
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }
}

impl SequencerPort for ThreadSequencer {
    fn open(&mut self) -> Result<(), SequencerError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.stop();
        self.loaded = None;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_sequence(&mut self, sequence: Sequence) -> Result<(), SequencerError> {
        sequence.validate()?;
        tracing::debug!(
            ppq = sequence.ppq,
            events = sequence.events.len(),
            "sequence loaded"
        );
        self.loaded = Some(Arc::new(Schedule::from_sequence(&sequence)));
        Ok(())
    }

    fn set_loop_count(&mut self, count: u32) {
        self.loop_count = count;
    }

    fn start(&mut self) -> Result<(), SequencerError> {
        if !self.open {
            return Err(SequencerError::NotOpen);
        }
        let schedule = self.loaded.clone().ok_or(SequencerError::NoSequence)?;
        self.stop();

        let stop_requested = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let passes = 1 + self.loop_count as u64;
        let receiver = Arc::clone(&self.receiver);
        let thread_stop = Arc::clone(&stop_requested);
        let thread_running = Arc::clone(&running);

        let join_handle = thread::Builder::new()
            .name("ivory-sequencer".to_string())
            .spawn(move || {
                let mut sounding = Sounding::default();
                play_schedule(&schedule, passes, receiver.as_ref(), &thread_stop, &mut sounding);
                sounding.release(receiver.as_ref());
                thread_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| SequencerError::Backend(e.to_string()))?;

        self.playback = Some(PlaybackThread {
            stop_requested,
            running,
            join_handle: Some(join_handle),
        });
        tracing::debug!(passes, "sequencer started");
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut playback) = self.playback.take() else {
            return;
        };
        playback.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = playback.join_handle.take() {
            if handle.join().is_err() {
                tracing::error!("sequencer thread panicked");
            }
        }
        tracing::debug!("sequencer stopped");
    }

    fn is_running(&self) -> bool {
        self.playback
            .as_ref()
            .map_or(false, |playback| playback.running.load(Ordering::SeqCst))
    }
}

impl Drop for ThreadSequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Notes and pedals the playback thread has left down on the shared engine.
///
/// Only messages from the schedule are tracked; live keys on the same engine are
/// never released here. Messages are range-checked by `Sequence::validate`.
struct Sounding {
    notes: [[bool; 128]; 16],
    sustained: [bool; 16],
}

impl Default for Sounding {
    fn default() -> Self {
        Self {
            notes: [[false; 128]; 16],
            sustained: [false; 16],
        }
    }
}

impl Sounding {
    fn track(&mut self, message: ShortMessage) {
        match message {
            ShortMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.notes[channel as usize][note as usize] = velocity > 0,
            ShortMessage::NoteOff { channel, note, .. } => {
                self.notes[channel as usize][note as usize] = false
            }
            ShortMessage::ControlChange {
                channel,
                controller: SUSTAIN_PEDAL,
                value,
            } => self.sustained[channel as usize] = value >= 64,
            _ => {}
        }
    }

    fn release(&mut self, receiver: &dyn SynthPort) {
        for (channel, notes) in self.notes.iter_mut().enumerate() {
            for (note, on) in notes.iter_mut().enumerate() {
                if std::mem::take(on) {
                    receiver.handle_message(ShortMessage::NoteOff {
                        channel: channel as u8,
                        note: note as u8,
                        velocity: 0,
                    });
                }
            }
        }
        for (channel, down) in self.sustained.iter_mut().enumerate() {
            if std::mem::take(down) {
                receiver.handle_message(ShortMessage::ControlChange {
                    channel: channel as u8,
                    controller: SUSTAIN_PEDAL,
                    value: 0,
                });
            }
        }
    }
}

fn play_schedule(
    schedule: &Schedule,
    passes: u64,
    receiver: &dyn SynthPort,
    stop: &AtomicBool,
    sounding: &mut Sounding,
) {
    for _ in 0..passes {
        let started = Instant::now();
        for step in &schedule.steps {
            if !wait_until(started + step.at, stop) {
                return;
            }
            receiver.handle_message(step.message);
            sounding.track(step.message);
        }
        if !wait_until(started + schedule.length, stop) {
            return;
        }
    }
}

/// Sleeps until `deadline`; false if a stop was requested first.
fn wait_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}
