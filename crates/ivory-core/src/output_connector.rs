use crate::fault::{Fault, FaultSlot};
use ivory_ports::midi::{Command, MidiError, MidiOutputPort, MidiOutputSink, ShortMessage};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "device")]
pub enum ConnectionState {
    /// No send has happened yet, so no device was looked up.
    Pending,
    Connected(String),
    /// The named device was not found; messages go to the default output.
    DefaultRoute(String),
    Unavailable,
}

/// Forwards short messages to one external output device chosen by name.
///
/// The device is looked up on first use and kept for the connector's
/// lifetime. Failures are logged and recorded, never returned.
pub struct OutputPortConnector {
    port: Box<dyn MidiOutputPort>,
    target_name: String,
    sink: Option<Box<dyn MidiOutputSink>>,
    state: ConnectionState,
    faults: FaultSlot,
}

impl OutputPortConnector {
    pub fn new(port: Box<dyn MidiOutputPort>, target_name: impl Into<String>) -> Self {
        Self {
            port,
            target_name: target_name.into(),
            sink: None,
            state: ConnectionState::Pending,
            faults: FaultSlot::default(),
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn device_name(&self) -> Option<&str> {
        self.sink.as_ref().map(|sink| sink.device_name())
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.faults.last()
    }

    pub fn take_last_fault(&mut self) -> Option<Fault> {
        self.faults.take()
    }

    pub fn fault_count(&self) -> u64 {
        self.faults.count()
    }

    /// Runs the device lookup if it has not happened yet.
    pub fn ensure_connected(&mut self) -> &ConnectionState {
        if self.state == ConnectionState::Pending {
            match self.connect() {
                Ok((sink, state)) => {
                    self.sink = Some(sink);
                    self.state = state;
                }
                Err(err) => {
                    self.state = ConnectionState::Unavailable;
                    self.faults.record(Fault::OutputUnavailable(err));
                }
            }
        }
        &self.state
    }

    pub fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send_short_message(Command::NoteOn, channel, note, velocity);
    }

    pub fn send_note_off(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send_short_message(Command::NoteOff, channel, note, velocity);
    }

    fn connect(&self) -> Result<(Box<dyn MidiOutputSink>, ConnectionState), MidiError> {
        let devices = self.port.list_outputs()?;
        if let Some(device) = devices
            .iter()
            .find(|device| device.name.eq_ignore_ascii_case(&self.target_name))
        {
            let sink = self.port.open_output(&device.id)?;
            tracing::info!("Connected to {}", device.name);
            return Ok((sink, ConnectionState::Connected(device.name.clone())));
        }

        tracing::warn!(
            "{} not found. Using default MIDI output.",
            self.target_name
        );
        let sink = self.port.open_default_output()?;
        let name = sink.device_name().to_string();
        Ok((sink, ConnectionState::DefaultRoute(name)))
    }

    fn send_short_message(&mut self, command: Command, channel: u8, data1: u8, data2: u8) {
        self.ensure_connected();

        let message = match ShortMessage::new(command, channel, data1, data2) {
            Ok(message) => message,
            Err(err) => {
                self.faults.record(Fault::InvalidMessage(err));
                return;
            }
        };

        let Some(sink) = self.sink.as_mut() else {
            tracing::trace!(?message, "no midi output, message dropped");
            return;
        };

        if let Err(err) = sink.send(message.encode().as_slice()) {
            self.faults.record(Fault::Send(err));
        }
    }
}
