use ivory_ports::midi::{MidiError, MidiOutputPort, MidiOutputSink};
use ivory_ports::types::{DeviceId, MidiOutputDevice};
use midir::{MidiOutput, MidiOutputConnection};

pub struct MidirMidiOutputPort {
    client_name: String,
}

impl MidirMidiOutputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_out(&self) -> Result<MidiOutput, MidiError> {
        MidiOutput::new(&self.client_name).map_err(|e| MidiError::Backend(e.to_string()))
    }

    fn device_id(index: usize, name: &str) -> DeviceId {
        DeviceId(format!("midir:{}:{}", index, name))
    }

    fn port_name(midi_out: &MidiOutput, port: &midir::MidiOutputPort) -> String {
        midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown Output".to_string())
    }

    fn connect(
        midi_out: MidiOutput,
        port: &midir::MidiOutputPort,
        name: String,
    ) -> Result<Box<dyn MidiOutputSink>, MidiError> {
        let connection = midi_out
            .connect(port, "ivory-midi-output")
            .map_err(|e| MidiError::DeviceUnavailable(format!("{}: {}", name, e)))?;
        tracing::debug!(device = %name, "midi output opened");
        Ok(Box::new(MidirMidiOutputSink {
            name,
            connection: Some(connection),
        }))
    }
}

impl Default for MidirMidiOutputPort {
    fn default() -> Self {
        Self::new("Ivory")
    }
}

pub struct MidirMidiOutputSink {
    name: String,
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputSink for MidirMidiOutputSink {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| MidiError::DeviceUnavailable(self.name.clone()))?;
        connection
            .send(message)
            .map_err(|e| MidiError::Backend(e.to_string()))
    }
}

impl Drop for MidirMidiOutputSink {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            tracing::debug!(device = %self.name, "midi output closed");
        }
    }
}

impl MidiOutputPort for MidirMidiOutputPort {
    fn list_outputs(&self) -> Result<Vec<MidiOutputDevice>, MidiError> {
        let midi_out = self.create_midi_out()?;
        let devices = midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = Self::port_name(&midi_out, port);
                MidiOutputDevice {
                    id: Self::device_id(index, &name),
                    name,
                }
            })
            .collect();
        Ok(devices)
    }

    fn open_output(&self, device_id: &DeviceId) -> Result<Box<dyn MidiOutputSink>, MidiError> {
        let midi_out = self.create_midi_out()?;
        let ports = midi_out.ports();
        let mut selected = None;
        for (index, port) in ports.iter().enumerate() {
            let name = Self::port_name(&midi_out, port);
            if &Self::device_id(index, &name) == device_id {
                selected = Some((port.clone(), name));
                break;
            }
        }

        let (port, name) =
            selected.ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;
        Self::connect(midi_out, &port, name)
    }

    /// The first port the backend enumerates, which is the system synth on
    /// platforms that provide one.
    fn open_default_output(&self) -> Result<Box<dyn MidiOutputSink>, MidiError> {
        let midi_out = self.create_midi_out()?;
        let port = midi_out
            .ports()
            .into_iter()
            .next()
            .ok_or_else(|| MidiError::DeviceNotFound("no midi outputs".to_string()))?;
        let name = Self::port_name(&midi_out, &port);
        Self::connect(midi_out, &port, name)
    }
}
