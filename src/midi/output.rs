//! MIDI output ports via midir
//!
//! [`MidirOutputDevice`] is the hardware-backed [`MidiDevice`]: opening it
//! connects to the port, its receiver writes encoded events to the
//! connection, and closing it drops the connection.

use std::sync::Arc;

use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;

use super::events::MidiEvent;
use super::port::{select_port, MidiPortInfo};
use super::sink::{MidiDevice, MidiSink};
use crate::error::{DeviceError, SinkError};

const CLIENT_NAME: &str = "midisplit-output";

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<MidiPortInfo>, DeviceError> {
    let midi_out =
        MidiOutput::new("midisplit-enumerate").map_err(|e| DeviceError::Init(e.to_string()))?;
    Ok(port_infos(&midi_out))
}

fn port_infos(midi_out: &MidiOutput) -> Vec<MidiPortInfo> {
    midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortInfo {
            index,
            name: midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
        })
        .collect()
}

type SharedConnection = Arc<Mutex<Option<MidiOutputConnection>>>;

/// An output port that is connected on open and disconnected on close
pub struct MidirOutputDevice {
    /// Port index or name fragment, `None` for the first port
    selector: Option<String>,
    /// Resolved port name once opened
    port_name: Option<String>,
    connection: SharedConnection,
}

impl MidirOutputDevice {
    pub fn new(selector: Option<&str>) -> Self {
        Self {
            selector: selector.map(str::to_string),
            port_name: None,
            connection: Arc::new(Mutex::new(None)),
        }
    }
}

impl MidiDevice for MidirOutputDevice {
    fn name(&self) -> String {
        self.port_name
            .clone()
            .or_else(|| self.selector.clone())
            .unwrap_or_else(|| "default output".to_string())
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.is_open() {
            return Ok(());
        }

        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
        let infos = port_infos(&midi_out);
        let index = select_port(&infos, self.selector.as_deref())
            .ok_or_else(|| DeviceError::NotFound(self.name()))?;

        let ports = midi_out.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| DeviceError::NotFound(self.name()))?;
        let port_name = infos[index].name.clone();

        log::info!("Connecting to MIDI output: {}", port_name);
        let connection = midi_out
            .connect(port, "midisplit-out")
            .map_err(|e| DeviceError::Connect {
                name: port_name.clone(),
                reason: e.to_string(),
            })?;

        *self.connection.lock() = Some(connection);
        self.port_name = Some(port_name);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn receiver(&mut self) -> Result<Box<dyn MidiSink>, DeviceError> {
        if !self.is_open() {
            return Err(DeviceError::NoReceiver(self.name()));
        }
        Ok(Box::new(PortSink {
            name: self.name(),
            connection: Arc::clone(&self.connection),
        }))
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.lock().take() {
            log::info!("Disconnecting from MIDI output: {}", self.name());
            connection.close();
        }
    }
}

/// Writes events to a device connection; fails with `Closed` once the device closes
struct PortSink {
    name: String,
    connection: SharedConnection,
}

impl MidiSink for PortSink {
    fn send(&mut self, event: &MidiEvent, _timestamp: Option<u64>) -> Result<(), SinkError> {
        let mut connection = self.connection.lock();
        let Some(connection) = connection.as_mut() else {
            return Err(SinkError::Closed);
        };
        connection
            .send(&event.to_bytes())
            .map_err(|e| SinkError::Send(e.to_string()))
    }

    // The device owns the connection
    fn shutdown(&mut self) {}

    fn describe(&self) -> String {
        self.name.clone()
    }
}
