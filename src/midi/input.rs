//! Feeding a midir input port into the pipeline
//!
//! Each packet the port delivers is split into events by [`decode_packet`]
//! and pushed into whatever [`SharedSink`] is currently installed as target.

use std::sync::Arc;

use midir::{MidiInput, MidiInputConnection};
use parking_lot::Mutex;

use super::events::MidiEvent;
use super::port::{select_port, MidiPortInfo};
use super::sink::{MidiSink, SharedSink};
use super::wire::decode_packet;
use crate::error::DeviceError;

/// An open port; dropping it closes the port
struct OpenPort {
    #[allow(dead_code)]
    handle: MidiInputConnection<()>,
    port_name: String,
    last_note: Arc<Mutex<Option<u8>>>,
}

/// Input ports currently visible to midir
pub fn list_input_ports() -> Result<Vec<MidiPortInfo>, DeviceError> {
    let midi_in =
        MidiInput::new("midisplit-enumerate").map_err(|e| DeviceError::Init(e.to_string()))?;
    Ok(port_infos(&midi_in))
}

fn port_infos(midi_in: &MidiInput) -> Vec<MidiPortInfo> {
    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortInfo {
            index,
            name: midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("input #{}", index)),
        })
        .collect()
}

/// Connects one input port to a target sink
///
/// The target lives behind its own lock so it can be swapped while the
/// midir callback is running.
pub struct MidiInputManager {
    port: Mutex<Option<OpenPort>>,
    target: Arc<Mutex<Option<SharedSink>>>,
}

impl MidiInputManager {
    pub fn new() -> Self {
        Self {
            port: Mutex::new(None),
            target: Arc::new(Mutex::new(None)),
        }
    }

    /// Swap the sink that receives decoded events; the port stays open
    pub fn set_target(&self, target: Option<SharedSink>) {
        *self.target.lock() = target;
    }

    /// Connect to an input port by index or name fragment, returning its name
    pub fn connect(&self, selector: Option<&str>, target: SharedSink) -> Result<String, DeviceError> {
        self.disconnect();

        *self.target.lock() = Some(target);

        let midi_in =
            MidiInput::new("midisplit-input").map_err(|e| DeviceError::Init(e.to_string()))?;

        let infos = port_infos(&midi_in);
        let wanted = selector.unwrap_or("default input").to_string();
        let index = select_port(&infos, selector).ok_or_else(|| DeviceError::NotFound(wanted.clone()))?;
        let ports = midi_in.ports();
        let port = ports.get(index).ok_or(DeviceError::NotFound(wanted))?;
        let port_name = infos[index].name.clone();

        let callback_target = Arc::clone(&self.target);
        let last_note = Arc::new(Mutex::new(None::<u8>));
        let callback_note = Arc::clone(&last_note);

        let handle = midi_in
            .connect(
                port,
                "midisplit-in",
                move |timestamp, message, _| {
                    Self::handle_packet(timestamp, message, &callback_target, &callback_note);
                },
                (),
            )
            .map_err(|e| DeviceError::Connect {
                name: port_name.clone(),
                reason: e.to_string(),
            })?;

        *self.port.lock() = Some(OpenPort {
            handle,
            port_name: port_name.clone(),
            last_note,
        });

        log::info!("Listening on MIDI input: {}", port_name);
        Ok(port_name)
    }

    /// Close the open port, if any
    pub fn disconnect(&self) {
        if let Some(open) = self.port.lock().take() {
            log::info!("Closing MIDI input: {}", open.port_name);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.lock().is_some()
    }

    pub fn connected_device_name(&self) -> Option<String> {
        self.port.lock().as_ref().map(|p| p.port_name.clone())
    }

    /// Pitch of the most recent sounding note-on
    pub fn last_note(&self) -> Option<u8> {
        self.port.lock().as_ref().and_then(|p| *p.last_note.lock())
    }

    fn handle_packet(
        timestamp: u64,
        message: &[u8],
        target: &Arc<Mutex<Option<SharedSink>>>,
        last_note: &Arc<Mutex<Option<u8>>>,
    ) {
        let Some(mut target) = target.lock().clone() else {
            return;
        };

        for event in decode_packet(message) {
            if let MidiEvent::NoteOn { note, velocity, .. } = event {
                if velocity > 0 {
                    *last_note.lock() = Some(note);
                }
            }
            log::trace!("MIDI in: {:?}", event);
            if let Err(e) = target.send(&event, Some(timestamp)) {
                log::error!("Failed to forward {:?} from input: {}", event.kind(), e);
            }
        }
    }
}

impl Default for MidiInputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::sink::tests::RecordingSink;

    #[test]
    fn test_manager_creation() {
        let manager = MidiInputManager::new();
        assert!(!manager.is_connected());
        assert!(manager.connected_device_name().is_none());
        assert!(manager.last_note().is_none());
    }

    #[test]
    fn test_list_input_ports_without_hardware() {
        let _ = list_input_ports();
    }

    #[test]
    fn test_packet_forwarding() {
        let sink = RecordingSink::default();
        let events = sink.events.clone();
        let target: SharedSink = Arc::new(Mutex::new(sink));
        let shared = Arc::new(Mutex::new(Some(target)));
        let last_note = Arc::new(Mutex::new(None));

        MidiInputManager::handle_packet(42, &[0x90, 60, 100, 0x90, 64, 100], &shared, &last_note);

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], (MidiEvent::note_on(0, 64, 100), Some(42)));
        assert_eq!(*last_note.lock(), Some(64));
    }

    #[test]
    fn test_packet_without_target_dropped() {
        let shared = Arc::new(Mutex::new(None));
        let last_note = Arc::new(Mutex::new(None));
        MidiInputManager::handle_packet(0, &[0x90, 60, 100], &shared, &last_note);
        assert!(last_note.lock().is_none());
    }
}
