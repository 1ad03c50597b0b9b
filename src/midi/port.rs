//! Port listing and selection shared by the input and output sides

use serde::Serialize;

/// Information about a MIDI port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MidiPortInfo {
    /// Port index (for connection)
    pub index: usize,
    /// Port name
    pub name: String,
}

/// Resolve a port selector against the available ports
///
/// `None` picks the first port, a number picks by index, anything else is a
/// case-insensitive name fragment.
pub fn select_port(ports: &[MidiPortInfo], selector: Option<&str>) -> Option<usize> {
    let Some(selector) = selector.map(str::trim).filter(|s| !s.is_empty()) else {
        return ports.first().map(|p| p.index);
    };

    if let Ok(index) = selector.parse::<usize>() {
        return ports.iter().find(|p| p.index == index).map(|p| p.index);
    }

    let wanted = selector.to_lowercase();
    ports
        .iter()
        .find(|p| p.name.to_lowercase().contains(&wanted))
        .map(|p| p.index)
}
