//! MIDI event types and their byte encoding
//!
//! Channel messages carry their 4-bit channel and 7-bit data fields as plain
//! `u8`s; [`MidiEvent::validate`] is the single place that checks ranges.
//! Parsing from raw bytes goes through `midly`'s live-event parser.

use midly::live::{LiveEvent, SystemRealtime};
use midly::MidiMessage;
use serde::Serialize;

use crate::error::EventError;

/// Number of addressable MIDI channels
pub const CHANNEL_COUNT: usize = 16;

/// MIDI events as seen by the splitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note on event
    NoteOn {
        /// MIDI channel (0-15)
        channel: u8,
        /// MIDI note number (0-127)
        note: u8,
        /// Velocity (0-127), 0 means release
        velocity: u8,
    },
    /// Note off event
    NoteOff {
        /// MIDI channel (0-15)
        channel: u8,
        /// MIDI note number (0-127)
        note: u8,
        /// Release velocity (0-127, often ignored)
        velocity: u8,
    },
    /// Polyphonic key pressure
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    /// Control change (CC) event
    ControlChange {
        /// MIDI channel (0-15)
        channel: u8,
        /// Controller number (0-127)
        controller: u8,
        /// Controller value (0-127)
        value: u8,
    },
    /// Program (patch) change, also used as a "stop everything" marker by players
    ProgramChange { channel: u8, program: u8 },
    /// Channel pressure (aftertouch)
    ChannelPressure { channel: u8, pressure: u8 },
    /// Pitch bend event
    PitchBend {
        /// MIDI channel (0-15)
        channel: u8,
        /// 14-bit pitch bend value (0-16383, center at 8192)
        value: u16,
    },
    /// System reset (0xFF)
    SystemReset,
    /// Any other system common, realtime or sysex message, kept verbatim
    System(Vec<u8>),
}

/// Coarse classification used by diagnostics and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    SystemReset,
    System,
}

impl MidiEvent {
    /// Create a note on event
    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    /// Create a note off event with zero release velocity
    #[inline]
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::NoteOff {
            channel,
            note,
            velocity: 0,
        }
    }

    /// Create a control change event
    #[inline]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::ControlChange {
            channel,
            controller,
            value,
        }
    }

    /// Create a program change event
    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::ProgramChange { channel, program }
    }

    /// Create a pitch bend event
    #[inline]
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        Self::PitchBend { channel, value }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::NoteOn { .. } => EventKind::NoteOn,
            Self::NoteOff { .. } => EventKind::NoteOff,
            Self::PolyPressure { .. } => EventKind::PolyPressure,
            Self::ControlChange { .. } => EventKind::ControlChange,
            Self::ProgramChange { .. } => EventKind::ProgramChange,
            Self::ChannelPressure { .. } => EventKind::ChannelPressure,
            Self::PitchBend { .. } => EventKind::PitchBend,
            Self::SystemReset => EventKind::SystemReset,
            Self::System(_) => EventKind::System,
        }
    }

    /// Channel of a channel message, `None` for system messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::PolyPressure { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PitchBend { channel, .. } => Some(channel),
            Self::SystemReset | Self::System(_) => None,
        }
    }

    /// True for events that wipe the sounding state of the receiving device
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::ProgramChange { .. } | Self::SystemReset)
    }

    /// Check every field against its MIDI range
    pub fn validate(&self) -> Result<(), EventError> {
        fn data(byte: u8) -> Result<(), EventError> {
            if byte > 0x7F {
                return Err(EventError::InvalidData(byte));
            }
            Ok(())
        }

        if let Some(channel) = self.channel() {
            if channel as usize >= CHANNEL_COUNT {
                return Err(EventError::InvalidChannel(channel));
            }
        }

        match *self {
            Self::NoteOn { note, velocity, .. } | Self::NoteOff { note, velocity, .. } => {
                data(note)?;
                data(velocity)
            }
            Self::PolyPressure { note, pressure, .. } => {
                data(note)?;
                data(pressure)
            }
            Self::ControlChange {
                controller, value, ..
            } => {
                data(controller)?;
                data(value)
            }
            Self::ProgramChange { program, .. } => data(program),
            Self::ChannelPressure { pressure, .. } => data(pressure),
            Self::PitchBend { value, .. } => {
                if value > 0x3FFF {
                    return Err(EventError::InvalidPitchBend(value));
                }
                Ok(())
            }
            Self::SystemReset => Ok(()),
            Self::System(ref bytes) => match bytes.first() {
                Some(status) if *status >= 0xF0 => Ok(()),
                _ => Err(EventError::Malformed(format!(
                    "system message must start with a status byte >= 0xF0, got {:02X?}",
                    bytes
                ))),
            },
        }
    }

    /// Copy of this event moved to `channel`
    ///
    /// Fails if the result would not be a legal MIDI message, which includes
    /// out-of-range data bytes carried over from the original event.
    pub fn with_channel(&self, channel: u8) -> Result<Self, EventError> {
        let mut moved = self.clone();
        match &mut moved {
            Self::NoteOn { channel: c, .. }
            | Self::NoteOff { channel: c, .. }
            | Self::PolyPressure { channel: c, .. }
            | Self::ControlChange { channel: c, .. }
            | Self::ProgramChange { channel: c, .. }
            | Self::ChannelPressure { channel: c, .. }
            | Self::PitchBend { channel: c, .. } => *c = channel,
            Self::SystemReset | Self::System(_) => {
                return Err(EventError::Malformed(
                    "system messages have no channel".to_string(),
                ))
            }
        }
        moved.validate()?;
        Ok(moved)
    }

    /// Encode as wire bytes. Fields are masked to their bit widths.
    pub fn to_bytes(&self) -> Vec<u8> {
        let status = |kind: u8, channel: u8| kind | (channel & 0x0F);
        match *self {
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => vec![status(0x80, channel), note & 0x7F, velocity & 0x7F],
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => vec![status(0x90, channel), note & 0x7F, velocity & 0x7F],
            Self::PolyPressure {
                channel,
                note,
                pressure,
            } => vec![status(0xA0, channel), note & 0x7F, pressure & 0x7F],
            Self::ControlChange {
                channel,
                controller,
                value,
            } => vec![status(0xB0, channel), controller & 0x7F, value & 0x7F],
            Self::ProgramChange { channel, program } => {
                vec![status(0xC0, channel), program & 0x7F]
            }
            Self::ChannelPressure { channel, pressure } => {
                vec![status(0xD0, channel), pressure & 0x7F]
            }
            Self::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![status(0xE0, channel), lsb, msb]
            }
            Self::SystemReset => vec![0xFF],
            Self::System(ref bytes) => bytes.clone(),
        }
    }

    /// Parse exactly one complete MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        // Sysex is forwarded as-is, framing bytes included
        if bytes.first() == Some(&0xF0) {
            return Ok(Self::System(bytes.to_vec()));
        }

        let live =
            LiveEvent::parse(bytes).map_err(|e| EventError::Malformed(format!("{}", e)))?;

        let event = match live {
            LiveEvent::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOff { key, vel } => Self::NoteOff {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOn { key, vel } => Self::NoteOn {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::Aftertouch { key, vel } => Self::PolyPressure {
                        channel,
                        note: key.as_int(),
                        pressure: vel.as_int(),
                    },
                    MidiMessage::Controller { controller, value } => Self::ControlChange {
                        channel,
                        controller: controller.as_int(),
                        value: value.as_int(),
                    },
                    MidiMessage::ProgramChange { program } => Self::ProgramChange {
                        channel,
                        program: program.as_int(),
                    },
                    MidiMessage::ChannelAftertouch { vel } => Self::ChannelPressure {
                        channel,
                        pressure: vel.as_int(),
                    },
                    MidiMessage::PitchBend { bend } => Self::PitchBend {
                        channel,
                        value: bend.0.as_int(),
                    },
                }
            }
            LiveEvent::Realtime(SystemRealtime::Reset) => Self::SystemReset,
            LiveEvent::Realtime(_) | LiveEvent::Common(_) => Self::System(bytes.to_vec()),
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_channel_rewrites_only_channel() {
        let event = MidiEvent::note_on(0, 60, 100);
        let moved = event.with_channel(5).unwrap();
        assert_eq!(moved, MidiEvent::note_on(5, 60, 100));
        // Original left untouched
        assert_eq!(event.channel(), Some(0));
    }

    #[test]
    fn test_with_channel_rejects_invalid_results() {
        let event = MidiEvent::note_on(0, 60, 100);
        assert_eq!(event.with_channel(16), Err(EventError::InvalidChannel(16)));

        let bad_note = MidiEvent::note_on(0, 200, 100);
        assert_eq!(bad_note.with_channel(1), Err(EventError::InvalidData(200)));

        assert!(MidiEvent::SystemReset.with_channel(0).is_err());
    }

    #[test]
    fn test_encode_status_bytes() {
        assert_eq!(MidiEvent::note_on(3, 60, 100).to_bytes(), vec![0x93, 60, 100]);
        assert_eq!(MidiEvent::note_off(15, 64).to_bytes(), vec![0x8F, 64, 0]);
        assert_eq!(MidiEvent::program_change(2, 7).to_bytes(), vec![0xC2, 7]);
        assert_eq!(MidiEvent::pitch_bend(0, 8192).to_bytes(), vec![0xE0, 0x00, 0x40]);
        assert_eq!(MidiEvent::SystemReset.to_bytes(), vec![0xFF]);
    }

    #[test]
    fn test_parse_channel_messages() {
        assert_eq!(
            MidiEvent::from_bytes(&[0x91, 64, 90]).unwrap(),
            MidiEvent::note_on(1, 64, 90)
        );
        assert_eq!(
            MidiEvent::from_bytes(&[0x8A, 64, 0]).unwrap(),
            MidiEvent::note_off(10, 64)
        );
        assert_eq!(
            MidiEvent::from_bytes(&[0xB0, 123, 0]).unwrap(),
            MidiEvent::control_change(0, 123, 0)
        );
        assert_eq!(
            MidiEvent::from_bytes(&[0xE3, 0x00, 0x40]).unwrap(),
            MidiEvent::pitch_bend(3, 8192)
        );
    }

    #[test]
    fn test_parse_system_messages() {
        assert_eq!(MidiEvent::from_bytes(&[0xFF]).unwrap(), MidiEvent::SystemReset);
        assert_eq!(
            MidiEvent::from_bytes(&[0xF8]).unwrap(),
            MidiEvent::System(vec![0xF8])
        );
        assert!(MidiEvent::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_reset_classification() {
        assert!(MidiEvent::program_change(0, 1).is_reset());
        assert!(MidiEvent::SystemReset.is_reset());
        assert!(!MidiEvent::note_on(0, 60, 1).is_reset());
        assert!(!MidiEvent::control_change(0, 123, 0).is_reset());
    }
}
