//! Error types shared across the splitter, its sinks and the device layer

use thiserror::Error;

/// A MIDI event that cannot be legally encoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("channel {0} is outside 0-15")]
    InvalidChannel(u8),
    #[error("data byte {0} is outside 0-127")]
    InvalidData(u8),
    #[error("pitch bend {0} is outside 0-16383")]
    InvalidPitchBend(u16),
    #[error("malformed MIDI message: {0}")]
    Malformed(String),
}

/// Failure while forwarding an event downstream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// Failure while opening or binding a MIDI device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("failed to create MIDI client: {0}")]
    Init(String),
    #[error("MIDI port '{0}' not found")]
    NotFound(String),
    #[error("failed to connect to MIDI device '{name}': {reason}")]
    Connect { name: String, reason: String },
    #[error("MIDI device '{0}' did not supply a receiver")]
    NoReceiver(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
