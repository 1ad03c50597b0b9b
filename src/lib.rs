pub mod config;
pub mod error;
pub mod logging;
pub mod midi;

pub use config::{BridgeConfig, ResetPolicy, SplitterConfig};
pub use error::{ConfigError, DeviceError, EventError, SinkError};
pub use midi::{MidiDevice, MidiEvent, MidiSink, MidiSplitter};
