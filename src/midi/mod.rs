//! MIDI channel splitting for single-voice instruments
//!
//! Provides the event model, the channel splitter and its bookkeeping,
//! sinks and devices, and midir-backed input/output ports.

pub mod dispatcher;
pub mod events;
pub mod forwarder;
pub mod input;
pub mod output;
pub mod pool;
pub mod port;
pub mod queue;
pub mod sink;
pub mod splitter;
pub mod table;
pub mod wire;

pub use dispatcher::Dispatcher;
pub use events::{EventKind, MidiEvent, CHANNEL_COUNT};
pub use forwarder::Forwarder;
pub use input::{list_input_ports, MidiInputManager};
pub use output::{list_output_ports, MidirOutputDevice};
pub use pool::ChannelPool;
pub use port::MidiPortInfo;
pub use queue::{EventQueue, QueueSink, SplitterWorker};
pub use sink::{MidiDevice, MidiSink, SharedSink, SinkBinding};
pub use splitter::{MidiSplitter, SplitterState, TraceKind, TraceRecord};
pub use table::{NoteKey, TranslationTable};
pub use wire::decode_packet;
