//! Pass-through sink with a swappable target
//!
//! Sits between an input port and either the splitter or the output device,
//! so splitting can be toggled without reconnecting the input.

use super::events::MidiEvent;
use super::sink::{MidiSink, SharedSink};
use crate::error::SinkError;

#[derive(Default)]
pub struct Forwarder {
    target: Option<SharedSink>,
}

impl Forwarder {
    pub fn new(target: Option<SharedSink>) -> Self {
        Self { target }
    }

    /// Replace the target. `None` makes the forwarder drop everything.
    pub fn set_target(&mut self, target: Option<SharedSink>) {
        self.target = target;
    }

    pub fn target(&self) -> Option<&SharedSink> {
        self.target.as_ref()
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

impl MidiSink for Forwarder {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        match self.target.as_mut() {
            Some(target) => target.send(event, timestamp),
            None => Ok(()),
        }
    }

    /// The target is shared, so shutting the forwarder down leaves it alone
    fn shutdown(&mut self) {}

    fn describe(&self) -> String {
        match &self.target {
            Some(target) => format!("forwarder -> {}", target.lock().describe()),
            None => "forwarder (no target)".to_string(),
        }
    }
}
