//! Downstream consumers of processed MIDI
//!
//! A [`MidiSink`] takes events one at a time. A [`MidiDevice`] is something
//! that has to be opened before it can hand out a sink and closed afterwards.
//! [`SinkBinding`] ties the two together so an opened device is always
//! closed, both on the failure path of opening and when the binding goes away.

use std::sync::Arc;

use parking_lot::Mutex;

use super::events::MidiEvent;
use crate::error::{DeviceError, SinkError};

/// A consumer of MIDI events
///
/// `timestamp` is in microseconds; `None` means "no timing information,
/// process immediately".
pub trait MidiSink: Send {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError>;

    /// Release whatever the sink holds. Further sends may fail or be ignored.
    fn shutdown(&mut self);

    /// Human-readable name for logs
    fn describe(&self) -> String {
        "MIDI sink".to_string()
    }
}

/// A sink shared between threads, serialized by its mutex
pub type SharedSink = Arc<Mutex<dyn MidiSink>>;

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        (**self).send(event, timestamp)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: MidiSink + ?Sized> MidiSink for Arc<Mutex<S>> {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        self.lock().send(event, timestamp)
    }

    fn shutdown(&mut self) {
        self.lock().shutdown()
    }

    fn describe(&self) -> String {
        self.lock().describe()
    }
}

/// A MIDI endpoint with an explicit open/close lifecycle
pub trait MidiDevice: Send {
    fn name(&self) -> String;

    fn open(&mut self) -> Result<(), DeviceError>;

    fn is_open(&self) -> bool;

    /// Obtain a sink writing to this device. Only valid while open.
    fn receiver(&mut self) -> Result<Box<dyn MidiSink>, DeviceError>;

    fn close(&mut self);
}

/// Where a splitter forwards its output
pub enum SinkBinding {
    /// A sink whose lifecycle belongs to the caller
    Direct(Box<dyn MidiSink>),
    /// A device opened by the binding, closed when the binding is dropped
    Device {
        device: Box<dyn MidiDevice>,
        sink: Box<dyn MidiSink>,
    },
}

impl SinkBinding {
    pub fn direct(sink: impl MidiSink + 'static) -> Self {
        Self::Direct(Box::new(sink))
    }

    /// Open `device` and take its receiver
    ///
    /// If anything fails after the device was opened, the device is closed
    /// again before the error is returned.
    pub fn open(mut device: Box<dyn MidiDevice>) -> Result<Self, DeviceError> {
        if let Err(e) = device.open() {
            if device.is_open() {
                device.close();
            }
            return Err(e);
        }

        match device.receiver() {
            Ok(sink) => {
                log::info!("Opened MIDI device: {}", device.name());
                Ok(Self::Device { device, sink })
            }
            Err(e) => {
                log::warn!("MIDI device {} opened without a receiver, closing", device.name());
                device.close();
                Err(e)
            }
        }
    }

    pub fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        match self {
            Self::Direct(sink) => sink.send(event, timestamp),
            Self::Device { sink, .. } => sink.send(event, timestamp),
        }
    }

    pub fn owns_device(&self) -> bool {
        matches!(self, Self::Device { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Direct(sink) => sink.describe(),
            Self::Device { device, .. } => device.name(),
        }
    }
}

/// A binding can itself be shared as a sink; shutting it down closes an owned device
impl MidiSink for SinkBinding {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        SinkBinding::send(self, event, timestamp)
    }

    fn shutdown(&mut self) {
        if let Self::Device { device, .. } = self {
            if device.is_open() {
                log::info!("Closing MIDI device: {}", device.name());
                device.close();
            }
        }
    }

    fn describe(&self) -> String {
        SinkBinding::describe(self)
    }
}

impl Drop for SinkBinding {
    fn drop(&mut self) {
        MidiSink::shutdown(self);
    }
}
