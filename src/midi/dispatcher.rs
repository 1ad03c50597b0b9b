//! Fan-out sink: one event stream delivered to several destinations
//!
//! Used when the same split output should reach more than one device, or a
//! device plus a monitor.

use std::sync::Arc;

use super::events::MidiEvent;
use super::sink::{MidiSink, SharedSink};
use crate::error::SinkError;

#[derive(Default)]
pub struct Dispatcher {
    targets: Vec<SharedSink>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target`. Returns false if the same sink is already registered.
    pub fn add(&mut self, target: SharedSink) -> bool {
        if self.contains(&target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Unregister `target`. Returns false if it was never added.
    pub fn remove(&mut self, target: &SharedSink) -> bool {
        match self.targets.iter().position(|t| Arc::ptr_eq(t, target)) {
            Some(index) => {
                self.targets.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, target: &SharedSink) -> bool {
        self.targets.iter().any(|t| Arc::ptr_eq(t, target))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl MidiSink for Dispatcher {
    /// Every target gets the event even if an earlier one fails; the first
    /// failure is reported.
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        let mut first_error = None;
        for target in self.targets.iter_mut() {
            if let Err(e) = target.send(event, timestamp) {
                log::warn!("Dispatch of {:?} to {} failed: {}", event.kind(), target.describe(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Shuts every registered target down
    fn shutdown(&mut self) {
        for target in self.targets.iter_mut() {
            target.shutdown();
        }
    }

    fn describe(&self) -> String {
        format!("dispatcher ({} targets)", self.targets.len())
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::midi::sink::tests::RecordingSink;
    use crate::midi::splitter::MidiSplitter;

    #[test]
    fn test_duplicates_ignored() {
        let target: SharedSink = Arc::new(Mutex::new(RecordingSink::default()));
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.add(target.clone()));
        assert!(!dispatcher.add(target.clone()));
        assert_eq!(dispatcher.len(), 1);

        assert!(dispatcher.remove(&target));
        assert!(!dispatcher.remove(&target));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_send_reaches_every_target() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let first_events = first.events.clone();
        let second_events = second.events.clone();

        let mut dispatcher = Dispatcher::new();
        dispatcher.add(Arc::new(Mutex::new(first)));
        dispatcher.add(Arc::new(Mutex::new(second)));
        dispatcher.send(&MidiEvent::note_on(3, 60, 90), Some(7)).unwrap();

        assert_eq!(first_events.lock()[0], (MidiEvent::note_on(3, 60, 90), Some(7)));
        assert_eq!(*first_events.lock(), *second_events.lock());
    }

    #[test]
    fn test_failing_target_does_not_starve_others() {
        let broken = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let healthy = RecordingSink::default();
        let events = healthy.events.clone();

        let mut dispatcher = Dispatcher::new();
        dispatcher.add(Arc::new(Mutex::new(broken)));
        dispatcher.add(Arc::new(Mutex::new(healthy)));

        let result = dispatcher.send(&MidiEvent::SystemReset, None);
        assert!(matches!(result, Err(SinkError::Closed)));
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_shutdown_reaches_every_target() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let flags = [first.shut_down.clone(), second.shut_down.clone()];

        let mut dispatcher = Dispatcher::new();
        dispatcher.add(Arc::new(Mutex::new(first)));
        dispatcher.add(Arc::new(Mutex::new(second)));
        dispatcher.shutdown();

        assert!(flags.iter().all(|flag| *flag.lock()));
    }

    #[test]
    fn test_split_output_mirrored() {
        let device = RecordingSink::default();
        let monitor = RecordingSink::default();
        let device_events = device.events.clone();
        let monitor_events = monitor.events.clone();

        let mut dispatcher = Dispatcher::new();
        dispatcher.add(Arc::new(Mutex::new(device)));
        dispatcher.add(Arc::new(Mutex::new(monitor)));

        let mut splitter = MidiSplitter::new(dispatcher);
        splitter.process(&MidiEvent::note_on(0, 60, 100), None);
        splitter.process(&MidiEvent::note_on(0, 64, 100), None);

        let channels: Vec<Option<u8>> =
            monitor_events.lock().iter().map(|(e, _)| e.channel()).collect();
        assert_eq!(channels, vec![Some(0), Some(1)]);
        assert_eq!(*device_events.lock(), *monitor_events.lock());
    }
}
