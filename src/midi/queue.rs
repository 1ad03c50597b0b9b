//! Bounded event queue and a worker thread that drains it into a sink
//!
//! Uses a lock-free ring buffer for MIDI event passing.
//! Producer side has a Mutex for multi-producer access (input ports, CLI).
//! The worker owns the consumer side and forwards events in FIFO order.
//! [`QueueSink`] waits for room when the ring is full, so a slow transport
//! slows the producer down instead of losing note offs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

use super::events::MidiEvent;
use super::sink::MidiSink;
use crate::error::SinkError;

/// An event waiting to be processed, with its optional timestamp
pub type QueuedEvent = (MidiEvent, Option<u64>);

/// Thread-safe bounded MIDI event queue
pub struct EventQueue {
    /// Producer side - Mutex for multi-producer access
    producer: Mutex<ringbuf::HeapProd<QueuedEvent>>,
    /// Consumer side - only the worker pops
    consumer: Mutex<ringbuf::HeapCons<QueuedEvent>>,
    /// Capacity for logging overflow warnings
    capacity: usize,
    /// Set once the consumer is gone; waiting producers give up
    closed: AtomicBool,
}

/// How long a waiting producer sleeps before retrying a full queue
const RETRY_INTERVAL: Duration = Duration::from_micros(200);

impl EventQueue {
    /// Create a new MIDI event queue
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::new(capacity.max(1));
        let (producer, consumer) = rb.split();
        Self {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Push an event to the queue
    /// Returns true if successful, false if queue is full
    pub fn push(&self, event: MidiEvent, timestamp: Option<u64>) -> bool {
        if self.producer.lock().try_push((event, timestamp)).is_ok() {
            return true;
        }
        log::warn!("MIDI queue full (capacity: {}), event dropped", self.capacity);
        false
    }

    /// Push an event, waiting for the consumer to make room
    ///
    /// Returns false only if the queue was closed while full.
    pub fn push_wait(&self, event: MidiEvent, timestamp: Option<u64>) -> bool {
        let mut item = (event, timestamp);
        loop {
            match self.producer.lock().try_push(item) {
                Ok(()) => return true,
                Err(rejected) => item = rejected,
            }
            if self.is_closed() {
                log::warn!("MIDI queue closed, {:?} dropped", item.0.kind());
                return false;
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// Stop accepting waits; producers blocked in [`push_wait`](Self::push_wait) return
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pop the oldest event
    pub fn pop(&self) -> Option<QueuedEvent> {
        self.consumer.lock().try_pop()
    }

    /// Move all pending events into `buffer`, returning how many were drained
    pub fn drain_into(&self, buffer: &mut Vec<QueuedEvent>) -> usize {
        buffer.clear();
        let mut consumer = self.consumer.lock();
        while let Some(event) = consumer.try_pop() {
            buffer.push(event);
        }
        buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.consumer.lock().occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Queue front end; a full queue makes the caller wait, never drops
#[derive(Clone)]
pub struct QueueSink {
    queue: Arc<EventQueue>,
}

impl MidiSink for QueueSink {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        if self.queue.push_wait(event.clone(), timestamp) {
            Ok(())
        } else {
            Err(SinkError::Closed)
        }
    }

    fn shutdown(&mut self) {}

    fn describe(&self) -> String {
        format!("queue ({} slots)", self.queue.capacity())
    }
}

/// Shared state between worker thread and owner
struct WorkerShared {
    queue: Arc<EventQueue>,
    should_stop: AtomicBool,
}

/// Dedicated thread feeding a sink from an [`EventQueue`]
pub struct SplitterWorker {
    shared: Arc<WorkerShared>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SplitterWorker {
    /// Spawn a worker forwarding into `sink`, which it owns and shuts down on stop
    pub fn spawn(sink: impl MidiSink + 'static, capacity: usize) -> Self {
        let shared = Arc::new(WorkerShared {
            queue: Arc::new(EventQueue::new(capacity)),
            should_stop: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);
        let thread_handle = thread::spawn(move || {
            worker_thread(shared_clone, sink);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
        }
    }

    /// Enqueue an event. Returns false if the queue is full.
    pub fn push(&self, event: MidiEvent, timestamp: Option<u64>) -> bool {
        self.shared.queue.push(event, timestamp)
    }

    /// A cloneable sink that enqueues into this worker
    pub fn sink(&self) -> QueueSink {
        QueueSink {
            queue: Arc::clone(&self.shared.queue),
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Forward what is already queued, then stop the thread and shut the sink down
    pub fn stop(&mut self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("MIDI worker thread panicked");
            }
        }
        self.shared.queue.close();
    }
}

impl Drop for SplitterWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread function
fn worker_thread<S: MidiSink>(shared: Arc<WorkerShared>, mut sink: S) {
    let idle_tick = Duration::from_millis(1);
    let mut buffer = Vec::with_capacity(shared.queue.capacity());

    loop {
        // Read the flag before draining so nothing pushed before stop() is lost
        let stopping = shared.should_stop.load(Ordering::SeqCst);

        if shared.queue.drain_into(&mut buffer) == 0 {
            if stopping {
                break;
            }
            thread::sleep(idle_tick);
            continue;
        }

        for (event, timestamp) in buffer.drain(..) {
            if let Err(e) = sink.send(&event, timestamp) {
                log::error!("Failed to forward {:?} to {}: {}", event.kind(), sink.describe(), e);
            }
        }
    }

    sink.shutdown();
    log::debug!("MIDI worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::sink::tests::RecordingSink;
    use crate::midi::splitter::MidiSplitter;

    #[test]
    fn test_queue_fifo() {
        let queue = EventQueue::new(16);
        assert!(queue.push(MidiEvent::note_on(0, 60, 100), None));
        assert!(queue.push(MidiEvent::note_on(0, 64, 80), Some(5)));
        assert!(queue.push(MidiEvent::note_off(0, 60), None));

        let mut buffer = Vec::with_capacity(8);
        assert_eq!(queue.drain_into(&mut buffer), 3);
        assert_eq!(buffer[1], (MidiEvent::note_on(0, 64, 80), Some(5)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_overflow() {
        let queue = EventQueue::new(4);
        for note in 60..64 {
            assert!(queue.push(MidiEvent::note_on(0, note, 100), None));
        }

        // This should fail (queue full)
        assert!(!queue.push(MidiEvent::note_on(0, 64, 100), None));
        assert_eq!(queue.len(), 4);
        assert!(queue.pop().is_some());
        assert_eq!(queue.len(), 3);
    }

    /// Sink that takes its time with every event
    struct SlowSink(RecordingSink);

    impl MidiSink for SlowSink {
        fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
            thread::sleep(Duration::from_millis(2));
            self.0.send(event, timestamp)
        }

        fn shutdown(&mut self) {}
    }

    #[test]
    fn test_full_queue_waits_instead_of_dropping() {
        let sink = RecordingSink::default();
        let events = sink.events.clone();

        let mut worker = SplitterWorker::spawn(SlowSink(sink), 2);
        let mut front = worker.sink();
        for note in 0..10 {
            front.send(&MidiEvent::note_off(0, 60 + note), None).unwrap();
        }
        worker.stop();

        let notes: Vec<MidiEvent> = events.lock().iter().map(|(e, _)| e.clone()).collect();
        let expected: Vec<MidiEvent> = (0..10).map(|n| MidiEvent::note_off(0, 60 + n)).collect();
        assert_eq!(notes, expected);
    }

    #[test]
    fn test_closed_full_queue_rejects_waiting_push() {
        let queue = EventQueue::new(1);
        assert!(queue.push(MidiEvent::note_on(0, 60, 100), None));
        queue.close();
        assert!(!queue.push_wait(MidiEvent::note_off(0, 60), None));
    }

    #[test]
    fn test_worker_drains_in_order_on_stop() {
        let sink = RecordingSink::default();
        let events = sink.events.clone();
        let shut_down = sink.shut_down.clone();

        let mut worker = SplitterWorker::spawn(MidiSplitter::new(sink), 64);
        let mut front = worker.sink();
        for note in 0..10 {
            front.send(&MidiEvent::note_on(0, 60 + note, 100), None).unwrap();
        }
        worker.stop();

        let channels: Vec<u8> = events.lock().iter().filter_map(|(e, _)| e.channel()).collect();
        assert_eq!(channels, (0..10).collect::<Vec<u8>>());
        // The splitter was shut down, which leaves its direct sink alone
        assert!(!*shut_down.lock());
    }
}
