//! Channel splitter
//!
//! Rewrites the channel of every note so that simultaneously sounding notes
//! land on distinct idle channels, for receivers where each channel can only
//! play one note at a time (floppy drives, steppers, solenoids).
//!
//! Note on: keep the original channel if it is idle, otherwise take the
//! lowest idle channel, otherwise share the least used channel. The choice is
//! recorded so the matching note off can be sent to the same channel.
//! Program change and system reset wipe all bookkeeping.
//!
//! Every event handed to [`MidiSplitter::process`] is forwarded exactly once,
//! in call order, on the caller's thread. Forwarding errors are logged and
//! never reach the caller.

use std::fmt;

use serde::Serialize;

use super::events::{MidiEvent, CHANNEL_COUNT};
use super::pool::ChannelPool;
use super::sink::{MidiDevice, MidiSink, SinkBinding};
use super::table::{NoteKey, TranslationTable};
use crate::config::{ResetPolicy, SplitterConfig};
use crate::error::{DeviceError, SinkError};

/// Lifecycle of a splitter. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitterState {
    Open,
    Closed,
}

/// Which decision a trace record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A note on was assigned an output channel
    NoteOn,
    /// A note off was matched to its assigned channel
    NoteOff,
    /// A note off had no recorded note on and passed through unchanged
    UnmatchedNoteOff,
    /// All assignments were dropped
    Reset,
}

/// One channel assignment decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    pub kind: TraceKind,
    /// Channel the event arrived on (absent for system resets)
    pub origin: Option<u8>,
    /// Channel the event left on (absent when nothing was assigned)
    pub assigned: Option<u8>,
    /// Usage counters after the decision
    pub usage: [u32; CHANNEL_COUNT],
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = |c: Option<u8>| c.map_or_else(|| "-".to_string(), |c| c.to_string());
        let usage: Vec<String> = self.usage.iter().map(|u| u.to_string()).collect();
        write!(
            f,
            "{:?} ch {} -> ch {} usage [{}]",
            self.kind,
            channel(self.origin),
            channel(self.assigned),
            usage.join(",")
        )
    }
}

type TraceHook = Box<dyn FnMut(&TraceRecord) + Send>;

/// Polyphonic-to-monophonic channel splitter
///
/// Single writer: all mutation goes through `&mut self`. To feed one splitter
/// from several threads wrap it in `Arc<parking_lot::Mutex<_>>`, which is
/// itself a [`MidiSink`] and holds the lock across translate and forward.
pub struct MidiSplitter {
    pool: ChannelPool,
    table: TranslationTable,
    binding: Option<SinkBinding>,
    state: SplitterState,
    config: SplitterConfig,
    trace_hook: Option<TraceHook>,
}

impl MidiSplitter {
    /// Create a splitter forwarding to a caller-owned sink
    pub fn new(sink: impl MidiSink + 'static) -> Self {
        Self::with_config(sink, SplitterConfig::default())
    }

    pub fn with_config(sink: impl MidiSink + 'static, config: SplitterConfig) -> Self {
        log::info!("Splitter sending to: {}", sink.describe());
        Self::from_binding(Some(SinkBinding::direct(sink)), config)
    }

    /// Create a splitter that opens `device` and closes it on shutdown
    ///
    /// No open handle is left behind if this fails.
    pub fn open_device(
        device: Box<dyn MidiDevice>,
        config: SplitterConfig,
    ) -> Result<Self, DeviceError> {
        let binding = SinkBinding::open(device)?;
        log::info!("Splitter sending to device: {}", binding.describe());
        Ok(Self::from_binding(Some(binding), config))
    }

    /// Create a splitter with nothing bound yet. Events are dropped until a
    /// sink or device is set.
    pub fn unbound(config: SplitterConfig) -> Self {
        Self::from_binding(None, config)
    }

    fn from_binding(binding: Option<SinkBinding>, config: SplitterConfig) -> Self {
        Self {
            pool: ChannelPool::new(),
            table: TranslationTable::new(),
            binding,
            state: SplitterState::Open,
            config,
            trace_hook: None,
        }
    }

    /// Receive a [`TraceRecord`] for every assignment decision
    pub fn set_trace_hook(&mut self, hook: impl FnMut(&TraceRecord) + Send + 'static) {
        self.trace_hook = Some(Box::new(hook));
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.config.trace = enabled;
    }

    pub fn set_reset_policy(&mut self, policy: ResetPolicy) {
        self.config.reset_policy = policy;
    }

    /// Forward to `sink` from now on. A previously opened device is closed.
    pub fn set_sink(&mut self, sink: impl MidiSink + 'static) {
        if self.state == SplitterState::Closed {
            log::warn!("Ignoring new sink for closed splitter");
            return;
        }
        log::info!("Splitter sending to: {}", sink.describe());
        self.binding = Some(SinkBinding::direct(sink));
    }

    /// Open `device` and forward to it from now on
    ///
    /// The new device is opened before the current binding is released, so
    /// on failure the splitter keeps forwarding where it did before.
    pub fn set_device(&mut self, device: Box<dyn MidiDevice>) -> Result<(), DeviceError> {
        if self.state == SplitterState::Closed {
            log::warn!("Ignoring device {} for closed splitter", device.name());
            return Ok(());
        }
        let binding = SinkBinding::open(device)?;
        log::info!("Splitter sending to device: {}", binding.describe());
        // Dropping the old binding closes its device
        self.binding = Some(binding);
        Ok(())
    }

    /// Translate `event` and forward the result
    ///
    /// Does nothing when closed or when no sink is bound.
    pub fn process(&mut self, event: &MidiEvent, timestamp: Option<u64>) {
        if self.state == SplitterState::Closed || self.binding.is_none() {
            return;
        }

        if event.is_reset() && self.config.reset_policy == ResetPolicy::ReleaseActive {
            for release in self.release_all() {
                self.forward(&release, timestamp);
            }
        }

        let translated = self.translate(event);
        self.forward(&translated, timestamp);
    }

    /// Apply channel assignment to `event` and update the bookkeeping
    ///
    /// Events other than notes and resets come back unchanged, as does
    /// everything once the splitter is closed.
    fn translate(&mut self, event: &MidiEvent) -> MidiEvent {
        if self.state == SplitterState::Closed {
            return event.clone();
        }

        let translated = match *event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } if velocity > 0 => self.assign(event, NoteKey::new(channel, note)),
            MidiEvent::NoteOn { channel, note, .. } | MidiEvent::NoteOff { channel, note, .. } => {
                self.release(event, NoteKey::new(channel, note))
            }
            _ if event.is_reset() => {
                self.reset();
                event.clone()
            }
            _ => event.clone(),
        };

        debug_assert_eq!(self.pool.total() as usize, self.table.len());
        translated
    }

    fn assign(&mut self, event: &MidiEvent, origin: NoteKey) -> MidiEvent {
        let candidate = if self.pool.is_available(origin.channel) {
            origin.channel
        } else if let Some(free) = self.pool.first_available() {
            free
        } else {
            // More notes than channels: double up on the quietest channel
            self.pool.least_used()
        };

        match event.with_channel(candidate) {
            Ok(moved) => {
                self.table.insert(origin, NoteKey::new(candidate, origin.note));
                self.pool.add_use(candidate);
                self.trace(TraceKind::NoteOn, Some(origin.channel), Some(candidate));
                moved
            }
            Err(e) => {
                log::warn!("Cannot move note on {:?} to channel {}: {}, forwarding unchanged", event, candidate, e);
                event.clone()
            }
        }
    }

    fn release(&mut self, event: &MidiEvent, origin: NoteKey) -> MidiEvent {
        let Some(assigned) = self.table.lookup_first(origin) else {
            // Note on predates this splitter, pass the release through
            self.trace(TraceKind::UnmatchedNoteOff, Some(origin.channel), None);
            return event.clone();
        };

        self.table.remove_one(origin, assigned);
        self.pool.remove_use(assigned.channel);
        self.trace(TraceKind::NoteOff, Some(origin.channel), Some(assigned.channel));

        event.with_channel(assigned.channel).unwrap_or_else(|e| {
            log::warn!("Cannot move note off {:?} to channel {}: {}, forwarding unchanged", event, assigned.channel, e);
            event.clone()
        })
    }

    fn reset(&mut self) {
        self.table.clear();
        self.pool.reset();
        self.trace(TraceKind::Reset, None, None);
    }

    /// Drain the table into note offs on the assigned channels, oldest first
    fn release_all(&mut self) -> Vec<MidiEvent> {
        let releases: Vec<MidiEvent> = self
            .table
            .drain()
            .into_iter()
            .map(|(_, assigned)| MidiEvent::note_off(assigned.channel, assigned.note))
            .collect();
        self.pool.reset();
        if !releases.is_empty() {
            log::debug!("Releasing {} active notes before reset", releases.len());
        }
        releases
    }

    fn forward(&mut self, event: &MidiEvent, timestamp: Option<u64>) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        if let Err(e) = binding.send(event, timestamp) {
            log::error!("Failed to forward {:?} to {}: {}", event.kind(), binding.describe(), e);
        }
    }

    fn trace(&mut self, kind: TraceKind, origin: Option<u8>, assigned: Option<u8>) {
        if !self.config.trace && self.trace_hook.is_none() {
            return;
        }
        let record = TraceRecord {
            kind,
            origin,
            assigned,
            usage: self.pool.snapshot(),
        };
        if self.config.trace {
            log::debug!(target: "midisplit::trace", "{}", record);
        }
        if let Some(hook) = self.trace_hook.as_mut() {
            hook(&record);
        }
    }

    /// Stop processing and release the bound sink. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.state == SplitterState::Closed {
            return;
        }
        self.state = SplitterState::Closed;
        if let Some(binding) = self.binding.take() {
            log::info!("Splitter closed, releasing {}", binding.describe());
        }
    }

    /// False once [`shutdown`](Self::shutdown) has been called
    pub fn is_running(&self) -> bool {
        self.state == SplitterState::Open
    }

    pub fn state(&self) -> SplitterState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Copy of the per-channel usage counters
    pub fn channel_usage(&self) -> [u32; CHANNEL_COUNT] {
        self.pool.snapshot()
    }

    /// Number of notes currently holding a channel
    pub fn active_notes(&self) -> usize {
        self.table.len()
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }
}

impl MidiSink for MidiSplitter {
    fn send(&mut self, event: &MidiEvent, timestamp: Option<u64>) -> Result<(), SinkError> {
        self.process(event, timestamp);
        Ok(())
    }

    fn shutdown(&mut self) {
        MidiSplitter::shutdown(self);
    }

    fn describe(&self) -> String {
        match &self.binding {
            Some(binding) => format!("splitter -> {}", binding.describe()),
            None => "splitter (unbound)".to_string(),
        }
    }
}
