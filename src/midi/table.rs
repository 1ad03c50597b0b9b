//! Origin note to assigned note bookkeeping
//!
//! Entries are kept in insertion order and the same origin may appear more
//! than once when a note is retriggered before it is released. Lookups return
//! the oldest entry, so repeated releases unwind in FIFO order.

use serde::Serialize;

/// A (channel, note) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoteKey {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// MIDI note number (0-127)
    pub note: u8,
}

impl NoteKey {
    #[inline]
    pub fn new(channel: u8, note: u8) -> Self {
        Self { channel, note }
    }
}

/// Insertion-ordered multimap of origin keys to assigned keys
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    entries: Vec<(NoteKey, NoteKey)>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a translation. Existing entries for `origin` are kept.
    pub fn insert(&mut self, origin: NoteKey, assigned: NoteKey) {
        self.entries.push((origin, assigned));
    }

    /// Oldest assignment still recorded for `origin`
    pub fn lookup_first(&self, origin: NoteKey) -> Option<NoteKey> {
        self.entries
            .iter()
            .find(|(key, _)| *key == origin)
            .map(|&(_, assigned)| assigned)
    }

    /// Remove the first entry matching exactly `origin -> assigned`.
    /// Returns false if no such entry exists.
    pub fn remove_one(&mut self, origin: NoteKey, assigned: NoteKey) -> bool {
        match self
            .entries
            .iter()
            .position(|&entry| entry == (origin, assigned))
        {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove and return every entry, oldest first
    pub fn drain(&mut self) -> Vec<(NoteKey, NoteKey)> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries assigned to `channel`
    pub fn assigned_to(&self, channel: u8) -> usize {
        self.entries
            .iter()
            .filter(|(_, assigned)| assigned.channel == channel)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NoteKey, NoteKey)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_oldest() {
        let mut table = TranslationTable::new();
        let origin = NoteKey::new(0, 60);
        table.insert(origin, NoteKey::new(3, 60));
        table.insert(origin, NoteKey::new(5, 60));

        assert_eq!(table.lookup_first(origin), Some(NoteKey::new(3, 60)));
        assert_eq!(table.lookup_first(NoteKey::new(1, 60)), None);
    }

    #[test]
    fn test_remove_one_leaves_other_duplicates() {
        let mut table = TranslationTable::new();
        let origin = NoteKey::new(0, 60);
        table.insert(origin, NoteKey::new(3, 60));
        table.insert(origin, NoteKey::new(5, 60));
        table.insert(origin, NoteKey::new(3, 60));

        assert!(table.remove_one(origin, NoteKey::new(3, 60)));
        assert_eq!(table.len(), 2);
        // The next oldest is now the channel 5 entry
        assert_eq!(table.lookup_first(origin), Some(NoteKey::new(5, 60)));
        assert_eq!(table.assigned_to(3), 1);
    }

    #[test]
    fn test_remove_missing_pair() {
        let mut table = TranslationTable::new();
        table.insert(NoteKey::new(0, 60), NoteKey::new(0, 60));
        assert!(!table.remove_one(NoteKey::new(0, 60), NoteKey::new(1, 60)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_drain_and_clear() {
        let mut table = TranslationTable::new();
        table.insert(NoteKey::new(0, 60), NoteKey::new(0, 60));
        table.insert(NoteKey::new(0, 64), NoteKey::new(1, 64));

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].1, NoteKey::new(1, 64));
        assert!(table.is_empty());

        table.insert(NoteKey::new(2, 10), NoteKey::new(2, 10));
        table.clear();
        assert!(table.is_empty());
    }
}
