//! Replay history for reconnecting subscribers
//!
//! When a client reconnects with a `Last-Event-ID`, it should receive every
//! event it missed that is still retained. The history keeps the most recent
//! framed events in a fixed-capacity ring:
//! 1. Appending at capacity evicts the oldest entry
//! 2. Entries are contiguous in sequence id (eviction only touches the front)
//! 3. Lookup by id is index arithmetic against the first retained id

use std::collections::VecDeque;

use crate::event::FramedEvent;

/// Default number of retained events
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Bounded FIFO of recently broadcast events
#[derive(Debug)]
pub struct HistoryBuffer {
    /// Maximum number of retained events
    capacity: usize,
    /// Retained events, oldest first
    entries: VecDeque<FramedEvent>,
}

impl HistoryBuffer {
    /// Create a history with the default capacity (50 events)
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a history with the given capacity (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an event, evicting the oldest when full
    pub fn push(&mut self, event: FramedEvent) {
        debug_assert!(
            self.last_id().map_or(true, |last| event.id() == last + 1),
            "history ids must be contiguous"
        );

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(event);
    }

    /// Events with an id strictly greater than `id`, oldest first
    ///
    /// If `id` predates the oldest retained event, every retained event is
    /// returned. Callers are not told that older events were lost.
    pub fn entries_after(&self, id: u64) -> Vec<FramedEvent> {
        let first = match self.first_id() {
            Some(first) => first,
            None => return Vec::new(),
        };

        let skip = if id < first {
            0
        } else {
            // id >= first, so the subtraction cannot underflow
            usize::try_from((id - first).saturating_add(1)).unwrap_or(usize::MAX)
        };

        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Drop every retained event
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Id of the oldest retained event
    pub fn first_id(&self) -> Option<u64> {
        self.entries.front().map(FramedEvent::id)
    }

    /// Id of the newest retained event
    pub fn last_id(&self) -> Option<u64> {
        self.entries.back().map(FramedEvent::id)
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no events are retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}
