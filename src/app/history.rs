//! Reception history — bounded, newest-first log of bus telemetry.
//!
//! The read loop is the only appender; `clear` may race with it from the
//! UI thread.  Both go through one mutex so neither sees a half-applied
//! update.  The ring holds [`HISTORY_CAPACITY`] entries; when full the
//! oldest entry is evicted.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use heapless::Deque;
use serde::{Deserialize, Serialize};

use crate::protocol::hex::{HexError, parse_hex_bytes};

/// Maximum number of retained entries.
pub const HISTORY_CAPACITY: usize = 256;

/// One received telemetry frame.  Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique, strictly increasing; wall-clock milliseconds at creation.
    pub id: String,
    pub timestamp: SystemTime,
    pub bus: u8,
    /// Hex text as reported by the gateway (`"0A 1B"`).
    pub data: String,
}

impl HistoryEntry {
    /// Decode `data` into raw bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, HexError> {
        parse_hex_bytes(&self.data)
    }
}

struct Ring {
    entries: Deque<HistoryEntry, HISTORY_CAPACITY>,
    last_id: u64,
}

/// Thread-safe history store.
pub struct HistoryStore {
    inner: Mutex<Ring>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Ring {
                entries: Deque::new(),
                last_id: 0,
            }),
        }
    }

    /// Create an entry stamped now with a fresh id, prepend it and
    /// return a copy.
    pub fn record(&self, bus: u8, data: impl Into<String>) -> HistoryEntry {
        let timestamp = SystemTime::now();
        let mut ring = self.lock();

        let millis = timestamp
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let id = millis.max(ring.last_id + 1);
        ring.last_id = id;

        let entry = HistoryEntry {
            id: id.to_string(),
            timestamp,
            bus,
            data: data.into(),
        };
        push_newest(&mut ring.entries, entry.clone());
        entry
    }

    /// Prepend an existing entry (newest-first).
    pub fn append(&self, entry: HistoryEntry) {
        push_newest(&mut self.lock().entries, entry);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Snapshot of all entries, newest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Snapshot of the entries for one bus, newest first.
    pub fn for_bus(&self, bus: u8) -> Vec<HistoryEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.bus == bus)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<HistoryEntry> {
        self.lock().entries.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn push_newest(entries: &mut Deque<HistoryEntry, HISTORY_CAPACITY>, entry: HistoryEntry) {
    if entries.is_full() {
        entries.pop_back();
    }
    // Cannot fail: a slot was freed above.
    let _ = entries.push_front(entry);
}
