use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::proto::LogEntry;

/// Entries retained per container unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity circular store of log entries for one container.
///
/// Slots are an array indexed by a write cursor; once the buffer wraps, each
/// append overwrites the oldest entry. A slot that was never written holds
/// `None` and is skipped by [`RingBuffer::snapshot`].
///
/// The lock is held only for a single append or for copying the populated
/// slots out, so a reader never stalls the writer for longer than one O(N)
/// copy and never observes a half-written entry.
#[derive(Debug)]
pub struct RingBuffer {
    inner: Mutex<Slots>,
    capacity: usize,
    /// Appends ever made (not capped at capacity)
    total_written: AtomicU64,
}

#[derive(Debug)]
struct Slots {
    entries: Box<[Option<LogEntry>]>,
    /// Next slot to write; also the oldest slot once the ring has wrapped
    cursor: usize,
}

impl RingBuffer {
    /// Create an empty ring. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Slots {
                entries: (0..capacity).map(|_| None).collect(),
                cursor: 0,
            }),
            capacity,
            total_written: AtomicU64::new(0),
        }
    }

    /// Write `entry` at the cursor and advance it, overwriting the oldest
    /// entry when full.
    pub fn append(&self, entry: LogEntry) {
        let mut slots = self.inner.lock();
        let cursor = slots.cursor;
        slots.entries[cursor] = Some(entry);
        slots.cursor = (cursor + 1) % self.capacity;
        self.total_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of every populated slot, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        let slots = self.inner.lock();
        let (newer, older) = slots.entries.split_at(slots.cursor);
        older
            .iter()
            .chain(newer.iter())
            .flatten()
            .cloned()
            .collect()
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        let written = self.total_written();
        usize::try_from(written).map_or(self.capacity, |w| w.min(self.capacity))
    }

    pub fn is_empty(&self) -> bool {
        self.total_written() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
