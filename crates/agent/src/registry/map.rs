use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ingest::IngestOutcome;
use crate::ring::RingBuffer;

/// Shared handle to one container's ring.
pub type BufferHandle = Arc<RingBuffer>;

/// Everything the registry tracks for one container.
///
/// Dropping a slot cancels its ingestion task, so a slot that is replaced or
/// removed can never leave a loop writing into a buffer nobody can reach.
#[derive(Debug)]
pub struct ContainerSlot {
    buffer: BufferHandle,
    cancel: CancellationToken,
    task: Option<JoinHandle<IngestOutcome>>,
    source: Option<PathBuf>,
    attached_at: DateTime<Utc>,
}

impl ContainerSlot {
    pub fn new(buffer: BufferHandle) -> Self {
        Self {
            buffer,
            cancel: CancellationToken::new(),
            task: None,
            source: None,
            attached_at: Utc::now(),
        }
    }

    /// Use an existing token, e.g. one already handed to a spawned loop.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_task(mut self, task: JoinHandle<IngestOutcome>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signal the ingestion loop and hand back its task (if still owned).
    pub fn stop_ingest(&mut self) -> Option<JoinHandle<IngestOutcome>> {
        self.cancel.cancel();
        self.task.take()
    }

    fn is_ingesting(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ContainerSlot {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Point-in-time description of a registered container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub container_id: String,
    pub source: Option<String>,
    pub attached_at: DateTime<Utc>,
    pub entries: usize,
    pub capacity: usize,
    pub total_written: u64,
    pub ingesting: bool,
}

/// Concurrent map: container_id → ring buffer and ingestion task.
///
/// Operations on the same id serialize on the owning shard; distinct ids
/// proceed in parallel.
#[derive(Debug)]
pub struct LogRegistry {
    slots: DashMap<String, ContainerSlot>,
    capacity: usize,
}

impl LogRegistry {
    /// `capacity` is the size of every ring this registry creates.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Install a fresh, empty ring for `container_id`.
    ///
    /// Any previous ring for the id is discarded and its loop cancelled.
    pub fn register(&self, container_id: &str) -> BufferHandle {
        let buffer = Arc::new(RingBuffer::new(self.capacity));
        self.insert(container_id, ContainerSlot::new(Arc::clone(&buffer)));
        buffer
    }

    /// Install `slot`, returning the slot it replaced (already cancelled).
    pub fn insert(&self, container_id: &str, slot: ContainerSlot) -> Option<ContainerSlot> {
        let previous = self.slots.insert(container_id.to_string(), slot);
        if let Some(prev) = &previous {
            prev.cancel.cancel();
            debug!(
                container_id,
                discarded = prev.buffer.len(),
                "Replaced existing log buffer"
            );
        }
        previous
    }

    pub fn lookup(&self, container_id: &str) -> Option<BufferHandle> {
        self.slots
            .get(container_id)
            .map(|slot| Arc::clone(&slot.buffer))
    }

    pub fn remove(&self, container_id: &str) -> Option<ContainerSlot> {
        self.slots.remove(container_id).map(|(_, slot)| slot)
    }

    /// Cancel the container's loop but keep its ring readable.
    pub fn detach(&self, container_id: &str) -> Option<Option<JoinHandle<IngestOutcome>>> {
        let mut slot = self.slots.get_mut(container_id)?;
        Some(slot.stop_ingest())
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.slots.contains_key(container_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered ids, sorted.
    pub fn container_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn summaries(&self) -> Vec<ContainerSummary> {
        let mut out: Vec<ContainerSummary> = self
            .slots
            .iter()
            .map(|r| {
                let slot = r.value();
                ContainerSummary {
                    container_id: r.key().clone(),
                    source: slot.source.as_ref().map(|p| p.display().to_string()),
                    attached_at: slot.attached_at,
                    entries: slot.buffer.len(),
                    capacity: slot.buffer.capacity(),
                    total_written: slot.buffer.total_written(),
                    ingesting: slot.is_ingesting(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::LogEntry;

    fn push(buffer: &RingBuffer, n: usize) {
        for i in 0..n {
            buffer.append(LogEntry::new("stdout", format!("oi-{}", i), i as i64));
        }
    }

    #[test]
    fn test_lookup_unknown_container_is_none() {
        let registry = LogRegistry::new(10);
        assert!(registry.lookup("nope").is_none());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_register_then_lookup_shares_buffer() {
        let registry = LogRegistry::new(10);
        let buffer = registry.register("abc");
        push(&buffer, 3);

        let found = registry.lookup("abc").expect("registered");
        assert!(Arc::ptr_eq(&buffer, &found));
        assert_eq!(found.len(), 3);
        assert_eq!(found.capacity(), 10);
    }

    #[test]
    fn test_reregister_discards_history() {
        let registry = LogRegistry::new(10);
        let first = registry.register("abc");
        push(&first, 5);

        registry.register("abc");
        let current = registry.lookup("abc").unwrap();
        assert!(current.is_empty());
        assert!(!Arc::ptr_eq(&first, &current));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_cancels_replaced_slot() {
        let registry = LogRegistry::new(4);
        let token = CancellationToken::new();
        let slot = ContainerSlot::new(Arc::new(RingBuffer::new(4))).with_cancel(token.clone());
        assert!(registry.insert("abc", slot).is_none());

        let replaced = registry.insert("abc", ContainerSlot::new(Arc::new(RingBuffer::new(4))));
        assert!(replaced.is_some());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_remove_releases_and_cancels() {
        let registry = LogRegistry::new(4);
        let token = CancellationToken::new();
        registry.insert(
            "abc",
            ContainerSlot::new(Arc::new(RingBuffer::new(4))).with_cancel(token.clone()),
        );

        let removed = registry.remove("abc");
        assert!(removed.is_some());
        drop(removed);
        assert!(token.is_cancelled());
        assert!(registry.lookup("abc").is_none());
        assert!(registry.remove("abc").is_none());
    }

    #[test]
    fn test_detach_keeps_buffer_readable() {
        let registry = LogRegistry::new(4);
        let buffer = registry.register("abc");
        push(&buffer, 2);

        assert!(matches!(registry.detach("abc"), Some(None)));
        assert_eq!(registry.lookup("abc").unwrap().len(), 2);
        assert!(registry.detach("missing").is_none());
    }

    #[test]
    fn test_summaries_sorted_by_id() {
        let registry = LogRegistry::new(8);
        push(&registry.register("b"), 9);
        registry.insert(
            "a",
            ContainerSlot::new(Arc::new(RingBuffer::new(8))).with_source("/run/a.fifo"),
        );

        let summaries = registry.summaries();
        assert_eq!(registry.container_ids(), vec!["a", "b"]);
        assert_eq!(summaries[0].source.as_deref(), Some("/run/a.fifo"));
        assert_eq!(summaries[1].entries, 8);
        assert_eq!(summaries[1].total_written, 9);
        assert!(!summaries[1].ingesting);
    }

    #[test]
    fn test_concurrent_register_and_lookup() {
        let registry = Arc::new(LogRegistry::new(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let own = format!("c-{}", t);
                        let buffer = registry.register(&own);
                        push(&buffer, round % 5);
                        registry.register("shared");
                        assert!(registry.lookup(&own).is_some());
                        assert!(registry.lookup("shared").is_some());
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 9);
    }
}
