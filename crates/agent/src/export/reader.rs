use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::proto::LogEntry;
use crate::registry::LogRegistry;
use crate::ring::RingBuffer;

/// In-flight entries allowed between the scan and the consumer by default.
pub const DEFAULT_QUEUE_DEPTH: usize = 100;

/// One-shot replay of a ring buffer snapshot.
///
/// The snapshot is taken when the reader is opened; later appends are not
/// delivered. A background task feeds the snapshot through a bounded queue
/// and stops as soon as the reader is dropped.
#[derive(Debug)]
pub struct LogReader {
    container_id: Arc<str>,
    rx: mpsc::Receiver<LogEntry>,
    total: usize,
}

impl LogReader {
    /// Open a reader for `container_id`, or `None` if nothing is registered.
    /// No task is spawned for an unknown container.
    pub fn open(registry: &LogRegistry, container_id: &str, queue_depth: usize) -> Option<Self> {
        let buffer = registry.lookup(container_id)?;
        Some(Self::from_buffer(container_id, &buffer, queue_depth))
    }

    /// Must be called from within a Tokio runtime.
    pub fn from_buffer(
        container_id: impl Into<Arc<str>>,
        buffer: &RingBuffer,
        queue_depth: usize,
    ) -> Self {
        let container_id = container_id.into();
        let snapshot = buffer.snapshot();
        let total = snapshot.len();
        let (tx, rx) = mpsc::channel(queue_depth.max(1));

        let id = Arc::clone(&container_id);
        tokio::spawn(async move {
            for (sent, entry) in snapshot.into_iter().enumerate() {
                if tx.send(entry).await.is_err() {
                    debug!(container_id = %id, sent, total, "Export consumer gone, scan stopped");
                    return;
                }
            }
        });

        Self {
            container_id,
            rx,
            total,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Entries in the snapshot this reader replays.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Next entry, oldest first; `None` once the snapshot is exhausted.
    pub async fn recv(&mut self) -> Option<LogEntry> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<LogEntry> {
        ReceiverStream::new(self.rx)
    }
}
