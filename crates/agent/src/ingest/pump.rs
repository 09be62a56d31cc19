use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::LogEntryCodec;
use crate::metrics::DriverMetrics;
use crate::registry::BufferHandle;

/// How an ingestion loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Writer closed the pipe on a frame boundary.
    Eof { entries: u64 },
    /// The loop was told to stop.
    Cancelled { entries: u64 },
    /// A frame could not be read or decoded. History is frozen at `entries`.
    Failed { entries: u64, error: String },
}

impl IngestOutcome {
    pub fn entries(&self) -> u64 {
        match self {
            IngestOutcome::Eof { entries }
            | IngestOutcome::Cancelled { entries }
            | IngestOutcome::Failed { entries, .. } => *entries,
        }
    }
}

/// One container's decode loop: frames off the pipe, entries into the ring.
///
/// The loop is the only writer of its buffer. It stops on end of stream, on
/// the first decode error (no resynchronisation), or when `cancel` fires.
/// The source is owned by the loop and closed on every exit path.
pub struct IngestTask {
    container_id: Arc<str>,
    buffer: BufferHandle,
    codec: LogEntryCodec,
    cancel: CancellationToken,
    metrics: Arc<DriverMetrics>,
}

impl IngestTask {
    pub fn new(
        container_id: impl Into<Arc<str>>,
        buffer: BufferHandle,
        codec: LogEntryCodec,
        metrics: Arc<DriverMetrics>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            buffer,
            codec,
            cancel: CancellationToken::new(),
            metrics,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn<R>(self, source: R) -> JoinHandle<IngestOutcome>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(self.run(source))
    }

    pub async fn run<R>(self, source: R) -> IngestOutcome
    where
        R: AsyncRead + Unpin,
    {
        let _active = self.metrics.ingestion_guard();
        let mut frames = FramedRead::new(source, self.codec);
        let mut entries: u64 = 0;

        debug!(container_id = %self.container_id, "Ingestion started");

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break IngestOutcome::Cancelled { entries };
                }

                frame = frames.next() => match frame {
                    Some(Ok(entry)) => {
                        self.buffer.append(entry);
                        entries += 1;
                        self.metrics.record_ingested();
                    }
                    Some(Err(e)) => {
                        self.metrics.record_decode_failure();
                        warn!(
                            container_id = %self.container_id,
                            entries,
                            error = %e,
                            "Failed to decode log frame, ingestion stopped"
                        );
                        break IngestOutcome::Failed { entries, error: e.to_string() };
                    }
                    None => break IngestOutcome::Eof { entries },
                },
            }
        };

        drop(frames);
        info!(container_id = %self.container_id, ?outcome, "Ingestion finished");
        outcome
    }
}
