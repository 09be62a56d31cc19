use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::codec::{FrameError, LogEntryCodec};
use crate::conf::DriverConfig;
use crate::export::{write_framed, LogReader};
use crate::ingest::{open_source, IngestTask};
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::registry::{ContainerSlot, ContainerSummary, LogRegistry};
use crate::ring::RingBuffer;

use super::error::DriverError;

/// What the driver advertises to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    #[serde(rename = "ReadLogs")]
    pub read_logs: bool,
}

/// Per-container log buffering: attach an input pipe, keep the newest
/// entries, replay them on request.
#[derive(Debug)]
pub struct LogDriver {
    registry: Arc<LogRegistry>,
    config: DriverConfig,
    metrics: Arc<DriverMetrics>,
    codec: LogEntryCodec,
}

impl LogDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            registry: Arc::new(LogRegistry::new(config.capacity)),
            codec: config.codec(),
            metrics: Arc::new(DriverMetrics::new()),
            config,
        }
    }

    pub fn registry(&self) -> &LogRegistry {
        &self.registry
    }

    /// Open `path` and begin ingesting it into a fresh buffer for
    /// `container_id`.
    ///
    /// Open failures are returned here and leave the registry untouched. Any
    /// previous buffer for the id is replaced and its loop cancelled.
    ///
    /// A FIFO open waits for the writer on a blocking thread. When the
    /// attach times out that thread stays parked in `open(2)`; a writer that
    /// connects later gets its pipe opened and immediately closed (EPIPE).
    pub async fn start(
        &self,
        container_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), DriverError> {
        let path = path.as_ref();
        let opened = tokio::time::timeout(self.config.attach_timeout(), open_source(path)).await;

        let source = match opened {
            Ok(Ok(source)) => source,
            Ok(Err(e)) => {
                warn!(container_id, path = %path.display(), error = %e, "Failed to open log stream");
                return Err(DriverError::Attach {
                    container_id: container_id.to_string(),
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(_) => {
                warn!(
                    container_id,
                    path = %path.display(),
                    timeout_ms = self.config.attach_timeout_ms,
                    "Timed out waiting for log stream writer"
                );
                return Err(DriverError::AttachTimeout {
                    container_id: container_id.to_string(),
                    path: path.to_path_buf(),
                });
            }
        };

        self.attach(container_id, source, Some(path.to_path_buf()));
        info!(container_id, path = %path.display(), "Log driver attached");
        Ok(())
    }

    /// Begin ingesting an already-open stream for `container_id`.
    pub fn attach<R>(&self, container_id: &str, source: R, origin: Option<PathBuf>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let buffer = Arc::new(RingBuffer::new(self.registry.capacity()));
        let ingest = IngestTask::new(
            container_id,
            Arc::clone(&buffer),
            self.codec,
            Arc::clone(&self.metrics),
        );
        let cancel = ingest.cancel_token();
        let task = ingest.spawn(source);

        let mut slot = ContainerSlot::new(buffer).with_cancel(cancel).with_task(task);
        if let Some(origin) = origin {
            slot = slot.with_source(origin);
        }
        self.registry.insert(container_id, slot);
    }

    /// Stop ingestion for `container_id` and wait for its loop to exit.
    ///
    /// The buffer is released unless `retain_on_stop` is set. Returns `false`
    /// if the container was never started.
    pub async fn stop(&self, container_id: &str) -> bool {
        let task = if self.config.retain_on_stop {
            match self.registry.detach(container_id) {
                Some(task) => task,
                None => return false,
            }
        } else {
            match self.registry.remove(container_id) {
                Some(mut slot) => slot.stop_ingest(),
                None => return false,
            }
        };

        if let Some(task) = task {
            match task.await {
                Ok(outcome) => debug!(container_id, ?outcome, "Ingestion loop joined"),
                Err(e) => warn!(container_id, error = %e, "Ingestion task did not complete"),
            }
        }

        info!(container_id, retained = self.config.retain_on_stop, "Log driver stopped");
        true
    }

    /// Stop every registered container.
    pub async fn stop_all(&self) {
        for container_id in self.registry.container_ids() {
            self.stop(&container_id).await;
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities { read_logs: true }
    }

    /// Replay the current history of `container_id`, oldest first.
    /// `None` if the container was never started.
    pub fn read_logs(&self, container_id: &str) -> Option<LogReader> {
        LogReader::open(&self.registry, container_id, self.config.queue_depth)
    }

    /// Write the current history of `container_id` to `writer` as flushed
    /// frames. `Ok(None)` if the container was never started.
    pub async fn copy_logs<W>(&self, container_id: &str, writer: W) -> Result<Option<u64>, FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(reader) = self.read_logs(container_id) else {
            return Ok(None);
        };
        write_framed(reader, writer, self.codec, &self.metrics)
            .await
            .map(Some)
    }

    pub fn summaries(&self) -> Vec<ContainerSummary> {
        self.registry.summaries()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::LogEntry;
    use bytes::BytesMut;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio_stream::StreamExt;
    use tokio_util::codec::{Encoder, FramedRead};

    fn frames(range: std::ops::Range<usize>) -> BytesMut {
        let mut codec = LogEntryCodec::default();
        let mut buf = BytesMut::new();
        for i in range {
            codec
                .encode(LogEntry::new("stdout", format!("oi-{}", i), i as i64), &mut buf)
                .unwrap();
        }
        buf
    }

    fn frames_file(dir: &tempfile::TempDir, name: &str, range: std::ops::Range<usize>) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, frames(range)).unwrap();
        path
    }

    async fn wait_for_len(driver: &LogDriver, container_id: &str, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if driver.registry().lookup(container_id).is_some_and(|b| b.len() >= n) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("buffer never filled");
    }

    async fn lines(driver: &LogDriver, container_id: &str) -> Vec<String> {
        let mut reader = driver.read_logs(container_id).expect("registered");
        let mut out = Vec::new();
        while let Some(entry) = reader.recv().await {
            out.push(entry.line_lossy().into_owned());
        }
        out
    }

    #[tokio::test]
    async fn test_start_ingests_file_and_exports_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = frames_file(&dir, "web.frames", 0..10);
        let driver = LogDriver::new(DriverConfig::default());

        driver.start("web", &path).await.unwrap();
        wait_for_len(&driver, "web", 10).await;

        let expected: Vec<String> = (0..10).map(|i| format!("oi-{}", i)).collect();
        assert_eq!(lines(&driver, "web").await, expected);

        let summary = &driver.summaries()[0];
        assert_eq!(summary.container_id, "web");
        assert_eq!(summary.source.as_deref(), Some(path.to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_start_missing_path_reports_attach_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver = LogDriver::new(DriverConfig::default());

        let err = driver.start("web", dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, DriverError::Attach { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound));
        assert_eq!(err.container_id(), "web");
        assert!(driver.read_logs("web").is_none());
        assert!(driver.registry().is_empty());
    }

    #[tokio::test]
    async fn test_failed_restart_keeps_previous_history() {
        let dir = tempfile::tempdir().unwrap();
        let driver = LogDriver::new(DriverConfig::default());
        driver.start("web", frames_file(&dir, "a", 0..4)).await.unwrap();
        wait_for_len(&driver, "web", 4).await;

        assert!(driver.start("web", dir.path()).await.is_err());
        assert_eq!(lines(&driver, "web").await.len(), 4);
    }

    #[tokio::test]
    async fn test_restart_discards_history() {
        let dir = tempfile::tempdir().unwrap();
        let driver = LogDriver::new(DriverConfig::default());

        driver.start("web", frames_file(&dir, "a", 0..8)).await.unwrap();
        wait_for_len(&driver, "web", 8).await;
        driver.start("web", frames_file(&dir, "b", 100..103)).await.unwrap();
        wait_for_len(&driver, "web", 3).await;

        assert_eq!(lines(&driver, "web").await, vec!["oi-100", "oi-101", "oi-102"]);
    }

    #[tokio::test]
    async fn test_stop_cancels_loop_and_releases_buffer() {
        let driver = LogDriver::new(DriverConfig::default());
        let (mut writer, reader) = tokio::io::duplex(1024);
        driver.attach("web", reader, None);

        writer.write_all(&frames(0..3)).await.unwrap();
        wait_for_len(&driver, "web", 3).await;
        assert_eq!(driver.metrics().active_ingestions, 1);

        assert!(driver.stop("web").await);
        assert!(driver.read_logs("web").is_none());
        assert_eq!(driver.metrics().active_ingestions, 0);
        assert!(writer.write_all(b"more").await.is_err());

        assert!(!driver.stop("web").await);
    }

    #[tokio::test]
    async fn test_stop_with_retain_keeps_history_readable() {
        let driver = LogDriver::new(DriverConfig {
            retain_on_stop: true,
            ..Default::default()
        });
        let (mut writer, reader) = tokio::io::duplex(1024);
        driver.attach("web", reader, None);
        writer.write_all(&frames(0..3)).await.unwrap();
        wait_for_len(&driver, "web", 3).await;

        assert!(driver.stop("web").await);
        assert_eq!(lines(&driver, "web").await, vec!["oi-0", "oi-1", "oi-2"]);
        assert!(!driver.summaries()[0].ingesting);
    }

    #[tokio::test]
    async fn test_stop_all_clears_registry() {
        let driver = LogDriver::new(DriverConfig::default());
        for id in ["a", "b", "c"] {
            let (_writer, reader) = tokio::io::duplex(64);
            driver.attach(id, reader, None);
        }
        driver.stop_all().await;
        assert!(driver.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_container_is_not_found() {
        let driver = LogDriver::new(DriverConfig::default());
        assert!(driver.read_logs("ghost").is_none());

        let mut out: Vec<u8> = Vec::new();
        assert!(driver.copy_logs("ghost", &mut out).await.unwrap().is_none());
        assert!(out.is_empty());
        assert_eq!(driver.metrics().exports_started, 0);
    }

    #[tokio::test]
    async fn test_copy_logs_writes_frames() {
        let driver = LogDriver::new(DriverConfig {
            capacity: 5,
            ..Default::default()
        });
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        driver.attach("web", reader, None);
        writer.write_all(&frames(0..12)).await.unwrap();
        drop(writer);
        wait_for_len(&driver, "web", 5).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while driver.metrics().entries_ingested < 12 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let mut out: Vec<u8> = Vec::new();
        let written = driver.copy_logs("web", &mut out).await.unwrap();
        assert_eq!(written, Some(5));

        let times: Vec<i64> = FramedRead::new(out.as_slice(), LogEntryCodec::default())
            .map(|r| r.unwrap().time_nano)
            .collect()
            .await;
        assert_eq!(times, vec![7, 8, 9, 10, 11]);
    }

    #[cfg(unix)]
    fn make_fifo(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .expect("mkfifo should run");
        assert!(status.success(), "mkfifo failed for {}", path.display());
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_on_fifo_ingests_until_writer_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_fifo(&dir, "web.fifo");
        let driver = LogDriver::new(DriverConfig::default());

        let payload = frames(0..10);
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            use std::io::Write;
            // blocks until the driver opens the read side
            let mut pipe = std::fs::OpenOptions::new()
                .write(true)
                .open(writer_path)
                .unwrap();
            pipe.write_all(&payload).unwrap();
        });

        driver.start("web", &path).await.unwrap();
        writer.join().unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while driver.summaries()[0].ingesting {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ingestion never reached end of stream");

        let expected: Vec<String> = (0..10).map(|i| format!("oi-{}", i)).collect();
        assert_eq!(lines(&driver, "web").await, expected);

        let metrics = driver.metrics();
        assert_eq!(metrics.entries_ingested, 10);
        assert_eq!(metrics.decode_failures, 0);
        assert_eq!(metrics.active_ingestions, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_on_fifo_without_writer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_fifo(&dir, "idle.fifo");
        let driver = LogDriver::new(DriverConfig {
            attach_timeout_ms: 100,
            ..Default::default()
        });

        let err = driver.start("idle", &path).await.unwrap_err();
        assert!(matches!(err, DriverError::AttachTimeout { .. }), "unexpected error: {}", err);
        assert_eq!(err.container_id(), "idle");
        assert!(driver.read_logs("idle").is_none());
        assert!(driver.registry().is_empty());

        // release the open(2) still parked on the blocking pool
        let unpark = tokio::task::spawn_blocking(move || {
            std::fs::OpenOptions::new().write(true).open(path).map(drop)
        });
        tokio::time::timeout(Duration::from_secs(5), unpark)
            .await
            .expect("parked open was not released")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_capabilities_json() {
        let driver = LogDriver::new(DriverConfig::default());
        let json = serde_json::to_string(&driver.capabilities()).unwrap();
        assert_eq!(json, r#"{"ReadLogs":true}"#);
    }
}
