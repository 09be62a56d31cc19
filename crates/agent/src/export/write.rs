use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use crate::codec::{FrameError, LogEntryCodec};
use crate::metrics::DriverMetrics;

use super::reader::LogReader;

/// Drain `reader` onto `writer` as length-prefixed frames.
///
/// Every frame is flushed as soon as it is written. A write failure ends
/// this export only: the reader is dropped, which stops its scan task, and
/// the error is returned to the caller. Returns the number of frames written.
pub async fn write_framed<W>(
    mut reader: LogReader,
    writer: W,
    codec: LogEntryCodec,
    metrics: &DriverMetrics,
) -> Result<u64, FrameError>
where
    W: AsyncWrite + Unpin,
{
    metrics.record_export_started();
    let mut sink = FramedWrite::new(writer, codec);
    let mut written: u64 = 0;

    while let Some(entry) = reader.recv().await {
        // send() flushes after each item
        if let Err(e) = sink.send(entry).await {
            metrics.record_export_aborted();
            warn!(
                container_id = reader.container_id(),
                written,
                error = %e,
                "Log export aborted"
            );
            return Err(e);
        }
        written += 1;
        metrics.record_exported();
    }

    debug!(container_id = reader.container_id(), written, "Log export complete");
    Ok(written)
}
