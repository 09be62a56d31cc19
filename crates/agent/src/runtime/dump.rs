//! Dump — write every container's history out at shutdown.

use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{info, warn};

use crate::codec::FrameError;
use crate::conf::{DumpConfig, DumpFormat};
use crate::driver::LogDriver;
use crate::proto::LogEntry;

/// Dump all registered containers. Returns how many were written.
///
/// A failure on one container is logged and skipped.
pub async fn dump_all(driver: &LogDriver, dump: &DumpConfig) -> io::Result<usize> {
    if let Some(dir) = &dump.directory {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut dumped = 0;
    for container_id in driver.registry().container_ids() {
        let result = match &dump.directory {
            Some(dir) => {
                let path = Path::new(dir).join(format!(
                    "{}.{}",
                    file_stem(&container_id),
                    dump.format.file_extension()
                ));
                match tokio::fs::File::create(&path).await {
                    Ok(file) => dump_one(driver, &container_id, dump.format, file).await,
                    Err(e) => Err(FrameError::Io(e)),
                }
            }
            None => dump_one(driver, &container_id, dump.format, tokio::io::stdout()).await,
        };

        match result {
            Ok(entries) => {
                info!(container_id = %container_id, entries, format = %dump.format, "Dumped log history");
                dumped += 1;
            }
            Err(e) => warn!(container_id = %container_id, error = %e, "Failed to dump log history"),
        }
    }
    Ok(dumped)
}

/// Write one container's history to `writer` in `format`.
pub async fn dump_one<W>(
    driver: &LogDriver,
    container_id: &str,
    format: DumpFormat,
    writer: W,
) -> Result<u64, FrameError>
where
    W: AsyncWrite + Unpin,
{
    match format {
        DumpFormat::Framed => Ok(driver.copy_logs(container_id, writer).await?.unwrap_or(0)),
        DumpFormat::Text => {
            let Some(mut reader) = driver.read_logs(container_id) else {
                return Ok(0);
            };
            let mut out = BufWriter::new(writer);
            let mut written = 0;
            while let Some(entry) = reader.recv().await {
                out.write_all(format_text_line(container_id, &entry).as_bytes())
                    .await?;
                written += 1;
            }
            out.flush().await?;
            Ok(written)
        }
    }
}

/// `<rfc3339 nanos> <container> <source>: <line>\n`
pub fn format_text_line(container_id: &str, entry: &LogEntry) -> String {
    let ts = DateTime::from_timestamp_nanos(entry.time_nano).to_rfc3339_opts(SecondsFormat::Nanos, true);
    let line = entry.line_lossy();
    format!(
        "{} {} {}: {}\n",
        ts,
        container_id,
        entry.source,
        line.trim_end_matches(['\r', '\n'])
    )
}

/// Percent-encode every byte outside `[A-Za-z0-9._-]`, so distinct ids never
/// share a dump file.
fn file_stem(container_id: &str) -> String {
    let mut stem = String::with_capacity(container_id.len());
    for b in container_id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("%{:02X}", b));
        }
    }
    stem
}
