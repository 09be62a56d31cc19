use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::pin::Pin;

use tokio::io::AsyncRead;

/// Readable side of a container's log pipe.
pub type LogSource = Pin<Box<dyn AsyncRead + Send>>;

/// Open `path` for ingestion.
///
/// FIFOs are opened as non-blocking pipes once the writer side is present;
/// regular files are read through `tokio::fs`. Directories are rejected here
/// rather than failing on the first read.
pub async fn open_source(path: &Path) -> io::Result<LogSource> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory", path.display()),
        ));
    }

    if is_fifo(&metadata) {
        return open_fifo(path).await;
    }

    let file = tokio::fs::File::open(path).await?;
    Ok(Box::pin(file))
}

#[cfg(unix)]
fn is_fifo(metadata: &Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    metadata.file_type().is_fifo()
}

#[cfg(not(unix))]
fn is_fifo(_metadata: &Metadata) -> bool {
    false
}

#[cfg(unix)]
async fn open_fifo(path: &Path) -> io::Result<LogSource> {
    let path = path.to_path_buf();
    // open(2) on a FIFO blocks until a writer appears
    let file = tokio::task::spawn_blocking(move || std::fs::File::open(path))
        .await
        .map_err(io::Error::other)??;
    let receiver = tokio::net::unix::pipe::Receiver::from_file(file)?;
    Ok(Box::pin(receiver))
}

#[cfg(not(unix))]
async fn open_fifo(path: &Path) -> io::Result<LogSource> {
    let file = tokio::fs::File::open(path).await?;
    Ok(Box::pin(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_open_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(&dir.path().join("absent")).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(dir.path()).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_open_regular_file_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames");
        std::fs::write(&path, b"payload").unwrap();

        let mut source = open_source(&path).await.unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"payload");
    }
}
