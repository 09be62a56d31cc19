use bytes::{Buf, BufMut, BytesMut};
use prost::Message;
use tokio_util::codec::{Decoder, Encoder};

use crate::proto::LogEntry;

/// Length prefix size (4 bytes, big-endian u32)
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted by default, matching the Docker daemon's reader.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("Malformed log entry: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Failed to encode log entry: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("Stream ended inside a frame ({remaining} bytes buffered)")]
    Truncated { remaining: usize },
}

/// Codec for the `[u32 BE length][protobuf LogEntry]` framing used on both
/// the ingestion pipe and the export stream.
///
/// ```text
/// +----------------+-------------------------------+
/// | len: u32 (BE)  | LogEntry (len bytes, protobuf)|
/// +----------------+-------------------------------+
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LogEntryCodec {
    max_frame_size: usize,
}

impl LogEntryCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(u32::MAX as usize),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for LogEntryCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for LogEntryCodec {
    type Item = LogEntry;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogEntry>, FrameError> {
        if src.len() < LENGTH_PREFIX_SIZE {
            src.reserve(LENGTH_PREFIX_SIZE - src.len());
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > self.max_frame_size {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        let frame_len = LENGTH_PREFIX_SIZE + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        // freeze() hands the payload to prost without copying the line bytes
        let payload = src.split_to(len).freeze();
        Ok(Some(LogEntry::decode(payload)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogEntry>, FrameError> {
        match self.decode(src)? {
            Some(entry) => Ok(Some(entry)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                remaining: src.len(),
            }),
        }
    }
}

impl Encoder<LogEntry> for LogEntryCodec {
    type Error = FrameError;

    fn encode(&mut self, entry: LogEntry, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = entry.encoded_len();
        if len > self.max_frame_size {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + len);
        dst.put_u32(len as u32);
        entry.encode(dst)?;
        Ok(())
    }
}
