//! Codec — length-prefixed framing of [`LogEntry`](crate::proto::LogEntry) records.

pub mod frame;

pub use frame::{FrameError, LogEntryCodec, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
