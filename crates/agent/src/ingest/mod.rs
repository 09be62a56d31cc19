//! Ingest module — per-container decode loops feeding the ring buffers.

pub mod pump;
pub mod source;

pub use pump::{IngestOutcome, IngestTask};
pub use source::{open_source, LogSource};
