//! Export module — snapshot replay to a consumer, framed and flushed per entry.

pub mod reader;
pub mod write;

pub use reader::{LogReader, DEFAULT_QUEUE_DEPTH};
pub use write::write_framed;
