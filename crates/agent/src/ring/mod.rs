//! Ring module — bounded per-container history with overwrite-on-full.

pub mod buffer;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};
