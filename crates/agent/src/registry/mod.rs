//! Registry module — container_id → ring buffer and ingestion task.

pub mod map;

pub use map::{BufferHandle, ContainerSlot, ContainerSummary, LogRegistry};
