//! Driver module — start / stop / read logs, the host-facing surface.

pub mod error;
pub mod plugin;

pub use error::DriverError;
pub use plugin::{Capabilities, LogDriver};
