//! Conf module — driver configuration model and loading.

pub mod model;
pub mod load;

pub use load::parse_attach_list;
pub use model::{DriverConfig, DumpConfig, DumpFormat};
