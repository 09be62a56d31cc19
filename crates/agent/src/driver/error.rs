use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to open log stream {} for container {container_id}: {source}", path.display())]
    Attach {
        container_id: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Timed out opening log stream {} for container {container_id}", path.display())]
    AttachTimeout { container_id: String, path: PathBuf },
}

impl DriverError {
    pub fn container_id(&self) -> &str {
        match self {
            DriverError::Attach { container_id, .. }
            | DriverError::AttachTimeout { container_id, .. } => container_id,
        }
    }
}
