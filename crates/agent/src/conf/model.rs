//! Model — DriverConfig and related structs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{LogEntryCodec, DEFAULT_MAX_FRAME_SIZE};
use crate::export::DEFAULT_QUEUE_DEPTH;
use crate::ring::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Entries retained per container
    pub capacity: usize,
    /// Max in-flight entries between an export scan and its consumer
    pub queue_depth: usize,
    pub max_frame_size: usize,
    pub attach_timeout_ms: u64,
    /// Keep a container's history readable after stop
    pub retain_on_stop: bool,
    /// container_id → input pipe, attached at startup
    pub containers: BTreeMap<String, String>,
    pub dump: DumpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub enabled: bool,
    /// One file per container when set, stdout otherwise
    pub directory: Option<String>,
    pub format: DumpFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// `<rfc3339> <container> <source>: <line>`
    #[default]
    Text,
    /// Same length-prefixed frames as the ingestion pipe
    Framed,
}

impl DumpFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpFormat::Text => "text",
            DumpFormat::Framed => "framed",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            DumpFormat::Text => "log",
            DumpFormat::Framed => "frames",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DumpFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Ok(DumpFormat::Text),
            "framed" | "frames" | "binary" => Ok(DumpFormat::Framed),
            other => Err(format!("unknown dump format: {}", other)),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            attach_timeout_ms: 10_000,
            retain_on_stop: false,
            containers: BTreeMap::new(),
            dump: DumpConfig::default(),
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            format: DumpFormat::Text,
        }
    }
}

impl DriverConfig {
    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }

    pub fn codec(&self) -> LogEntryCodec {
        LogEntryCodec::new(self.max_frame_size)
    }

    /// Validate configuration values (no I/O)
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be > 0".to_string());
        }
        if self.queue_depth == 0 {
            return Err("queue_depth must be > 0".to_string());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be > 0".to_string());
        }
        if self.attach_timeout_ms == 0 {
            return Err("attach_timeout_ms must be > 0".to_string());
        }
        for (id, path) in &self.containers {
            if id.trim().is_empty() {
                return Err("containers: container id must not be empty".to_string());
            }
            if path.trim().is_empty() {
                return Err(format!("containers.{}: input path must not be empty", id));
            }
        }
        if let Some(dir) = &self.dump.directory {
            if dir.trim().is_empty() {
                return Err("dump.directory must not be empty when set".to_string());
            }
        }
        Ok(())
    }
}
