//! Load — config loading from file and environment variables.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use super::model::{DriverConfig, DumpFormat};

const DEFAULT_CONFIG_PATH: &str = "/etc/ringtail/agent.toml";

impl DriverConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("RINGTAIL_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: DriverConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), String> {
        if let Some(v) = env_parse("RINGTAIL_CAPACITY") {
            self.capacity = v;
        }
        if let Some(v) = env_parse("RINGTAIL_QUEUE_DEPTH") {
            self.queue_depth = v;
        }
        if let Some(v) = env_parse("RINGTAIL_MAX_FRAME_SIZE") {
            self.max_frame_size = v;
        }
        if let Some(v) = env_parse("RINGTAIL_ATTACH_TIMEOUT_MS") {
            self.attach_timeout_ms = v;
        }
        if let Some(v) = env_parse("RINGTAIL_RETAIN_ON_STOP") {
            self.retain_on_stop = v;
        }
        if let Ok(list) = std::env::var("RINGTAIL_ATTACH") {
            // Merged over the file's table; env wins on duplicate ids
            self.containers.extend(parse_attach_list(&list)?);
        }
        if let Some(v) = env_parse("RINGTAIL_DUMP_ENABLED") {
            self.dump.enabled = v;
        }
        if let Ok(dir) = std::env::var("RINGTAIL_DUMP_DIR") {
            self.dump.directory = Some(dir);
        }
        if let Some(v) = env_parse::<DumpFormat>("RINGTAIL_DUMP_FORMAT") {
            self.dump.format = v;
        }
        Ok(())
    }
}

/// Parse `id=path[,id=path...]`.
pub fn parse_attach_list(list: &str) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, path) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid attach entry {:?}: expected id=path", pair))?;
        let (id, path) = (id.trim(), path.trim());
        if id.is_empty() || path.is_empty() {
            return Err(format!("invalid attach entry {:?}: empty id or path", pair));
        }
        out.insert(id.to_string(), path.to_string());
    }
    Ok(out)
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
