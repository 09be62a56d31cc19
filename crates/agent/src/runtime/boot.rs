//! Boot — logging init, config load, driver creation.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::DriverConfig;
use crate::driver::LogDriver;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ringtail_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load and validate config, then build the driver.
///
/// Returns `(Arc<LogDriver>, DriverConfig)` on success.
pub async fn boot() -> Result<(Arc<LogDriver>, DriverConfig), Box<dyn std::error::Error>> {
    info!("Starting Ringtail Agent v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file or env)
    let config = DriverConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!(
        "Buffering: capacity={} entries/container, queue_depth={}, max_frame_size={}B",
        config.capacity, config.queue_depth, config.max_frame_size
    );
    info!(
        "Dump on shutdown: enabled={}, format={}, target={}",
        config.dump.enabled,
        config.dump.format,
        config.dump.directory.as_deref().unwrap_or("stdout")
    );

    let driver = Arc::new(LogDriver::new(config.clone()));
    info!("Initialized log driver");

    Ok((driver, config))
}
