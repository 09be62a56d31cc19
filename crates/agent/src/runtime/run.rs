//! Run — attach configured containers, wait for shutdown, dump and stop.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::conf::DriverConfig;
use crate::driver::LogDriver;
use crate::runtime::dump::dump_all;
use crate::runtime::stop::shutdown_signal;

pub async fn run(driver: Arc<LogDriver>, config: DriverConfig) -> Result<(), Box<dyn std::error::Error>> {
    // FIFO opens wait for their writers, so attach everything concurrently
    let results = join_all(
        config
            .containers
            .iter()
            .map(|(container_id, path)| driver.start(container_id, path)),
    )
    .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    for err in results.into_iter().filter_map(Result::err) {
        error!("{}", err);
    }
    if failed > 0 {
        warn!("{} of {} containers failed to attach", failed, config.containers.len());
    }

    info!("");
    info!("========================================");
    info!("Ringtail Agent is ready!");
    info!("Containers attached: {}", config.containers.len() - failed);
    info!("Press Ctrl+C to shutdown gracefully");
    info!("========================================");
    info!("");

    shutdown_signal().await;

    if config.dump.enabled {
        match dump_all(&driver, &config.dump).await {
            Ok(n) => info!("Dumped history of {} containers", n),
            Err(e) => error!("Failed to dump log history: {}", e),
        }
    }

    driver.stop_all().await;

    let metrics = serde_json::to_string(&driver.metrics())?;
    info!("Final metrics: {}", metrics);
    info!("Shutdown complete");
    Ok(())
}
