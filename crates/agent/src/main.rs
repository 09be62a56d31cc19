use ringtail_agent::runtime::{boot, run};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let (driver, config) = boot::boot().await?;
    run::run(driver, config).await
}
