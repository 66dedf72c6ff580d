use accounts_core::{config::Config, migration, server, telemetry};
use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry)?;

    info!(
        service = %config.telemetry.service_name,
        region = %config.region,
        "Starting accounts core"
    );
    info!("HTTP server listening on {}", config.http_addr());

    migration::run_migrations(&config).await?;

    server::run(config, prometheus_handle).await
}
