use anyhow::{Context, Result};
use careplan_monitoring::MonitoringConfig;
use careplan_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment variables
    let config = ServerConfig::load().context("Failed to load configuration")?;

    let monitoring_config = MonitoringConfig {
        service_name: "careplan-server".to_string(),
        log_filter: config.log_level.clone(),
        log_format: config.log_format,
        enable_metrics: true,
    };

    careplan_monitoring::init(monitoring_config).context("Failed to initialize monitoring")?;

    careplan_server::run(config).await.context("Server error")?;

    careplan_monitoring::shutdown();
    Ok(())
}
