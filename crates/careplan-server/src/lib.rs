//!
//! Care Plan Server - HTTP transport for treatment plans
//!
//! Wires the plan service and the attachment store behind an axum router.

use std::path::PathBuf;
use std::sync::Arc;

use careplan_content_store::{create_storage, BlobStorage};
use careplan_core::{PlanRepository, PlanService};
use careplan_monitoring::logging::LogExt;
use careplan_state_inmemory::InMemoryStateStoreProvider;
use careplan_state_sql::{SqlConfig, SqlStateStoreProvider};
use tracing::info;

/// API module
pub mod api;

/// Server module
pub mod server;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

// Re-export key types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::CarePlanServer;

/// Build the server from configuration and serve until shutdown
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    let server = build_server(config).await?;
    server.run().await
}

/// Create the server and its dependencies
pub async fn build_server(config: ServerConfig) -> ServerResult<CarePlanServer> {
    let repository = create_plan_repository(&config)
        .await
        .log_err("Failed to open plan store")?;
    let blobs = create_blob_storage(&config);
    let plans = Arc::new(PlanService::new(repository));

    Ok(CarePlanServer::new(config, plans, blobs))
}

/// Create plan storage from `database_url`
pub async fn create_plan_repository(config: &ServerConfig) -> ServerResult<Arc<dyn PlanRepository>> {
    if config.database_url.starts_with("memory://") {
        info!("Using in-memory plan store");
        return Ok(InMemoryStateStoreProvider::new().create_repository());
    }

    let provider = SqlStateStoreProvider::with_config(SqlConfig {
        connection_string: config.database_url.clone(),
        max_connections: config.database_max_connections,
        ..SqlConfig::default()
    })
    .await?;

    Ok(provider.create_repository())
}

/// Create attachment storage
pub fn create_blob_storage(config: &ServerConfig) -> Arc<dyn BlobStorage> {
    info!(provider = ?config.storage_provider, "Using attachment store");
    create_storage(&config.storage_provider, PathBuf::from(&config.upload_dir))
}
