//! Main care plan server implementation

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use careplan_content_store::BlobStorage;
use careplan_core::PlanService;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Main server implementation
#[derive(Clone)]
pub struct CarePlanServer {
    /// Configuration
    pub config: ServerConfig,

    /// Plan use cases
    plans: Arc<PlanService>,

    /// Attachment storage
    blobs: Arc<dyn BlobStorage>,
}

/// Manual Debug implementation that doesn't try to debug the trait objects
impl std::fmt::Debug for CarePlanServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarePlanServer")
            .field("config", &self.config)
            .field("blobs", &self.blobs)
            .finish()
    }
}

impl CarePlanServer {
    /// Create a new CarePlanServer
    pub fn new(config: ServerConfig, plans: Arc<PlanService>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self {
            config,
            plans,
            blobs,
        }
    }

    /// Plan service
    pub fn plans(&self) -> &PlanService {
        &self.plans
    }

    /// Attachment storage
    pub fn blobs(&self) -> &dyn BlobStorage {
        self.blobs.as_ref()
    }

    /// Router over a shared handle to this server
    pub fn router(&self) -> Router {
        crate::api::build_router(Arc::new(self.clone()))
    }

    /// Bind the configured address and serve until ctrl-c
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until ctrl-c
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
