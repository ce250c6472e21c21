// Care Plan E2E Tests
//
// Real server on an ephemeral port, driven over HTTP

/// Shared test infrastructure for E2E tests
pub mod utils {
    use std::sync::{Arc, Once};

    use careplan_client::{GraphController, HttpPlanTransport, PlanTransport};
    use careplan_core::{Identity, PatientId, Role};
    use careplan_server::{build_server, ServerConfig};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Request timeout used by test clients
    pub const CLIENT_TIMEOUT_SECS: u64 = 5;

    static LOGGING: Once = Once::new();

    /// Install a test subscriber once; honours `RUST_LOG`
    pub fn init_logging() {
        LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    /// Running server; aborted on drop
    pub struct TestServer {
        pub base_url: String,
        handle: JoinHandle<()>,
    }

    impl TestServer {
        /// Start a server with an in-memory plan store
        pub async fn start() -> anyhow::Result<Self> {
            Self::start_with(ServerConfig::default()).await
        }

        /// Start a server with `config`, ignoring its bind address and port
        pub async fn start_with(config: ServerConfig) -> anyhow::Result<Self> {
            init_logging();

            let server = build_server(config).await?;
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let base_url = format!("http://{}", listener.local_addr()?);

            let handle = tokio::spawn(async move {
                if let Err(e) = server.serve(listener).await {
                    tracing::error!(error = %e, "Test server failed");
                }
            });

            Ok(Self { base_url, handle })
        }

        /// HTTP transport acting as `role`
        pub fn transport(&self, user_id: i64, role: Role) -> anyhow::Result<Arc<dyn PlanTransport>> {
            let transport = HttpPlanTransport::with_url_and_timeout(
                self.base_url.clone(),
                CLIENT_TIMEOUT_SECS,
                Identity::new(user_id, role.clone()),
            )?;
            Ok(Arc::new(transport))
        }

        /// Controller for `patient_id` acting as `role`, talking HTTP to this server
        pub fn controller(&self, user_id: i64, role: Role, patient_id: i64) -> anyhow::Result<GraphController> {
            let transport = self.transport(user_id, role.clone())?;
            Ok(GraphController::new(
                Identity::new(user_id, role),
                PatientId(patient_id),
                transport,
            ))
        }

        /// URL of `path` on this server
        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }
}
