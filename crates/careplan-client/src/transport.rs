//! Plan transports used by the controller
//!
//! [`HttpPlanTransport`] talks to the plan server; [`LocalPlanTransport`]
//! calls a [`PlanService`] in the same process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use careplan_core::{GraphDocument, Identity, PatientId, PlanService, TreatmentPlan};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::TransportError;

/// Header carrying the numeric user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the role name
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Backend holding the durable copy of a plan
#[async_trait]
pub trait PlanTransport: Send + Sync {
    /// Stored plan, `None` when the patient has none yet
    async fn fetch(&self, patient_id: PatientId) -> Result<Option<TreatmentPlan>, TransportError>;

    /// Replace the stored graph with `document`
    async fn save(
        &self,
        patient_id: PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, TransportError>;

    /// Create an empty plan unless one exists
    async fn create(&self, patient_id: PatientId) -> Result<TreatmentPlan, TransportError>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Server root, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Timeout in seconds for each request
    pub timeout_secs: u64,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct SavePlanBody<'a> {
    #[serde(rename = "patientId")]
    patient_id: i64,
    nodes: &'a [careplan_core::GraphNode],
    edges: &'a [careplan_core::GraphEdge],
}

#[derive(Debug, Serialize)]
struct CreatePlanBody {
    #[serde(rename = "patientId")]
    patient_id: i64,
}

/// Plan transport over the server's HTTP API
#[derive(Debug, Clone)]
pub struct HttpPlanTransport {
    config: HttpTransportConfig,
    identity: Identity,
    client: Client,
}

impl HttpPlanTransport {
    /// Create a transport acting as `identity`
    pub fn new(config: HttpTransportConfig, identity: Identity) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            identity,
            client,
        })
    }

    /// Create a transport with the given server root and timeout
    pub fn with_url_and_timeout(
        base_url: impl Into<String>,
        timeout_secs: u64,
        identity: Identity,
    ) -> Result<Self, TransportError> {
        Self::new(
            HttpTransportConfig {
                base_url: base_url.into(),
                timeout_secs,
            },
            identity,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_ID_HEADER, self.identity.user_id.to_string())
            .header(USER_ROLE_HEADER, self.identity.role.as_str())
    }

    /// Turn a non-success response into a status error carrying the server message
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/errorDetails/errorMessage")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);

        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PlanTransport for HttpPlanTransport {
    #[instrument(skip(self), fields(patient_id = %patient_id))]
    async fn fetch(&self, patient_id: PatientId) -> Result<Option<TreatmentPlan>, TransportError> {
        let request = self
            .client
            .get(self.url("/plan"))
            .query(&[("patientId", patient_id.get())]);

        let response = Self::check(self.authenticated(request).send().await?).await?;
        let plan = response.json::<Option<TreatmentPlan>>().await?;

        debug!(found = plan.is_some(), "Fetched plan");
        Ok(plan)
    }

    #[instrument(skip(self, document), fields(patient_id = %patient_id, nodes = document.nodes.len()))]
    async fn save(
        &self,
        patient_id: PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, TransportError> {
        let body = SavePlanBody {
            patient_id: patient_id.get(),
            nodes: &document.nodes,
            edges: &document.edges,
        };
        let request = self.client.post(self.url("/plan")).json(&body);

        let response = Self::check(self.authenticated(request).send().await?).await?;
        Ok(response.json::<TreatmentPlan>().await?)
    }

    #[instrument(skip(self), fields(patient_id = %patient_id))]
    async fn create(&self, patient_id: PatientId) -> Result<TreatmentPlan, TransportError> {
        let body = CreatePlanBody {
            patient_id: patient_id.get(),
        };
        let request = self.client.post(self.url("/plan/create")).json(&body);

        let response = Self::check(self.authenticated(request).send().await?).await?;
        Ok(response.json::<TreatmentPlan>().await?)
    }
}

/// Plan transport calling the service directly
#[derive(Clone)]
pub struct LocalPlanTransport {
    service: Arc<PlanService>,
}

impl LocalPlanTransport {
    /// Wrap a plan service
    pub fn new(service: Arc<PlanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PlanTransport for LocalPlanTransport {
    async fn fetch(&self, patient_id: PatientId) -> Result<Option<TreatmentPlan>, TransportError> {
        Ok(self.service.fetch_plan(patient_id).await?)
    }

    async fn save(
        &self,
        patient_id: PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, TransportError> {
        Ok(self.service.save_document(patient_id, document.clone()).await?)
    }

    async fn create(&self, patient_id: PatientId) -> Result<TreatmentPlan, TransportError> {
        Ok(self.service.create_plan(patient_id).await?)
    }
}
