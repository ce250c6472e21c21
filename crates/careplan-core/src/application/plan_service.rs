use std::sync::Arc;
use std::time::Instant;

use careplan_monitoring::metrics::PlanMetrics;
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};

use crate::{
    domain::graph::{self, GraphDocument},
    domain::plan::{PatientId, TreatmentPlan},
    domain::repository::PlanRepository,
    PlanError,
};

/// Service for reading and saving treatment plans
pub struct PlanService {
    /// Plan storage
    repository: Arc<dyn PlanRepository>,
}

impl PlanService {
    /// Create a new plan service
    pub fn new(repository: Arc<dyn PlanRepository>) -> Self {
        Self { repository }
    }

    /// Check that plan storage is reachable
    pub async fn health_check(&self) -> Result<bool, PlanError> {
        self.repository.health_check().await
    }

    /// Fetch the plan of a patient, `None` when the patient has none yet
    pub async fn fetch_plan(&self, patient_id: PatientId) -> Result<Option<TreatmentPlan>, PlanError> {
        let span = tracing::info_span!("fetch_plan", patient_id = %patient_id);

        async move {
            PlanMetrics::record_fetch();

            let plan = match self.repository.get_by_patient(&patient_id).await? {
                Some(plan) => plan,
                None => {
                    debug!("No treatment plan stored");
                    return Ok(None);
                }
            };

            // Rows written by older clients may hold edges to deleted nodes
            // or repeat a node id
            let TreatmentPlan {
                id,
                patient_id,
                mut nodes,
                edges,
                created_at,
                updated_at,
            } = plan;
            graph::repair_node_ids(&mut nodes);
            let document = graph::validate(nodes, edges).map_err(|e| {
                PlanError::CorruptRecord(format!("stored plan {} is unreadable: {}", id, e))
            })?;

            debug!(
                plan_id = %id,
                nodes = document.nodes.len(),
                edges = document.edges.len(),
                "Treatment plan loaded"
            );

            Ok(Some(TreatmentPlan::new(
                id, patient_id, document, created_at, updated_at,
            )))
        }
        .instrument(span)
        .await
    }

    /// Save a plan from raw node and edge payloads.
    ///
    /// Payloads are decoded and validated before storage is touched.
    pub async fn save_plan(
        &self,
        patient_id: PatientId,
        nodes: &Value,
        edges: &Value,
    ) -> Result<TreatmentPlan, PlanError> {
        let document = match graph::deserialize(nodes, edges) {
            Ok(document) => document,
            Err(e) => {
                warn!(patient_id = %patient_id, error = %e, "Rejected treatment plan payload");
                PlanMetrics::record_save(false, 0.0);
                return Err(e);
            }
        };

        self.save_document(patient_id, document).await
    }

    /// Save an already typed graph document
    pub async fn save_document(
        &self,
        patient_id: PatientId,
        document: GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let span = tracing::info_span!("save_plan", patient_id = %patient_id);

        async move {
            let start = Instant::now();
            let result = self.validate_and_upsert(patient_id, document).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            PlanMetrics::record_save(result.is_ok(), elapsed_ms);

            match &result {
                Ok(plan) => info!(
                    plan_id = %plan.id,
                    nodes = plan.nodes.len(),
                    edges = plan.edges.len(),
                    duration_ms = elapsed_ms,
                    "Treatment plan saved"
                ),
                Err(e) => warn!(error = %e, "Treatment plan save failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn validate_and_upsert(
        &self,
        patient_id: PatientId,
        document: GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let document = graph::validate(document.nodes, document.edges)?;
        self.repository.upsert(&patient_id, &document).await
    }

    /// Create an empty plan for a patient without one.
    ///
    /// Returns the existing plan untouched when there already is one.
    pub async fn create_plan(&self, patient_id: PatientId) -> Result<TreatmentPlan, PlanError> {
        let span = tracing::info_span!("create_plan", patient_id = %patient_id);

        async move {
            let plan = self
                .repository
                .create_if_absent(&patient_id, &GraphDocument::empty())
                .await?;
            info!(plan_id = %plan.id, "Treatment plan ready");
            Ok(plan)
        }
        .instrument(span)
        .await
    }

    /// Remove a patient's plan when the patient record is deleted
    pub async fn remove_plan(&self, patient_id: PatientId) -> Result<bool, PlanError> {
        let span = tracing::info_span!("remove_plan", patient_id = %patient_id);

        async move {
            let removed = self.repository.delete_by_patient(&patient_id).await?;
            if removed {
                info!("Treatment plan removed");
            }
            Ok(removed)
        }
        .instrument(span)
        .await
    }
}
