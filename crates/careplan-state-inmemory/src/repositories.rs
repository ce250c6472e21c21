use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use careplan_core::{
    GraphDocument, PatientId, PlanError, PlanId, PlanRepository, TreatmentPlan,
};

#[derive(Default)]
struct PlanTable {
    plans: HashMap<PatientId, TreatmentPlan>,
    last_id: i64,
}

impl PlanTable {
    fn insert_new(&mut self, patient_id: PatientId, document: &GraphDocument) -> TreatmentPlan {
        self.last_id += 1;
        let now = Utc::now();
        let plan = TreatmentPlan::new(PlanId(self.last_id), patient_id, document.clone(), now, now);
        self.plans.insert(patient_id, plan.clone());
        plan
    }
}

/// In-memory implementation of the PlanRepository.
///
/// Existence check and write happen under a single write guard, so
/// concurrent upserts for one patient always leave one row.
#[derive(Default, Clone)]
pub struct InMemoryPlanRepository {
    table: Arc<RwLock<PlanTable>>,
}

impl InMemoryPlanRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored plans
    pub async fn count(&self) -> usize {
        self.table.read().await.plans.len()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn get_by_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Option<TreatmentPlan>, PlanError> {
        let table = self.table.read().await;
        Ok(table.plans.get(patient_id).cloned())
    }

    async fn upsert(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let mut table = self.table.write().await;

        if let Some(plan) = table.plans.get_mut(patient_id) {
            plan.nodes = document.nodes.clone();
            plan.edges = document.edges.clone();
            plan.updated_at = Utc::now();
            debug!(patient_id = %patient_id, plan_id = %plan.id, "Replaced plan graph");
            return Ok(plan.clone());
        }

        let plan = table.insert_new(*patient_id, document);
        debug!(patient_id = %patient_id, plan_id = %plan.id, "Inserted plan");
        Ok(plan)
    }

    async fn create_if_absent(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let mut table = self.table.write().await;

        if let Some(plan) = table.plans.get(patient_id) {
            return Ok(plan.clone());
        }

        Ok(table.insert_new(*patient_id, document))
    }

    async fn delete_by_patient(&self, patient_id: &PatientId) -> Result<bool, PlanError> {
        let mut table = self.table.write().await;
        Ok(table.plans.remove(patient_id).is_some())
    }
}
