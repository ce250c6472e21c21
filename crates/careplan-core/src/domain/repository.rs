//! Repository traits for treatment plans
//!
//! The store keeps at most one plan per patient. Backends implement
//! [`PlanRepository`]; the service layer never talks to storage directly.

use async_trait::async_trait;

use super::graph::GraphDocument;
use super::plan::{PatientId, TreatmentPlan};
use crate::PlanError;

/// Repository for treatment plans
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find the plan of a patient
    async fn get_by_patient(&self, patient_id: &PatientId)
        -> Result<Option<TreatmentPlan>, PlanError>;

    /// Insert the patient's plan or replace its graph.
    ///
    /// Must be atomic: concurrent calls for one patient leave exactly one
    /// row holding one caller's graph. An existing row keeps its `id` and
    /// `created_at`; `updated_at` is refreshed.
    async fn upsert(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError>;

    /// Insert `document` only when the patient has no plan, then return the
    /// stored plan (new or existing)
    async fn create_if_absent(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError>;

    /// Delete the patient's plan. Returns whether a row existed.
    async fn delete_by_patient(&self, patient_id: &PatientId) -> Result<bool, PlanError>;

    /// Check that the backing store is reachable
    async fn health_check(&self) -> Result<bool, PlanError> {
        Ok(true)
    }
}

/// Memory implementation for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use chrono::Utc;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use crate::domain::plan::PlanId;

    /// DashMap-backed plan repository.
    ///
    /// The entry API holds the shard lock across check and write, so
    /// upserts for one patient never interleave.
    #[derive(Default)]
    pub struct MemoryPlanRepository {
        plans: Arc<DashMap<PatientId, TreatmentPlan>>,
        next_id: AtomicI64,
    }

    impl MemoryPlanRepository {
        /// Create an empty repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored plans
        pub fn len(&self) -> usize {
            self.plans.len()
        }

        /// True when nothing is stored
        pub fn is_empty(&self) -> bool {
            self.plans.is_empty()
        }

        fn allocate_id(&self) -> PlanId {
            PlanId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[async_trait]
    impl PlanRepository for MemoryPlanRepository {
        async fn get_by_patient(
            &self,
            patient_id: &PatientId,
        ) -> Result<Option<TreatmentPlan>, PlanError> {
            Ok(self.plans.get(patient_id).map(|entry| entry.value().clone()))
        }

        async fn upsert(
            &self,
            patient_id: &PatientId,
            document: &GraphDocument,
        ) -> Result<TreatmentPlan, PlanError> {
            let now = Utc::now();
            let entry = self
                .plans
                .entry(*patient_id)
                .and_modify(|plan| {
                    plan.nodes = document.nodes.clone();
                    plan.edges = document.edges.clone();
                    plan.updated_at = now;
                })
                .or_insert_with(|| {
                    TreatmentPlan::new(self.allocate_id(), *patient_id, document.clone(), now, now)
                });
            Ok(entry.value().clone())
        }

        async fn create_if_absent(
            &self,
            patient_id: &PatientId,
            document: &GraphDocument,
        ) -> Result<TreatmentPlan, PlanError> {
            let now = Utc::now();
            let entry = self.plans.entry(*patient_id).or_insert_with(|| {
                TreatmentPlan::new(self.allocate_id(), *patient_id, document.clone(), now, now)
            });
            Ok(entry.value().clone())
        }

        async fn delete_by_patient(&self, patient_id: &PatientId) -> Result<bool, PlanError> {
            Ok(self.plans.remove(patient_id).is_some())
        }
    }

}
