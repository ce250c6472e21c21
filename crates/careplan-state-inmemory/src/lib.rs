//! In-memory treatment plan store
//!
//! Implements the core [`PlanRepository`] over a map guarded by one async
//! lock. Useful for development, tests and single-process deployments
//! where persistence is not required.

use std::sync::Arc;

use careplan_core::PlanRepository;

pub mod repositories;
pub use repositories::InMemoryPlanRepository;

/// Provider for in-memory plan repositories
#[derive(Default, Clone)]
pub struct InMemoryStateStoreProvider {
    plans: Arc<InMemoryPlanRepository>,
}

impl InMemoryStateStoreProvider {
    /// Create a provider with empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository handle; every handle shares the same storage
    pub fn create_repository(&self) -> Arc<dyn PlanRepository> {
        self.plans.clone()
    }
}
