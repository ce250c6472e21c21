//!
//! Care Plan Core - treatment plan graphs and their persistence contract
//!
//! This crate defines the graph document model, the treatment plan
//! aggregate, the repository interface implemented by storage crates and
//! the plan service used by every transport.

#![forbid(unsafe_code)]

/// Domain layer - graph model, plan aggregate, roles and repositories
pub mod domain;

/// Application services
pub mod application;

/// Error types
pub mod error;

pub use application::plan_service::PlanService;
pub use domain::graph::{
    GraphDocument, GraphEdge, GraphNode, EdgeId, NodeData, NodeId, NodeKind, Position,
    DEFAULT_NODE_COLOR, NODE_PALETTE,
};
pub use domain::plan::{PatientId, PlanId, TreatmentPlan};
pub use domain::repository::PlanRepository;
pub use domain::role::{Identity, Role};
pub use error::PlanError;
