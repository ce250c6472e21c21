/// Graph nodes, edges and their validation
pub mod graph;

/// Treatment plan aggregate and its identifiers
pub mod plan;

/// Clinic roles and the current user
pub mod role;

/// Repository interfaces
pub mod repository;
