/// Plan read/save use cases
pub mod plan_service;
