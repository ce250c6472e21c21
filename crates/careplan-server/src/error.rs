//! Error types for the care plan server

use careplan_content_store::BlobStoreError;
use careplan_core::PlanError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Plan model, service or storage error
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Attachment storage error
    #[error("Attachment store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;
