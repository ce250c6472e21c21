use thiserror::Error;

/// Error type shared by the plan model, repositories and the plan service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Referentially or semantically invalid graph (duplicate ids, bad patient id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payload does not have the shape of a graph document
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A stored plan could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Backing store could not be reached or rejected the statement
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PlanError {
    /// True for errors caused by the caller's payload rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlanError::Validation(_) | PlanError::MalformedDocument(_)
        )
    }

    /// True when the backing store is the cause
    pub fn is_storage_error(&self) -> bool {
        matches!(self, PlanError::StorageUnavailable(_))
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Serialization(err.to_string())
    }
}

impl From<String> for PlanError {
    fn from(err: String) -> Self {
        PlanError::Other(err)
    }
}

impl From<&str> for PlanError {
    fn from(err: &str) -> Self {
        PlanError::Other(err.to_string())
    }
}
