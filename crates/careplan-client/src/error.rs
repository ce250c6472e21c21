use careplan_core::PlanError;
use thiserror::Error;

/// Failure talking to the plan backend
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Request never produced a response (connect, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not decode
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// In-process backend error
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl TransportError {
    /// True when the server rejected the payload itself
    pub fn is_client_error(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => (400..500).contains(status),
            TransportError::Plan(err) => err.is_client_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if err.is_timeout() {
            TransportError::Http(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            TransportError::Http(format!("Connection error: {}", err))
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Errors returned by the graph controller
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// The acting role may only view the plan
    #[error("Role '{0}' may not modify treatment plans")]
    ReadOnly(String),

    /// The operation needs a different view state
    #[error("Plan is not loaded: {0}")]
    NotLoaded(String),

    /// Backend failure during load or create
    #[error(transparent)]
    Transport(#[from] TransportError),
}
