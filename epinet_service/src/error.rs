//! Error types for the EpiNet service layer.

use epinet_core::EpidemicError;
use thiserror::Error;

/// Errors surfaced to service callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A request parameter was missing its type or outside policy bounds
    #[error("{0}")]
    Validation(String),

    /// `step` before any `initialize` on this session
    #[error("Simulation not initialized")]
    NotInitialized,

    /// Error raised by the simulation core
    #[error(transparent)]
    Core(EpidemicError),

    /// Request body larger than the accepted limit
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Unexpected failure (poisoned worker, join error, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::NotInitialized => 409,
            ServiceError::PayloadTooLarge { .. } => 413,
            ServiceError::Core(EpidemicError::InvalidParameter { .. }) => 400,
            ServiceError::Core(EpidemicError::NotInitialized) => 409,
            ServiceError::Core(EpidemicError::InvalidGraph(_)) => 500,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Returns true if the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<EpidemicError> for ServiceError {
    fn from(err: EpidemicError) -> Self {
        match err {
            EpidemicError::NotInitialized => ServiceError::NotInitialized,
            other => ServiceError::Core(other),
        }
    }
}
