//! Error types for the EpiNet simulation core.

use thiserror::Error;

/// Errors raised by the network generator, metrics calculator and engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpidemicError {
    /// A parameter fell outside the domain the core can work with.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as seen by callers
        name: &'static str,
        /// Human-readable explanation
        reason: String,
    },

    /// `step` was called before any `initialize`.
    #[error("Simulation not initialized")]
    NotInitialized,

    /// Metrics were requested for a graph with no nodes.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}

impl EpidemicError {
    /// Creates an invalid-parameter error.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, EpidemicError>;
