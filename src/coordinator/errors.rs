//! # Coordinator Errors

use thiserror::Error;

/// Result type for coordinator runs
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors a coordinator run can end with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// The run observed its cancellation token and stopped
    #[error("Coordinator run cancelled")]
    Cancelled,

    #[error("Coordinator failed: {0}")]
    Failed(String),

    #[error("Coordinator panicked: {0}")]
    Panicked(String),

    /// A delay-loaded coordinator could not be constructed
    #[error("Coordinator construction failed: {0}")]
    Construction(String),
}

impl CoordinatorError {
    /// Create a failure error
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether this is the cancellation signal rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
